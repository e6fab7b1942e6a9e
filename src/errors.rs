// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the knowledge store.
//!
//! Persistence failures surface to direct callers of insert/query; the
//! enrichment wrappers in [`crate::analysis::retrieval`] swallow them.

use thiserror::Error;

/// Errors produced by the knowledge store and its components.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// The learned embedding strategy could not be loaded or invoked.
    ///
    /// Never returned from `embed`; the embedding service recovers locally.
    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// A read or write against SQLite failed.
    #[error("persistence failure: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// No storage connection could be checked out.
    #[error("storage pool failure: {0}")]
    Pool(#[from] r2d2::Error),

    /// Input rejected at the granularity of a single item.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking storage or embedding task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result alias for knowledge store operations.
pub type Result<T> = std::result::Result<T, KnowledgeError>;
