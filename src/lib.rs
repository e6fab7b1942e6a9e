// SPDX-License-Identifier: MIT OR Apache-2.0

//! diffrag - Local knowledge store for git diff analysis
//!
//! Shared modules for the diffrag CLI tool: an embedding-backed chunk store
//! with linear-scan similarity search, commit analysis records and the
//! rule-based analysis that consumes them.

pub mod analysis;
pub mod config;
pub mod embedding;
pub mod errors;
pub mod indexer;
pub mod knowledge;
pub mod output;
pub mod storage;
pub mod utils;

pub use config::{Config, ScoringStrategy};
pub use errors::{KnowledgeError, Result};
pub use knowledge::KnowledgeBase;
