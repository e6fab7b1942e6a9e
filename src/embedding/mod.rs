// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding module - turns text into fixed-length vectors and scores them
//!
//! A learned provider (fastembed or an external command) is used when it
//! loads; the keyword hash embedder covers everything else.

pub mod keywords;
pub mod provider;
pub mod service;
pub mod similarity;

pub use keywords::extract_keywords;
pub use provider::{
    CommandProvider, EmbeddingProvider, EmbeddingProviderConfig, HashEmbedder,
    DEFAULT_EMBEDDING_DIM, HASH_MODEL_ID,
};
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
pub use provider::FastEmbedder;
pub use service::Embedder;
pub use similarity::{cosine_similarity, jaccard_similarity};
