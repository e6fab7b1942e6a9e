// SPDX-License-Identifier: MIT OR Apache-2.0

//! Directory indexing into the knowledge store

pub mod index;
pub mod scanner;

pub use index::IndexBuilder;
pub use scanner::{detect_language, FileScanner};
