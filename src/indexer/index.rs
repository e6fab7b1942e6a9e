// SPDX-License-Identifier: MIT OR Apache-2.0

//! Index builder feeding scanned source files into the chunk store

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};

use crate::errors::{KnowledgeError, Result};
use crate::indexer::scanner::{detect_language, FileScanner};
use crate::knowledge::KnowledgeBase;
use crate::storage::chunks::DEFAULT_CHUNK_TYPE;

/// Walks a directory and stores one chunk per source file
pub struct IndexBuilder<'a> {
    kb: &'a KnowledgeBase,
    root: PathBuf,
    progress: bool,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(kb: &'a KnowledgeBase, root: impl AsRef<Path>) -> Self {
        Self {
            kb,
            root: root.as_ref().to_path_buf(),
            progress: false,
        }
    }

    /// Draw a progress bar on stderr while indexing
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Index every eligible file and return how many were stored.
    ///
    /// A missing root yields 0. Each file is read just before it is stored,
    /// so at most one file's content is held at a time. Files that cannot be
    /// read or stored are logged and skipped.
    pub async fn build(&self) -> Result<usize> {
        if !self.root.is_dir() {
            let err = KnowledgeError::MalformedInput(format!(
                "{} is not a directory",
                self.root.display()
            ));
            tracing::warn!("Skipping index: {}", err);
            return Ok(0);
        }

        let index_config = self.kb.config().index();
        let scanner = FileScanner::new(&self.root)
            .with_exclude_dirs(index_config.exclude_dirs())
            .with_max_file_size(index_config.max_file_size());
        let (paths, walk_errors) = tokio::task::spawn_blocking(move || scanner.list_files()).await?;

        let pb = if self.progress {
            let pb = ProgressBar::new(paths.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("[{bar:40.cyan/blue}] {pos}/{len} files | Indexing {msg}")
            {
                pb.set_style(style.progress_chars("##."));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut indexed = 0usize;
        let mut errors = walk_errors;

        for path in &paths {
            let path_str = path.to_string_lossy().to_string();
            pb.set_message(path_str.clone());
            pb.inc(1);

            let content = match tokio::fs::read_to_string(path).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!("Failed to read {}: {}", path_str, e);
                    errors += 1;
                    continue;
                }
            };

            match self
                .kb
                .add_chunk(&content, &path_str, Some(DEFAULT_CHUNK_TYPE), Some(detect_language(path)))
                .await
            {
                Ok(_) => indexed += 1,
                Err(e) => {
                    tracing::warn!("Failed to index {}: {}", path_str, e);
                    errors += 1;
                }
            }
        }

        pb.finish_and_clear();

        if errors > 0 {
            tracing::warn!("{} files could not be indexed", errors);
        }
        tracing::info!("Indexed {} files from {}", indexed, self.root.display());

        Ok(indexed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    #[tokio::test]
    async fn indexes_source_files_only() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(root.join("one.rs"), "fn a() {}").unwrap();
        std::fs::write(root.join("two.txt"), "hello").unwrap();
        std::fs::create_dir(root.join("node_modules")).unwrap();
        std::fs::write(root.join("node_modules").join("dep.js"), "x").unwrap();

        let kb = KnowledgeBase::in_memory(Config::default().with_hash_embeddings()).unwrap();
        let count = IndexBuilder::new(&kb, root).build().await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(kb.chunk_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unreadable_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(root.join("good.py"), "def ok(): pass").unwrap();
        std::fs::write(root.join("bad.py"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let kb = KnowledgeBase::in_memory(Config::default().with_hash_embeddings()).unwrap();
        let count = IndexBuilder::new(&kb, root).build().await.unwrap();
        assert_eq!(count, 1);

        let results = kb
            .search_similar("def ok(): pass", Some(5), Some(0.0))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].language, "python");
    }

    #[tokio::test]
    async fn missing_root_yields_zero() {
        let dir = TempDir::new().unwrap();
        let kb = KnowledgeBase::in_memory(Config::default().with_hash_embeddings()).unwrap();
        let count = IndexBuilder::new(&kb, dir.path().join("absent"))
            .build()
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
