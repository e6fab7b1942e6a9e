// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge base service: the public entry point to the store.
//!
//! A [`KnowledgeBase`] is built explicitly from a [`Config`] and shared by
//! reference or `Arc`. Text is embedded before any storage resource is taken,
//! and all SQLite work runs on the blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::config::{Config, ScoringStrategy};
use crate::embedding::keywords::extract_keywords;
use crate::embedding::Embedder;
use crate::errors::Result;
use crate::indexer::{detect_language, IndexBuilder};
use crate::storage::chunks::DEFAULT_CHUNK_TYPE;
use crate::storage::{
    ChunkMatch, CommitAnalysisRecord, NewChunk, NewCommitAnalysis, NewPattern, PatternMatch,
    Query, SearchOptions, Storage,
};
use crate::utils::default_store_path;

/// Store summary for reporting
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub path: Option<PathBuf>,
    pub chunks: u64,
    pub embedding_dim: Option<usize>,
    pub model: String,
}

/// Local embedding-backed knowledge store
pub struct KnowledgeBase {
    config: Config,
    store_path: PathBuf,
    storage: OnceCell<Arc<Storage>>,
    embedder: Embedder,
}

impl KnowledgeBase {
    /// Creates a knowledge base backed by the configured database file, or
    /// `.diffrag/knowledge.sqlite` under the current directory. Nothing is
    /// opened until first use or [`KnowledgeBase::initialize`].
    pub fn new(config: Config) -> Self {
        let store_path = config.storage().path.clone().unwrap_or_else(|| {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            default_store_path(cwd)
        });
        let embedder = Embedder::new(config.embeddings().clone());
        Self {
            config,
            store_path,
            storage: OnceCell::new(),
            embedder,
        }
    }

    /// Creates a knowledge base over a private in-memory database.
    pub fn in_memory(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::in_memory()?);
        let embedder = Embedder::new(config.embeddings().clone());
        Ok(Self {
            config,
            store_path: PathBuf::new(),
            storage: OnceCell::new_with(Some(storage)),
            embedder,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens the database and loads the embedding model. Safe to call more
    /// than once; later calls return immediately.
    pub async fn initialize(&self) -> Result<()> {
        self.storage().await?;
        self.embedder.initialize().await;
        Ok(())
    }

    async fn storage(&self) -> Result<Arc<Storage>> {
        let storage = self
            .storage
            .get_or_try_init(|| async {
                let path = self.store_path.clone();
                let pool_size = self.config.storage().pool_size();
                let storage =
                    tokio::task::spawn_blocking(move || Storage::open(path, pool_size)).await??;
                tracing::debug!("Opened knowledge store at {}", self.store_path.display());
                Ok::<_, crate::errors::KnowledgeError>(Arc::new(storage))
            })
            .await?;
        Ok(Arc::clone(storage))
    }

    async fn with_storage<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Storage) -> Result<T> + Send + 'static,
    {
        let storage = self.storage().await?;
        tokio::task::spawn_blocking(move || f(&storage)).await?
    }

    /// Embeds and stores one chunk, returning its id.
    ///
    /// `chunk_type` defaults to `"code"`; `language` defaults to detection
    /// from the extension of `source_path`.
    pub async fn add_chunk(
        &self,
        content: &str,
        source_path: &str,
        chunk_type: Option<&str>,
        language: Option<&str>,
    ) -> Result<String> {
        let embedding = self.embedder.embed(content).await;
        let content = content.to_string();
        let source_path = source_path.to_string();
        let chunk_type = chunk_type.unwrap_or(DEFAULT_CHUNK_TYPE).to_string();
        let language = language
            .map(str::to_string)
            .unwrap_or_else(|| detect_language(&source_path).to_string());

        self.with_storage(move |storage| {
            storage.insert_chunk(&NewChunk {
                content: &content,
                source_path: &source_path,
                chunk_type: &chunk_type,
                language: &language,
                embedding: &embedding,
            })
        })
        .await
    }

    /// Searches with the configured scoring strategy and snippet length.
    pub async fn search_similar(
        &self,
        query: &str,
        limit: Option<usize>,
        threshold: Option<f32>,
    ) -> Result<Vec<ChunkMatch>> {
        let search = self.config.search();
        let options = SearchOptions {
            limit: limit.unwrap_or_else(|| search.limit()),
            threshold: threshold.unwrap_or_else(|| search.threshold()),
            snippet_chars: search.snippet_chars(),
        };
        self.search_with(query, options, search.scoring()).await
    }

    /// Searches with explicit options and scoring strategy.
    pub async fn search_with(
        &self,
        query: &str,
        options: SearchOptions,
        scoring: ScoringStrategy,
    ) -> Result<Vec<ChunkMatch>> {
        match scoring {
            ScoringStrategy::Embedding => {
                let embedding = self.embedder.embed(query).await;
                self.with_storage(move |storage| {
                    storage.search_chunks(Query::Embedding(&embedding), &options)
                })
                .await
            }
            ScoringStrategy::Keywords => {
                let keywords = extract_keywords(query);
                self.with_storage(move |storage| {
                    storage.search_chunks(Query::Keywords(&keywords), &options)
                })
                .await
            }
        }
    }

    /// Indexes every eligible source file under `root`.
    pub async fn index_directory(&self, root: impl AsRef<Path>) -> Result<usize> {
        IndexBuilder::new(self, root).build().await
    }

    /// Appends a commit analysis, returning its id.
    pub async fn add_commit_analysis(&self, analysis: NewCommitAnalysis) -> Result<String> {
        self.with_storage(move |storage| storage.insert_commit_analysis(&analysis))
            .await
    }

    /// Most recent commit analyses first.
    pub async fn get_commit_history(&self, limit: usize) -> Result<Vec<CommitAnalysisRecord>> {
        self.with_storage(move |storage| storage.commit_history(limit))
            .await
    }

    /// Embeds the pattern's code example and stores the pattern.
    pub async fn add_pattern(&self, pattern: NewPattern) -> Result<String> {
        let embedding = self.embedder.embed(&pattern.code_example).await;
        self.with_storage(move |storage| storage.insert_pattern(&pattern, &embedding))
            .await
    }

    /// Ranks stored patterns against `query`.
    pub async fn search_patterns(
        &self,
        query: &str,
        limit: Option<usize>,
        threshold: Option<f32>,
    ) -> Result<Vec<PatternMatch>> {
        let limit = limit.unwrap_or_else(|| self.config.search().limit());
        let threshold = threshold.unwrap_or_else(|| self.config.search().threshold());
        let embedding = self.embedder.embed(query).await;
        self.with_storage(move |storage| storage.search_patterns(&embedding, limit, threshold))
            .await
    }

    /// Number of stored chunks.
    pub async fn chunk_count(&self) -> Result<u64> {
        self.with_storage(|storage| storage.count_chunks()).await
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let (chunks, embedding_dim, path) = self
            .with_storage(|storage| {
                Ok((
                    storage.count_chunks()?,
                    storage.embedding_dimension()?,
                    storage.path().map(Path::to_path_buf),
                ))
            })
            .await?;
        Ok(StoreStats {
            path,
            chunks,
            embedding_dim,
            model: self.embedder.model_id().await,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn hash_kb() -> KnowledgeBase {
        KnowledgeBase::in_memory(Config::default().with_hash_embeddings()).unwrap()
    }

    #[tokio::test]
    async fn initialize_is_idempotent() {
        let kb = hash_kb();
        kb.initialize().await.unwrap();
        kb.initialize().await.unwrap();
        assert_eq!(kb.chunk_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn add_chunk_detects_language() {
        let kb = hash_kb();
        kb.add_chunk("def main(): pass", "tool.py", None, None)
            .await
            .unwrap();
        kb.add_chunk("SELECT 1", "query.sql", None, None).await.unwrap();

        let results = kb
            .search_with(
                "",
                SearchOptions {
                    threshold: -1.0,
                    ..Default::default()
                },
                ScoringStrategy::Embedding,
            )
            .await
            .unwrap();
        let mut languages: Vec<&str> = results.iter().map(|m| m.language.as_str()).collect();
        languages.sort();
        assert_eq!(languages, vec!["python", "unknown"]);
        assert!(results.iter().all(|m| m.chunk_type == "code"));
    }

    #[tokio::test]
    async fn file_store_is_created_lazily() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("store").join("kb.sqlite");
        let kb = KnowledgeBase::new(Config::hash_only(&db));
        assert!(!db.exists());

        kb.add_chunk("fn persisted() {}", "a.rs", None, None)
            .await
            .unwrap();
        assert!(db.exists());

        let stats = kb.stats().await.unwrap();
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.embedding_dim, Some(384));
        assert_eq!(stats.path.as_deref(), Some(db.as_path()));
    }
}
