// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for diffrag
//!
//! Loads configuration from .diffragrc.toml in the project directory or
//! ~/.config/diffrag/config.toml

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::embedding::provider::DEFAULT_EMBEDDING_DIM;

/// Project-level config file name
pub const CONFIG_FILE: &str = ".diffragrc.toml";

/// Embedding provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderType {
    /// fastembed model, falling back to the hash embedder
    #[default]
    Builtin,
    /// External command, falling back to the hash embedder
    Command,
    /// Hash embedder only
    Hash,
}

/// How stored chunks are scored against a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringStrategy {
    /// Cosine similarity of embeddings
    #[default]
    Embedding,
    /// Jaccard overlap of extracted keywords
    Keywords,
}

impl std::fmt::Display for ScoringStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringStrategy::Embedding => write!(f, "embedding"),
            ScoringStrategy::Keywords => write!(f, "keywords"),
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider type (builtin, command, hash)
    pub provider: Option<EmbeddingProviderType>,
    /// Model identifier for the embedding provider
    pub model: Option<String>,
    /// Command to execute for command provider
    pub command: Option<String>,
    /// Vector dimensionality
    pub dimension: Option<usize>,
    /// Timeout for a single learned embedding call in milliseconds
    pub timeout_ms: Option<u64>,
    /// Timeout for loading the learned model in milliseconds
    pub load_timeout_ms: Option<u64>,
    /// Maximum characters sent to the learned model per text
    pub max_chars: Option<usize>,
}

impl EmbeddingConfig {
    /// Get provider type (defaults to Builtin)
    pub fn provider(&self) -> EmbeddingProviderType {
        self.provider.unwrap_or_default()
    }

    /// Get model identifier (defaults to "minilm")
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or("minilm")
    }

    /// Get command (defaults to "embedder")
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or("embedder")
    }

    /// Get dimension (defaults to 384)
    pub fn dimension(&self) -> usize {
        self.dimension
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_EMBEDDING_DIM)
    }

    /// Get per-call timeout (defaults to 10 seconds)
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(10_000))
    }

    /// Get model load timeout (defaults to 120 seconds)
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms.unwrap_or(120_000))
    }

    /// Get max chars (defaults to 2000)
    pub fn max_chars(&self) -> usize {
        self.max_chars.unwrap_or(2000)
    }

    /// Configuration using only the deterministic hash embedder
    pub fn hash_only() -> Self {
        Self {
            provider: Some(EmbeddingProviderType::Hash),
            ..Default::default()
        }
    }
}

/// Search configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of matches returned
    pub limit: Option<usize>,
    /// Matches must score strictly above this
    pub threshold: Option<f32>,
    /// Characters of chunk content returned per match
    pub snippet_chars: Option<usize>,
    /// Default scoring strategy
    pub scoring: Option<ScoringStrategy>,
}

impl SearchConfig {
    /// Get result limit (defaults to 5)
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(5)
    }

    /// Get similarity threshold (defaults to 0.3)
    pub fn threshold(&self) -> f32 {
        self.threshold.unwrap_or(0.3)
    }

    /// Get snippet length (defaults to 500)
    pub fn snippet_chars(&self) -> usize {
        self.snippet_chars.unwrap_or(500)
    }

    /// Get scoring strategy (defaults to Embedding)
    pub fn scoring(&self) -> ScoringStrategy {
        self.scoring.unwrap_or_default()
    }
}

/// Indexing configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory names skipped in addition to the built-in list
    pub exclude_dirs: Vec<String>,
    /// Maximum file size in bytes to index (default: 1MB)
    pub max_file_size: Option<u64>,
}

impl IndexConfig {
    /// Get extra excluded directory names
    pub fn exclude_dirs(&self) -> &[String] {
        &self.exclude_dirs
    }

    /// Get max file size (default: 1MB)
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size.unwrap_or(1024 * 1024)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path
    pub path: Option<PathBuf>,
    /// Maximum pooled connections
    pub pool_size: Option<u32>,
}

impl StorageConfig {
    /// Get pool size (defaults to 4)
    pub fn pool_size(&self) -> u32 {
        self.pool_size.filter(|n| *n > 0).unwrap_or(4)
    }
}

/// Commit analysis configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// External classifier command; keyword rules are used when unset
    pub classifier_command: Option<String>,
    /// Timeout for one classifier command run in milliseconds
    pub classifier_timeout_ms: Option<u64>,
    /// Whether `analyze` stores its result (default: true)
    pub save: Option<bool>,
}

impl AnalysisConfig {
    /// Get classifier timeout (defaults to 30 seconds)
    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_millis(self.classifier_timeout_ms.unwrap_or(30_000))
    }

    /// Get save flag (defaults to true)
    pub fn save(&self) -> bool {
        self.save.unwrap_or(true)
    }
}

/// Configuration loaded from .diffragrc.toml or ~/.config/diffrag/config.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,

    /// Search configuration
    pub search: SearchConfig,

    /// Index configuration
    pub index: IndexConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Analysis configuration
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Load configuration from files
    ///
    /// Precedence (highest to lowest):
    /// 1. .diffragrc.toml in `project_dir`
    /// 2. ~/.config/diffrag/config.toml
    pub fn load(project_dir: &Path) -> Self {
        if let Some(config) = Self::load_from_path(&project_dir.join(CONFIG_FILE)) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("diffrag").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    fn load_from_path(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Config for an explicit database path using only the hash embedder.
    pub fn hash_only(store_path: impl Into<PathBuf>) -> Self {
        Self {
            embeddings: EmbeddingConfig::hash_only(),
            storage: StorageConfig {
                path: Some(store_path.into()),
                pool_size: None,
            },
            ..Default::default()
        }
    }

    /// Same config with the learned embedding provider switched off.
    pub fn with_hash_embeddings(mut self) -> Self {
        self.embeddings.provider = Some(EmbeddingProviderType::Hash);
        self
    }

    /// Get the embedding configuration
    pub fn embeddings(&self) -> &EmbeddingConfig {
        &self.embeddings
    }

    /// Get the search configuration
    pub fn search(&self) -> &SearchConfig {
        &self.search
    }

    /// Get the index configuration
    pub fn index(&self) -> &IndexConfig {
        &self.index
    }

    /// Get the storage configuration
    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    /// Get the analysis configuration
    pub fn analysis(&self) -> &AnalysisConfig {
        &self.analysis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_store_contract() {
        let config = Config::default();
        assert_eq!(config.search().limit(), 5);
        assert!((config.search().threshold() - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.search().snippet_chars(), 500);
        assert_eq!(config.embeddings().dimension(), 384);
        assert_eq!(config.embeddings().provider(), EmbeddingProviderType::Builtin);
        assert_eq!(config.index().max_file_size(), 1024 * 1024);
    }

    #[test]
    fn loads_project_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
[embeddings]
provider = "hash"
timeout_ms = 250

[search]
threshold = 0.1
scoring = "keywords"

[index]
exclude_dirs = ["vendor"]

[analysis]
classifier_command = "llm-classify"
classifier_timeout_ms = 1500
"#,
        )
        .unwrap();

        let config = Config::load(dir.path());
        assert_eq!(config.embeddings().provider(), EmbeddingProviderType::Hash);
        assert_eq!(config.embeddings().timeout(), Duration::from_millis(250));
        assert_eq!(config.search().scoring(), ScoringStrategy::Keywords);
        assert!((config.search().threshold() - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.index().exclude_dirs().to_vec(), vec!["vendor".to_string()]);
        assert_eq!(config.analysis().classifier_command.as_deref(), Some("llm-classify"));
        assert_eq!(config.analysis().classifier_timeout(), Duration::from_millis(1500));
        assert!(config.analysis().save());
    }

    #[test]
    fn invalid_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[search\nlimit = ").unwrap();
        assert!(Config::load_from_path(&dir.path().join(CONFIG_FILE)).is_none());
    }
}
