// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding service that never fails outward.
//!
//! The configured learned provider is loaded once. Every call that cannot be
//! served by it (load failure, error, panic, timeout, wrong length) is served
//! by the [`HashEmbedder`] instead. A timed-out command is killed; a model
//! still busy with an earlier call serves the fallback instead of queueing.

use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use crate::config::{EmbeddingConfig, EmbeddingProviderType};
use crate::embedding::provider::{
    load_builtin, CommandProvider, EmbeddingProvider, EmbeddingProviderConfig, HashEmbedder,
    HASH_MODEL_ID,
};
use crate::errors::{KnowledgeError, Result};

enum Learned {
    /// In-process model, run on the blocking pool one call at a time.
    Model {
        provider: Arc<Mutex<Box<dyn EmbeddingProvider>>>,
        model_id: String,
    },
    /// External command, one child process per call.
    Command(CommandProvider),
}

impl Learned {
    fn model(provider: Box<dyn EmbeddingProvider>) -> Self {
        let model_id = provider.model_id().to_string();
        Self::Model {
            provider: Arc::new(Mutex::new(provider)),
            model_id,
        }
    }

    fn model_id(&self) -> &str {
        match self {
            Self::Model { model_id, .. } => model_id.as_str(),
            Self::Command(provider) => provider.model_id(),
        }
    }
}

/// Text embedder with a deterministic fallback.
pub struct Embedder {
    config: EmbeddingConfig,
    fallback: HashEmbedder,
    learned: OnceCell<Option<Learned>>,
}

impl Embedder {
    pub fn new(config: EmbeddingConfig) -> Self {
        let fallback = HashEmbedder::new(config.dimension());
        Self {
            config,
            fallback,
            learned: OnceCell::new(),
        }
    }

    /// Embedder that only ever uses the hash fallback.
    pub fn hash_only(dimension: usize) -> Self {
        Self::new(EmbeddingConfig {
            dimension: Some(dimension),
            ..EmbeddingConfig::hash_only()
        })
    }

    /// Length of every vector this embedder returns.
    pub fn dimension(&self) -> usize {
        self.fallback.dimension()
    }

    /// Loads the learned provider if not done yet.
    ///
    /// Returns whether the learned provider is in use. A load failure is
    /// logged once and the embedder degrades to the fallback for good.
    pub async fn initialize(&self) -> bool {
        self.learned().await.is_some()
    }

    /// Identifier of the model serving requests.
    pub async fn model_id(&self) -> String {
        match self.learned().await {
            Some(learned) => learned.model_id().to_string(),
            None => HASH_MODEL_ID.to_string(),
        }
    }

    async fn learned(&self) -> Option<&Learned> {
        self.learned
            .get_or_init(|| async {
                match self.load().await {
                    Ok(learned) => learned,
                    Err(e) => {
                        warn!("{}; using keyword hash embeddings", e);
                        None
                    }
                }
            })
            .await
            .as_ref()
    }

    async fn load(&self) -> Result<Option<Learned>> {
        let learned = match self.config.provider() {
            EmbeddingProviderType::Hash => return Ok(None),
            EmbeddingProviderType::Command => Learned::Command(CommandProvider::new(
                self.config.command().to_string(),
                self.config.model().to_string(),
            )),
            EmbeddingProviderType::Builtin => {
                let provider_config =
                    EmbeddingProviderConfig::new(self.config.model(), self.config.max_chars());
                let task = tokio::task::spawn_blocking(move || load_builtin(provider_config));
                match tokio::time::timeout(self.config.load_timeout(), task).await {
                    Ok(Ok(Ok(provider))) => Learned::model(provider),
                    Ok(Ok(Err(e))) => {
                        return Err(KnowledgeError::ProviderUnavailable(format!("{:#}", e)))
                    }
                    Ok(Err(join)) => {
                        return Err(KnowledgeError::ProviderUnavailable(join.to_string()))
                    }
                    Err(_) => {
                        return Err(KnowledgeError::ProviderUnavailable(format!(
                            "model load exceeded {:?}",
                            self.config.load_timeout()
                        )))
                    }
                }
            }
        };

        debug!("Loaded embedding provider {}", learned.model_id());
        Ok(Some(learned))
    }

    /// Embeds `text`. Always returns a vector of [`Embedder::dimension`]
    /// components.
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        let Some(learned) = self.learned().await else {
            return self.fallback.embed(text);
        };

        let timeout = self.config.timeout();
        let outcome = match learned {
            Learned::Command(provider) => {
                match tokio::time::timeout(timeout, provider.embed_one(text)).await {
                    Ok(result) => result.map_err(|e| format!("{:#}", e)),
                    Err(_) => Err(format!("timed out after {:?}", timeout)),
                }
            }
            Learned::Model { provider, .. } => {
                let Ok(mut guard) = Arc::clone(provider).try_lock_owned() else {
                    debug!("Embedding model busy; using fallback");
                    return self.fallback.embed(text);
                };
                let owned = text.to_string();
                let task = tokio::task::spawn_blocking(move || guard.embed_one(&owned));
                match tokio::time::timeout(timeout, task).await {
                    Ok(Ok(result)) => result.map_err(|e| format!("{:#}", e)),
                    Ok(Err(join)) => Err(join.to_string()),
                    Err(_) => Err(format!("timed out after {:?}", timeout)),
                }
            }
        };

        match outcome {
            Ok(vector) if vector.len() == self.dimension() => return vector,
            Ok(vector) => warn!(
                "Embedding has {} components, expected {}; using fallback",
                vector.len(),
                self.dimension()
            ),
            Err(e) => warn!("Embedding failed: {}; using fallback", e),
        }

        self.fallback.embed(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    /// Sleeps through its first call only.
    struct SlowFirstCall {
        calls: usize,
        delay: Duration,
    }

    impl EmbeddingProvider for SlowFirstCall {
        fn model_id(&self) -> &str {
            "slow-first-call"
        }

        fn embed_texts(&mut self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            self.calls += 1;
            if self.calls == 1 {
                std::thread::sleep(self.delay);
            }
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }
    }

    fn with_learned(config: EmbeddingConfig, learned: Learned) -> Embedder {
        let embedder = Embedder::new(config);
        assert!(embedder.learned.set(Some(learned)).is_ok());
        embedder
    }

    #[tokio::test]
    async fn hash_only_matches_fallback() {
        let embedder = Embedder::hash_only(64);
        assert!(!embedder.initialize().await);
        assert_eq!(embedder.model_id().await, HASH_MODEL_ID);

        let vector = embedder.embed("function calculateSum").await;
        assert_eq!(vector.len(), 64);
        assert_eq!(vector, HashEmbedder::new(64).embed("function calculateSum"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_command_falls_back() {
        let embedder = Embedder::new(EmbeddingConfig {
            provider: Some(EmbeddingProviderType::Command),
            command: Some("exit 3".to_string()),
            dimension: Some(32),
            ..Default::default()
        });

        let vector = embedder.embed("query planner").await;
        assert_eq!(vector, HashEmbedder::new(32).embed("query planner"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn wrong_length_falls_back() {
        let embedder = Embedder::new(EmbeddingConfig {
            provider: Some(EmbeddingProviderType::Command),
            command: Some("cat >/dev/null; echo '[[0.5, 0.5]]'".to_string()),
            dimension: Some(8),
            ..Default::default()
        });

        let vector = embedder.embed("query planner").await;
        assert_eq!(vector.len(), 8);
        assert_eq!(vector, HashEmbedder::new(8).embed("query planner"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_vectors_are_used() {
        let embedder = Embedder::new(EmbeddingConfig {
            provider: Some(EmbeddingProviderType::Command),
            command: Some("cat >/dev/null; echo '[[1.0, 0.0, 0.0]]'".to_string()),
            dimension: Some(3),
            ..Default::default()
        });

        assert!(embedder.initialize().await);
        assert_eq!(embedder.embed("anything").await, vec![1.0, 0.0, 0.0]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let embedder = Embedder::new(EmbeddingConfig {
            provider: Some(EmbeddingProviderType::Command),
            command: Some("sleep 2".to_string()),
            dimension: Some(4),
            timeout_ms: Some(100),
            ..Default::default()
        });

        let vector = embedder.embed("slow").await;
        assert_eq!(vector, HashEmbedder::new(4).embed("slow"));
    }

    #[tokio::test]
    async fn busy_model_serves_fallback_without_waiting() {
        let config = EmbeddingConfig {
            dimension: Some(3),
            timeout_ms: Some(400),
            ..Default::default()
        };
        let embedder = with_learned(
            config,
            Learned::model(Box::new(SlowFirstCall {
                calls: 0,
                delay: Duration::from_millis(1200),
            })),
        );
        let fallback = HashEmbedder::new(3);

        assert_eq!(embedder.embed("first").await, fallback.embed("first"));

        let started = Instant::now();
        assert_eq!(embedder.embed("second").await, fallback.embed("second"));
        assert!(started.elapsed() < Duration::from_millis(300));

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(embedder.embed("third").await, vec![1.0, 0.0, 0.0]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timed_out_command_does_not_delay_later_calls() {
        let dir = tempfile::TempDir::new().unwrap();
        let marker = dir.path().join("first-run");
        let command = format!(
            "cat >/dev/null; if [ ! -e '{m}' ]; then touch '{m}'; sleep 3; fi; echo '[[1.0, 0.0, 0.0]]'",
            m = marker.display()
        );
        let embedder = Embedder::new(EmbeddingConfig {
            provider: Some(EmbeddingProviderType::Command),
            command: Some(command),
            dimension: Some(3),
            timeout_ms: Some(500),
            ..Default::default()
        });

        assert_eq!(embedder.embed("first").await, HashEmbedder::new(3).embed("first"));

        let started = Instant::now();
        assert_eq!(embedder.embed("second").await, vec![1.0, 0.0, 0.0]);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
