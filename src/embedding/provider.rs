// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding provider interface and implementations.
//!
//! Three strategies produce vectors of a fixed dimensionality: a fastembed
//! model, an external command, and a deterministic keyword-hash fallback that
//! needs nothing beyond the input text.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::embedding::keywords::extract_keywords;
use crate::utils::truncate_to_chars;

/// Dimensionality shared by the learned model and the hash fallback.
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

const DEFAULT_FASTEMBED_MODEL: &str = "minilm";
const DEFAULT_FASTEMBED_BATCH_SIZE: usize = 256;
const DEFAULT_FASTEMBED_MAX_CHARS: usize = 2000;

/// Model identifier reported by [`HashEmbedder`].
pub const HASH_MODEL_ID: &str = "keyword-blake3";

/// Configuration for the learned embedding provider.
#[derive(Debug, Clone)]
pub struct EmbeddingProviderConfig {
    pub model: String,
    pub batch_size: usize,
    pub max_chars: usize,
    pub normalize: bool,
}

impl EmbeddingProviderConfig {
    pub fn new(model: impl Into<String>, max_chars: usize) -> Self {
        let max_chars = if max_chars == 0 {
            DEFAULT_FASTEMBED_MAX_CHARS
        } else {
            max_chars
        };
        Self {
            model: model.into(),
            max_chars,
            ..Default::default()
        }
    }
}

impl Default for EmbeddingProviderConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_FASTEMBED_MODEL.to_string(),
            batch_size: DEFAULT_FASTEMBED_BATCH_SIZE,
            max_chars: DEFAULT_FASTEMBED_MAX_CHARS,
            normalize: true,
        }
    }
}

/// Trait for embedding providers.
pub trait EmbeddingProvider: Send {
    /// Returns the model identifier.
    fn model_id(&self) -> &str;

    /// Generates embeddings for the given texts.
    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generates an embedding for a single text.
    fn embed_one(&mut self, text: &str) -> Result<Vec<f32>> {
        let mut result = self.embed_texts(&[text.to_string()])?;
        result
            .pop()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }
}

/// FastEmbed provider using sentence-transformers/all-MiniLM-L6-v2.
///
/// The model mean-pools token outputs; vectors are L2-normalized here.
#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
pub struct FastEmbedder {
    embedder: fastembed::TextEmbedding,
    config: EmbeddingProviderConfig,
    model_id: String,
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl FastEmbedder {
    pub fn new(config: EmbeddingProviderConfig) -> Result<Self> {
        let model = parse_model(&config.model)?;
        let model_id = model.to_string();
        let init = fastembed::InitOptions::new(model);
        let embedder = fastembed::TextEmbedding::try_new(init)
            .context("Failed to initialize fastembed model")?;

        Ok(Self {
            embedder,
            config,
            model_id,
        })
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
impl EmbeddingProvider for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embed_texts(&mut self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prepared: Vec<String> = texts
            .iter()
            .map(|text| truncate_to_chars(text, self.config.max_chars).into_owned())
            .collect();
        let mut embeddings = self
            .embedder
            .embed(prepared, Some(self.config.batch_size))?;

        if self.config.normalize {
            for embedding in embeddings.iter_mut() {
                crate::embedding::similarity::l2_normalize(embedding);
            }
        }

        Ok(embeddings)
    }
}

/// Builds the learned provider, or fails on targets without fastembed.
pub fn load_builtin(config: EmbeddingProviderConfig) -> Result<Box<dyn EmbeddingProvider>> {
    #[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
    {
        Ok(Box::new(FastEmbedder::new(config)?))
    }
    #[cfg(all(target_os = "macos", target_arch = "x86_64"))]
    {
        let _ = config;
        bail!("fastembed is not available on this target")
    }
}

/// Command provider that shells out to an external process.
///
/// The command receives `{"model": ..., "texts": [...]}` on stdin and must print
/// either a JSON array of vectors or an object with an `embeddings`, `vectors`
/// or `data` array. Each call spawns its own child, which is killed when the
/// call's future is dropped.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    command: String,
    model: String,
}

impl CommandProvider {
    pub fn new(command: String, model: String) -> Self {
        Self { command, model }
    }

    pub fn model_id(&self) -> &str {
        &self.model
    }

    /// Generates embeddings for the given texts.
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.run_command(texts).await?;
        if vectors.len() != texts.len() {
            bail!(
                "Embedding command returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            );
        }
        Ok(vectors)
    }

    /// Generates an embedding for a single text.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut result = self.embed_texts(&[text.to_string()]).await?;
        result
            .pop()
            .ok_or_else(|| anyhow::anyhow!("No embedding returned"))
    }

    async fn run_command(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let payload = serde_json::json!({
            "model": self.model,
            "texts": texts,
        });

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn embedding command: {}", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload.to_string().as_bytes())
                .await
                .context("Failed to write embeddings payload to stdin")?;
        }

        let output = child
            .wait_with_output()
            .await
            .context("Failed to read embeddings command output")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Embedding command failed (status {}): {}",
                output.status,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed: Value = serde_json::from_str(stdout.trim())
            .context("Failed to parse embeddings command output as JSON")?;

        parse_vectors(parsed)
    }
}

fn parse_vectors(parsed: Value) -> Result<Vec<Vec<f32>>> {
    let embeddings_value = match parsed {
        Value::Array(arr) => Value::Array(arr),
        Value::Object(mut obj) => {
            match ["embeddings", "vectors", "data"]
                .iter()
                .find_map(|key| obj.remove(*key))
            {
                Some(value) => value,
                None => bail!("Embeddings command output missing 'embeddings' field"),
            }
        }
        _ => bail!("Embeddings command output must be JSON array or object"),
    };

    embeddings_value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Embeddings output must be a JSON array"))?
        .iter()
        .map(|row| {
            row.as_array()
                .ok_or_else(|| anyhow::anyhow!("Embedding row must be an array"))?
                .iter()
                .map(|value| {
                    value
                        .as_f64()
                        .ok_or_else(|| anyhow::anyhow!("Embedding value must be a number"))
                        .map(|v| v as f32)
                })
                .collect::<Result<Vec<f32>>>()
        })
        .collect()
}

/// Deterministic fallback embedder.
///
/// Joins the text's keywords with single spaces and reads `dimension` bytes
/// from the BLAKE3 extended output of that string, one component per byte,
/// centred on zero in `[-1, 1]`. Vectors for different keyword sets are
/// close to orthogonal.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embeds a single text. Pure function of `text`.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let seed = extract_keywords(text).join(" ");
        let mut bytes = vec![0u8; self.dimension];
        blake3::Hasher::new()
            .update(seed.as_bytes())
            .finalize_xof()
            .fill(&mut bytes);

        bytes
            .into_iter()
            .map(|b| f32::from(b) / 127.5 - 1.0)
            .collect()
    }
}

#[cfg(not(all(target_os = "macos", target_arch = "x86_64")))]
fn parse_model(raw: &str) -> Result<fastembed::EmbeddingModel> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(fastembed::EmbeddingModel::AllMiniLML6V2);
    }

    match value.to_lowercase().as_str() {
        "minilm"
        | "all-minilm-l6-v2"
        | "allminilm-l6-v2"
        | "sentence-transformers/all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        other => bail!(
            "Unsupported embedding model '{}'. Supported value: {}",
            other,
            DEFAULT_FASTEMBED_MODEL
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new(DEFAULT_EMBEDDING_DIM);
        let text = "function calculateSum(a, b) { return a + b; }";
        assert_eq!(embedder.embed(text), embedder.embed(text));
    }

    #[test]
    fn hash_embedder_fills_every_dimension() {
        let embedder = HashEmbedder::new(DEFAULT_EMBEDDING_DIM);
        let vector = embedder.embed("async function fetchData(url) { await response }");
        assert_eq!(vector.len(), DEFAULT_EMBEDDING_DIM);
        assert!(vector.iter().all(|v| (-1.0..=1.0).contains(v)));

        // Far more than the 16 values a bare digest would give.
        let distinct: HashSet<u32> = vector.iter().map(|v| v.to_bits()).collect();
        assert!(distinct.len() > 16);
        let tail_nonzero = vector[16..].iter().filter(|v| **v != 0.0).count();
        assert_eq!(tail_nonzero, DEFAULT_EMBEDDING_DIM - 16);
    }

    #[test]
    fn hash_embedder_depends_on_keywords_only() {
        let embedder = HashEmbedder::new(64);
        // Short tokens and punctuation do not contribute.
        assert_eq!(
            embedder.embed("controller.render(a, b)"),
            embedder.embed("CONTROLLER render x y")
        );
        assert_ne!(embedder.embed("controller"), embedder.embed("service"));
    }

    #[test]
    fn unrelated_hash_vectors_are_near_orthogonal() {
        let embedder = HashEmbedder::new(DEFAULT_EMBEDDING_DIM);
        let a = embedder.embed("function calculateSum(a, b) { return a + b; }");
        let b = embedder.embed("class DatabaseConnection extends Pool");
        let similarity = crate::embedding::similarity::cosine_similarity(&a, &b);
        assert!(similarity.abs() < 0.3, "similarity {}", similarity);

        let mean = a.iter().sum::<f32>() / a.len() as f32;
        assert!(mean.abs() < 0.15, "mean {}", mean);
    }

    #[test]
    fn parse_vectors_accepts_array_and_object() {
        let arr = serde_json::json!([[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(parse_vectors(arr).unwrap(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);

        let obj = serde_json::json!({ "vectors": [[0.5]] });
        assert_eq!(parse_vectors(obj).unwrap(), vec![vec![0.5]]);

        assert!(parse_vectors(serde_json::json!({ "other": [] })).is_err());
        assert!(parse_vectors(serde_json::json!([["x"]])).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_provider_reads_stdout() {
        let provider = CommandProvider::new(
            "cat > /dev/null; echo '{\"embeddings\": [[0.0, 1.0, 0.0]]}'".to_string(),
            "test-model".to_string(),
        );
        assert_eq!(provider.model_id(), "test-model");
        let vector = provider.embed_one("anything").await.unwrap();
        assert_eq!(vector, vec![0.0, 1.0, 0.0]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_provider_reports_failure() {
        let provider = CommandProvider::new("cat >/dev/null; exit 3".to_string(), "m".to_string());
        assert!(provider.embed_one("x").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dropped_command_call_kills_child() {
        let dir = tempfile::TempDir::new().unwrap();
        let finished = dir.path().join("finished");
        let provider = CommandProvider::new(
            format!(
                "cat >/dev/null; sleep 1; touch '{}'; echo '[[1.0]]'",
                finished.display()
            ),
            "m".to_string(),
        );

        let call = provider.embed_one("x");
        assert!(tokio::time::timeout(std::time::Duration::from_millis(100), call)
            .await
            .is_err());

        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert!(!finished.exists());
    }
}
