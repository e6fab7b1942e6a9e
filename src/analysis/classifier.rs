// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pluggable commit classifiers.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::analysis::commit::classify_message;
use crate::config::AnalysisConfig;
use crate::errors::{KnowledgeError, Result};

/// Maps a piece of text (usually a commit message) to a label.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<String>;
}

/// Keyword rules over the commit message.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleClassifier;

#[async_trait]
impl Classifier for RuleClassifier {
    async fn classify(&self, text: &str) -> Result<String> {
        Ok(classify_message(text).to_string())
    }
}

/// Runs an external program with the text on stdin and takes the first
/// non-empty line of its stdout, lowercased, as the label.
///
/// A run that outlives `timeout` is killed and reported as unavailable.
#[derive(Debug, Clone)]
pub struct CommandClassifier {
    command: String,
    timeout: Duration,
}

impl CommandClassifier {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    async fn run(&self, text: &str) -> Result<String> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // A classifier may exit without reading its input.
            if let Err(e) = stdin.write_all(text.as_bytes()).await {
                tracing::debug!("Classifier did not read stdin: {}", e);
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(KnowledgeError::ProviderUnavailable(format!(
                "classifier command failed (status {}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_lowercase)
            .ok_or_else(|| {
                KnowledgeError::MalformedInput("classifier printed no label".to_string())
            })
    }
}

#[async_trait]
impl Classifier for CommandClassifier {
    async fn classify(&self, text: &str) -> Result<String> {
        tokio::time::timeout(self.timeout, self.run(text))
            .await
            .map_err(|_| {
                KnowledgeError::ProviderUnavailable(format!(
                    "classifier command timed out after {:?}",
                    self.timeout
                ))
            })?
    }
}

/// The external classifier when one is configured, else the keyword rules.
pub fn configured_classifier(config: &AnalysisConfig) -> Box<dyn Classifier> {
    match config.classifier_command.as_deref() {
        Some(command) => Box::new(CommandClassifier::new(command, config.classifier_timeout())),
        None => Box::new(RuleClassifier),
    }
}

/// Classifies with `primary`, using the keyword rules when it fails.
pub async fn classify_or_rules(primary: &dyn Classifier, text: &str) -> String {
    match primary.classify(text).await {
        Ok(label) => label,
        Err(e) => {
            tracing::warn!("Classifier failed: {}; using keyword rules", e);
            classify_message(text).to_string()
        }
    }
}
