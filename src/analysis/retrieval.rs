// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort enrichment from the knowledge base. These calls never fail:
//! errors are logged and produce no context.

use serde::Serialize;

use crate::knowledge::KnowledgeBase;
use crate::storage::PatternMatch;

/// Number of snippets returned for a diff.
pub const CONTEXT_LIMIT: usize = 5;

/// A related stored chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSnippet {
    pub source_path: String,
    pub snippet: String,
    pub similarity: f32,
}

/// Chunks similar to `text`, using the configured threshold.
pub async fn retrieve_context(kb: &KnowledgeBase, text: &str) -> Vec<ContextSnippet> {
    match kb.search_similar(text, Some(CONTEXT_LIMIT), None).await {
        Ok(matches) => matches
            .into_iter()
            .map(|m| ContextSnippet {
                source_path: m.source_path,
                snippet: m.content,
                similarity: m.similarity,
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Context retrieval failed: {}", e);
            Vec::new()
        }
    }
}

/// Stored patterns similar to `text`.
pub async fn enrich_patterns(kb: &KnowledgeBase, text: &str) -> Vec<PatternMatch> {
    match kb.search_patterns(text, Some(CONTEXT_LIMIT), None).await {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!("Pattern lookup failed: {}", e);
            Vec::new()
        }
    }
}
