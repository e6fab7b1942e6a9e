// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code chunk records: insertion and brute-force similarity search.

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use super::{rank, Storage};
use crate::embedding::keywords::extract_keywords;
use crate::embedding::similarity::{cosine_similarity, jaccard_similarity};
use crate::errors::Result;
use crate::utils::{now_millis, truncate_to_chars};

/// Default chunk type tag.
pub const DEFAULT_CHUNK_TYPE: &str = "code";

const MAX_COMPLEXITY: u32 = 10;

const COMPLEXITY_TOKENS: &[&str] = &[
    "if", "else", "for", "while", "switch", "case", "catch", "&&", "||",
];

static COMPLEXITY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    COMPLEXITY_TOKENS
        .iter()
        .filter_map(|token| Regex::new(&format!(r"\b{}\b", regex::escape(token))).ok())
        .collect()
});

/// Word-boundary matches of branch keywords and boolean operators. An
/// operator only counts when word characters sit on both sides of it.
pub fn branch_count(content: &str) -> usize {
    COMPLEXITY_PATTERNS
        .iter()
        .map(|re| re.find_iter(content).count())
        .sum()
}

/// Heuristic cyclomatic complexity in `[1, 10]`.
pub fn complexity_score(content: &str) -> u32 {
    (1 + branch_count(content)).min(MAX_COMPLEXITY as usize) as u32
}

/// A chunk to be inserted. Keywords and complexity are derived on insert.
#[derive(Debug, Clone, Copy)]
pub struct NewChunk<'a> {
    pub content: &'a str,
    pub source_path: &'a str,
    pub chunk_type: &'a str,
    pub language: &'a str,
    pub embedding: &'a [f32],
}

/// A stored code chunk.
#[derive(Debug, Clone, Serialize)]
pub struct CodeChunk {
    pub id: String,
    pub content: String,
    pub source_path: String,
    pub chunk_type: String,
    pub language: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub keywords: Vec<String>,
    pub complexity_score: u32,
    /// Unix milliseconds
    pub created_at: i64,
}

/// What a query is scored against.
#[derive(Debug, Clone, Copy)]
pub enum Query<'a> {
    /// Cosine similarity against each chunk's embedding
    Embedding(&'a [f32]),
    /// Jaccard overlap against each chunk's keywords
    Keywords(&'a [String]),
}

/// Limits applied to a ranked query.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    pub limit: usize,
    /// Exclusive lower bound on similarity
    pub threshold: f32,
    /// Characters of content kept per match
    pub snippet_chars: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            threshold: 0.3,
            snippet_chars: 500,
        }
    }
}

/// A ranked search hit.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkMatch {
    pub id: String,
    pub source_path: String,
    pub chunk_type: String,
    pub language: String,
    /// Content truncated to the snippet length
    pub content: String,
    pub keywords: Vec<String>,
    pub complexity_score: u32,
    pub created_at: i64,
    pub similarity: f32,
}

impl ChunkMatch {
    fn from_chunk(chunk: CodeChunk, similarity: f32, snippet_chars: usize) -> Self {
        let content = truncate_to_chars(&chunk.content, snippet_chars).into_owned();
        Self {
            id: chunk.id,
            source_path: chunk.source_path,
            chunk_type: chunk.chunk_type,
            language: chunk.language,
            content,
            keywords: chunk.keywords,
            complexity_score: chunk.complexity_score,
            created_at: chunk.created_at,
            similarity,
        }
    }
}

const CHUNK_COLUMNS: &str = "id, content, source_path, chunk_type, language, embedding, \
                             keywords, complexity_score, created_at";

fn chunk_from_row(row: &Row<'_>) -> rusqlite::Result<CodeChunk> {
    let embedding_blob: Vec<u8> = row.get(5)?;
    let keywords_json: String = row.get(6)?;
    Ok(CodeChunk {
        id: row.get(0)?,
        content: row.get(1)?,
        source_path: row.get(2)?,
        chunk_type: row.get(3)?,
        language: row.get(4)?,
        embedding: Storage::blob_to_embedding(&embedding_blob),
        keywords: serde_json::from_str(&keywords_json).unwrap_or_default(),
        complexity_score: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl Storage {
    /// Inserts a chunk and returns its generated id.
    ///
    /// The row and the store's embedding dimension are written in one
    /// transaction; a vector of the wrong length is rejected.
    pub fn insert_chunk(&self, chunk: &NewChunk<'_>) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let keywords = serde_json::to_string(&extract_keywords(chunk.content))?;
        let complexity = complexity_score(chunk.content);
        let embedding_blob = Self::embedding_to_blob(chunk.embedding);
        let created_at = now_millis();

        self.write(|tx| {
            Self::check_dimension(tx, chunk.embedding.len())?;
            tx.execute(
                r#"
                INSERT INTO code_chunks (
                    id, content, source_path, chunk_type, language,
                    embedding, keywords, complexity_score, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    id,
                    chunk.content,
                    chunk.source_path,
                    chunk.chunk_type,
                    chunk.language,
                    embedding_blob,
                    keywords,
                    complexity,
                    created_at
                ],
            )?;
            Ok(())
        })?;

        Ok(id)
    }

    /// Retrieves a chunk by id.
    pub fn get_chunk(&self, id: &str) -> Result<Option<CodeChunk>> {
        let conn = self.reader()?;
        let chunk = conn
            .query_row(
                &format!("SELECT {} FROM code_chunks WHERE id = ?1", CHUNK_COLUMNS),
                params![id],
                chunk_from_row,
            )
            .optional()?;
        Ok(chunk)
    }

    /// Loads every chunk, most recent first.
    pub fn all_chunks(&self) -> Result<Vec<CodeChunk>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM code_chunks ORDER BY seq DESC",
            CHUNK_COLUMNS
        ))?;
        let chunks = stmt
            .query_map([], chunk_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(chunks)
    }

    /// Counts stored chunks.
    pub fn count_chunks(&self) -> Result<u64> {
        let conn = self.reader()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM code_chunks", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Performs a full-scan similarity search over all chunks.
    ///
    /// Returns chunks scoring above the threshold, by descending similarity;
    /// equal scores keep most-recent-first order.
    pub fn search_chunks(&self, query: Query<'_>, options: &SearchOptions) -> Result<Vec<ChunkMatch>> {
        if options.limit == 0 {
            return Ok(Vec::new());
        }

        let scored: Vec<(CodeChunk, f32)> = self
            .all_chunks()?
            .into_iter()
            .map(|chunk| {
                let score = match query {
                    Query::Embedding(vector) => cosine_similarity(vector, &chunk.embedding),
                    Query::Keywords(keywords) => jaccard_similarity(keywords, &chunk.keywords),
                };
                (chunk, score)
            })
            .collect();

        Ok(rank(scored, options.threshold, options.limit)
            .into_iter()
            .map(|(chunk, score)| ChunkMatch::from_chunk(chunk, score, options.snippet_chars))
            .collect())
    }
}
