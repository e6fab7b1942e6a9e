// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named code patterns, searchable by the embedding of their example.

use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use super::{rank, Storage};
use crate::embedding::similarity::cosine_similarity;
use crate::errors::Result;
use crate::utils::now_millis;

/// A pattern to be appended. The embedding is computed from `code_example`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewPattern {
    pub pattern_name: String,
    pub pattern_type: String,
    pub description: String,
    pub code_example: String,
    pub tags: Vec<String>,
    pub confidence_score: f32,
}

impl Default for NewPattern {
    fn default() -> Self {
        Self {
            pattern_name: String::new(),
            pattern_type: String::new(),
            description: String::new(),
            code_example: String::new(),
            tags: Vec::new(),
            confidence_score: 1.0,
        }
    }
}

/// A stored pattern.
#[derive(Debug, Clone, Serialize)]
pub struct CodePattern {
    pub id: String,
    pub pattern_name: String,
    pub pattern_type: String,
    pub description: String,
    pub code_example: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub tags: Vec<String>,
    pub confidence_score: f32,
    pub created_at: i64,
}

/// A ranked pattern hit.
#[derive(Debug, Clone, Serialize)]
pub struct PatternMatch {
    #[serde(flatten)]
    pub pattern: CodePattern,
    pub similarity: f32,
}

fn pattern_from_row(row: &Row<'_>) -> rusqlite::Result<CodePattern> {
    let embedding_blob: Vec<u8> = row.get(5)?;
    let tags_json: String = row.get(6)?;
    let confidence: f64 = row.get(7)?;
    Ok(CodePattern {
        id: row.get(0)?,
        pattern_name: row.get(1)?,
        pattern_type: row.get(2)?,
        description: row.get(3)?,
        code_example: row.get(4)?,
        embedding: Storage::blob_to_embedding(&embedding_blob),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        confidence_score: confidence as f32,
        created_at: row.get(8)?,
    })
}

impl Storage {
    /// Appends a pattern with the embedding of its code example.
    pub fn insert_pattern(&self, pattern: &NewPattern, embedding: &[f32]) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let tags = serde_json::to_string(&pattern.tags)?;
        let confidence = if pattern.confidence_score.is_nan() {
            0.0
        } else {
            pattern.confidence_score.clamp(0.0, 1.0)
        } as f64;
        let embedding_blob = Self::embedding_to_blob(embedding);
        let created_at = now_millis();

        self.write(|tx| {
            Self::check_dimension(tx, embedding.len())?;
            tx.execute(
                r#"
                INSERT INTO code_patterns (
                    id, pattern_name, pattern_type, description, code_example,
                    embedding, tags, confidence_score, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    id,
                    pattern.pattern_name,
                    pattern.pattern_type,
                    pattern.description,
                    pattern.code_example,
                    embedding_blob,
                    tags,
                    confidence,
                    created_at
                ],
            )?;
            Ok(())
        })?;

        Ok(id)
    }

    /// Ranks stored patterns by cosine similarity to `query`.
    pub fn search_patterns(
        &self,
        query: &[f32],
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<PatternMatch>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, pattern_name, pattern_type, description, code_example,
                   embedding, tags, confidence_score, created_at
            FROM code_patterns
            ORDER BY seq DESC
            "#,
        )?;
        let scored = stmt
            .query_map([], pattern_from_row)?
            .map(|row| row.map(|p| {
                let score = cosine_similarity(query, &p.embedding);
                (p, score)
            }))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rank(scored, threshold, limit)
            .into_iter()
            .map(|(pattern, similarity)| PatternMatch {
                pattern,
                similarity,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(name: &str) -> NewPattern {
        NewPattern {
            pattern_name: name.to_string(),
            pattern_type: "design".to_string(),
            description: format!("{} pattern", name),
            code_example: format!("struct {};", name),
            tags: vec!["creational".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn search_ranks_patterns() {
        let storage = Storage::in_memory().unwrap();
        storage.insert_pattern(&pattern("Builder"), &[1.0, 0.0]).unwrap();
        storage.insert_pattern(&pattern("Visitor"), &[0.0, 1.0]).unwrap();

        let results = storage.search_patterns(&[1.0, 0.1], 5, 0.3).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].pattern.pattern_name, "Builder");
        assert_eq!(results[0].pattern.tags, vec!["creational"]);
        assert!((results[0].pattern.confidence_score - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn confidence_is_clamped() {
        let storage = Storage::in_memory().unwrap();
        storage
            .insert_pattern(
                &NewPattern {
                    confidence_score: 4.0,
                    ..pattern("Facade")
                },
                &[1.0],
            )
            .unwrap();
        let results = storage.search_patterns(&[1.0], 1, 0.0).unwrap();
        assert_eq!(results[0].pattern.confidence_score, 1.0);
    }

    #[test]
    fn shares_dimension_with_chunks() {
        let storage = Storage::in_memory().unwrap();
        storage.insert_pattern(&pattern("Builder"), &[1.0, 0.0]).unwrap();
        assert!(storage.insert_pattern(&pattern("Odd"), &[1.0]).is_err());
        assert_eq!(storage.embedding_dimension().unwrap(), Some(2));
    }
}
