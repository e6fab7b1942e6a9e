// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only commit analysis records.

use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use super::Storage;
use crate::errors::Result;
use crate::utils::now_millis;

/// A commit analysis to be appended.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewCommitAnalysis {
    pub commit_hash: String,
    pub commit_message: String,
    pub files_changed: Vec<String>,
    pub classification: String,
    pub refactoring_type: Option<String>,
    /// Sign of the change; stored as -1, 0 or 1
    pub complexity_change: i32,
    /// Stored clamped to `[0, 1]`
    pub risk_score: f32,
    pub suggestions: Vec<String>,
}

/// A stored commit analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitAnalysisRecord {
    pub id: String,
    pub commit_hash: String,
    pub commit_message: String,
    pub files_changed: Vec<String>,
    pub classification: String,
    pub refactoring_type: Option<String>,
    pub complexity_change: i8,
    pub risk_score: f32,
    pub suggestions: Vec<String>,
    pub created_at: i64,
}

fn clamp_risk(risk: f32) -> f32 {
    if risk.is_nan() {
        0.0
    } else {
        risk.clamp(0.0, 1.0)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<CommitAnalysisRecord> {
    let files_json: String = row.get(3)?;
    let suggestions_json: String = row.get(8)?;
    let complexity: i64 = row.get(6)?;
    let risk: f64 = row.get(7)?;
    Ok(CommitAnalysisRecord {
        id: row.get(0)?,
        commit_hash: row.get(1)?,
        commit_message: row.get(2)?,
        files_changed: serde_json::from_str(&files_json).unwrap_or_default(),
        classification: row.get(4)?,
        refactoring_type: row.get(5)?,
        complexity_change: complexity.signum() as i8,
        risk_score: risk as f32,
        suggestions: serde_json::from_str(&suggestions_json).unwrap_or_default(),
        created_at: row.get(9)?,
    })
}

impl Storage {
    /// Appends a commit analysis and returns its generated id.
    pub fn insert_commit_analysis(&self, analysis: &NewCommitAnalysis) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let files_changed = serde_json::to_string(&analysis.files_changed)?;
        let suggestions = serde_json::to_string(&analysis.suggestions)?;
        let complexity = analysis.complexity_change.signum();
        let risk = clamp_risk(analysis.risk_score) as f64;
        let created_at = now_millis();

        self.write(|tx| {
            tx.execute(
                r#"
                INSERT INTO commit_analysis (
                    id, commit_hash, commit_message, files_changed, classification,
                    refactoring_type, complexity_change, risk_score, suggestions, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    id,
                    analysis.commit_hash,
                    analysis.commit_message,
                    files_changed,
                    analysis.classification,
                    analysis.refactoring_type,
                    complexity,
                    risk,
                    suggestions,
                    created_at
                ],
            )?;
            Ok(())
        })?;

        Ok(id)
    }

    /// Returns up to `limit` analyses, most recent first.
    pub fn commit_history(&self, limit: usize) -> Result<Vec<CommitAnalysisRecord>> {
        let conn = self.reader()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, commit_hash, commit_message, files_changed, classification,
                   refactoring_type, complexity_change, risk_score, suggestions, created_at
            FROM commit_analysis
            ORDER BY seq DESC
            LIMIT ?1
            "#,
        )?;
        let records = stmt
            .query_map(params![limit as i64], record_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(hash: &str) -> NewCommitAnalysis {
        NewCommitAnalysis {
            commit_hash: hash.to_string(),
            commit_message: format!("commit {}", hash),
            classification: "feature".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn history_is_most_recent_first() {
        let storage = Storage::in_memory().unwrap();
        for hash in ["A", "B", "C"] {
            storage.insert_commit_analysis(&analysis(hash)).unwrap();
        }

        let history = storage.commit_history(2).unwrap();
        let hashes: Vec<&str> = history.iter().map(|r| r.commit_hash.as_str()).collect();
        assert_eq!(hashes, vec!["C", "B"]);
        assert_eq!(storage.commit_history(10).unwrap().len(), 3);
    }

    #[test]
    fn history_of_empty_store_is_empty() {
        let storage = Storage::in_memory().unwrap();
        assert!(storage.commit_history(10).unwrap().is_empty());
    }

    #[test]
    fn values_are_clamped_on_insert() {
        let storage = Storage::in_memory().unwrap();
        storage
            .insert_commit_analysis(&NewCommitAnalysis {
                complexity_change: 7,
                risk_score: 3.5,
                ..analysis("X")
            })
            .unwrap();
        storage
            .insert_commit_analysis(&NewCommitAnalysis {
                complexity_change: -2,
                risk_score: f32::NAN,
                ..analysis("Y")
            })
            .unwrap();

        let history = storage.commit_history(2).unwrap();
        assert_eq!(history[0].complexity_change, -1);
        assert_eq!(history[0].risk_score, 0.0);
        assert_eq!(history[1].complexity_change, 1);
        assert_eq!(history[1].risk_score, 1.0);
    }

    #[test]
    fn list_fields_round_trip() {
        let storage = Storage::in_memory().unwrap();
        let id = storage
            .insert_commit_analysis(&NewCommitAnalysis {
                files_changed: vec!["src/a.rs".to_string(), "src/b.rs".to_string()],
                refactoring_type: Some("rename".to_string()),
                suggestions: vec!["add tests".to_string()],
                ..analysis("Z")
            })
            .unwrap();

        let record = &storage.commit_history(1).unwrap()[0];
        assert_eq!(record.id, id);
        assert_eq!(record.files_changed, vec!["src/a.rs", "src/b.rs"]);
        assert_eq!(record.refactoring_type.as_deref(), Some("rename"));
        assert_eq!(record.suggestions, vec!["add tests"]);
    }
}
