// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rule-based commit analysis and history statistics.
//!
//! Matching is plain substring search over the lowercased commit message and
//! diff, so short rules such as `add` or `key` also fire inside longer words.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::analysis::diff::parse_git_diff;
use crate::storage::{CommitAnalysisRecord, NewCommitAnalysis};

/// Number of recent records the statistics are computed over.
pub const STATS_WINDOW: usize = 100;

/// Classification used when no rule matches.
pub const UNKNOWN: &str = "unknown";

const CLASSIFICATION_RULES: &[(&str, &[&str])] = &[
    ("feature", &["feat", "add", "new"]),
    ("bugfix", &["fix", "bug", "issue"]),
    ("refactor", &["refactor", "clean", "improve"]),
    ("docs", &["doc", "readme"]),
    ("test", &["test"]),
    ("style", &["style", "format"]),
    ("performance", &["perf", "optimize"]),
    ("security", &["security"]),
    ("chore", &["chore", "maintenance"]),
];

const REFACTORING_INDICATORS: &[&str] = &[
    "function",
    "class",
    "method",
    "extract",
    "inline",
    "rename",
    "move",
    "split",
    "merge",
    "restructure",
    "simplify",
];

const HIGH_RISK_WORDS: &[&str] = &[
    "delete", "remove", "drop", "truncate", "clear", "password", "token", "secret", "key",
    "auth", "database", "db", "sql", "query",
];

const NET_CHANGE_THRESHOLD: i64 = 5;

/// Outcome of the keyword rules
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleAnalysis {
    pub classification: String,
    pub refactoring_type: Option<String>,
    pub complexity_change: i32,
    pub risk_score: f32,
}

/// Classifies a commit message by the first matching keyword rule.
pub fn classify_message(message: &str) -> &'static str {
    let message = message.to_lowercase();
    CLASSIFICATION_RULES
        .iter()
        .find(|(_, words)| words.iter().any(|w| message.contains(w)))
        .map(|(label, _)| *label)
        .unwrap_or(UNKNOWN)
}

fn detect_refactoring(diff: &str) -> bool {
    REFACTORING_INDICATORS.iter().any(|word| diff.contains(word))
}

fn refactoring_type(diff: &str, message: &str) -> &'static str {
    let has = |word: &str| message.contains(word);
    let either = |word: &str| message.contains(word) || diff.contains(word);

    if has("extract") || (diff.contains("function") && diff.contains("new")) {
        "extract_method"
    } else if has("class") && (has("extract") || has("split")) {
        "extract_class"
    } else if either("rename") {
        "rename"
    } else if either("move") {
        "move"
    } else if either("inline") {
        "inline"
    } else if has("simplify") || has("clean") {
        "simplify"
    } else if has("split") {
        "split"
    } else if has("merge") {
        "merge"
    } else if has("restructure") {
        "restructure"
    } else if has("optimize") || has("perf") {
        "optimize"
    } else {
        "restructure"
    }
}

/// Sign of the net line change once it exceeds the threshold.
fn complexity_change(diff: &str) -> i32 {
    let (added, removed) = diff.lines().fold((0i64, 0i64), |(a, r), line| {
        if line.starts_with('+') {
            (a + 1, r)
        } else if line.starts_with('-') {
            (a, r + 1)
        } else {
            (a, r)
        }
    });
    let net = added - removed;
    if net > NET_CHANGE_THRESHOLD {
        1
    } else if net < -NET_CHANGE_THRESHOLD {
        -1
    } else {
        0
    }
}

fn risk_score(diff: &str, classification: &str) -> f32 {
    let base = match classification {
        "bugfix" => 0.3,
        "refactor" => 0.4,
        "performance" => 0.5,
        "security" => 0.8,
        "hotfix" => 0.9,
        _ => 0.1,
    };
    let hits = HIGH_RISK_WORDS.iter().filter(|w| diff.contains(*w)).count();
    (base + 0.2 * hits as f32).min(1.0)
}

/// Applies the keyword rules to a diff and its commit message.
pub fn analyze_by_rules(diff: &str, message: &str) -> RuleAnalysis {
    let diff = diff.to_lowercase();
    let message = message.to_lowercase();
    let classification = classify_message(&message).to_string();

    let (refactoring_type, complexity_change) = if detect_refactoring(&diff) {
        (
            Some(refactoring_type(&diff, &message).to_string()),
            complexity_change(&diff),
        )
    } else {
        (None, 0)
    };

    let risk_score = risk_score(&diff, &classification);

    RuleAnalysis {
        classification,
        refactoring_type,
        complexity_change,
        risk_score,
    }
}

/// Builds a storable analysis from a diff, its message and hash.
pub fn analyze_commit(diff: &str, message: &str, commit_hash: &str) -> NewCommitAnalysis {
    let rules = analyze_by_rules(diff, message);
    NewCommitAnalysis {
        commit_hash: commit_hash.to_string(),
        commit_message: message.to_string(),
        files_changed: parse_git_diff(diff).paths(),
        classification: rules.classification,
        refactoring_type: rules.refactoring_type,
        complexity_change: rules.complexity_change,
        risk_score: rules.risk_score,
        suggestions: Vec::new(),
    }
}

/// Counts of complexity change directions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComplexityChanges {
    pub increased: usize,
    pub decreased: usize,
    pub neutral: usize,
}

/// Aggregates over recent commit analyses
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommitStats {
    pub total_commits: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_refactoring_type: BTreeMap<String, usize>,
    pub average_risk_score: f32,
    pub complexity_changes: ComplexityChanges,
}

impl CommitStats {
    pub fn from_history(history: &[CommitAnalysisRecord]) -> Self {
        let mut stats = Self {
            total_commits: history.len(),
            ..Default::default()
        };

        for record in history {
            *stats
                .by_type
                .entry(record.classification.clone())
                .or_default() += 1;
            if let Some(kind) = &record.refactoring_type {
                *stats.by_refactoring_type.entry(kind.clone()).or_default() += 1;
            }
            stats.average_risk_score += record.risk_score;
            match record.complexity_change {
                c if c > 0 => stats.complexity_changes.increased += 1,
                c if c < 0 => stats.complexity_changes.decreased += 1,
                _ => stats.complexity_changes.neutral += 1,
            }
        }

        if !history.is_empty() {
            stats.average_risk_score /= history.len() as f32;
        }
        stats
    }
}

/// Aggregates over recent refactoring commits
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefactoringStats {
    pub total_refactorings: usize,
    pub by_type: BTreeMap<String, usize>,
    pub average_complexity_change: f32,
    pub average_risk_score: f32,
}

impl RefactoringStats {
    pub fn from_history(history: &[CommitAnalysisRecord]) -> Self {
        let refactorings = refactoring_history(history);
        let mut stats = Self {
            total_refactorings: refactorings.len(),
            ..Default::default()
        };

        for record in &refactorings {
            if let Some(kind) = &record.refactoring_type {
                *stats.by_type.entry(kind.clone()).or_default() += 1;
            }
            stats.average_complexity_change += f32::from(record.complexity_change);
            stats.average_risk_score += record.risk_score;
        }

        if !refactorings.is_empty() {
            let n = refactorings.len() as f32;
            stats.average_complexity_change /= n;
            stats.average_risk_score /= n;
        }
        stats
    }
}

/// Records that carry a refactoring type.
pub fn refactoring_history(history: &[CommitAnalysisRecord]) -> Vec<&CommitAnalysisRecord> {
    history
        .iter()
        .filter(|record| record.refactoring_type.is_some())
        .collect()
}
