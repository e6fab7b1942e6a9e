// SPDX-License-Identifier: MIT OR Apache-2.0

//! Commit analysis: diff parsing, rule-based classification, structural
//! refactoring detection, statistics and knowledge base enrichment.

pub mod classifier;
pub mod commit;
pub mod diff;
pub mod refactoring;
pub mod retrieval;

pub use classifier::{
    classify_or_rules, configured_classifier, Classifier, CommandClassifier, RuleClassifier,
};
pub use commit::{
    analyze_by_rules, analyze_commit, refactoring_history, CommitStats, RefactoringStats,
    RuleAnalysis, STATS_WINDOW,
};
pub use diff::{parse_git_diff, DiffFile, ParsedDiff};
pub use refactoring::{
    analyze_refactoring, analyze_structure, calculate_metrics, cyclomatic_complexity,
    detect_refactoring_patterns, CodeMetrics, MetricChange, RefactoringAnalysis,
    RefactoringPattern, StructuralAnalysis,
};
pub use retrieval::{enrich_patterns, retrieve_context, ContextSnippet};
