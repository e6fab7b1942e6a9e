// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structural refactoring analysis of a diff, plus before/after code metrics.
//!
//! Patterns are detected from the bodies of added and removed lines; file
//! headers (`+++`, `---`) are not lines of code.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

use crate::analysis::commit::UNKNOWN;
use crate::storage::chunks::branch_count;

/// Substrings that mark a line as branching, for the simplify heuristic.
const BRANCH_WORDS: &[&str] = &["if", "else", "for", "while", "switch", "case"];

fn compile(sources: &[&str]) -> Vec<Regex> {
    sources.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

static FUNCTION_DEFINITION: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"function\s+\w+\s*\(",
        r"const\s+\w+\s*=\s*\(",
        r"let\s+\w+\s*=\s*\(",
        r"var\s+\w+\s*=\s*\(",
    ])
});
static FUNCTION_COUNT: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"function\s+\w+\s*\(",
        r"const\s+\w+\s*=\s*\(",
        r"let\s+\w+\s*=\s*\(",
        r"var\s+\w+\s*=\s*\(",
        r"=>\s*\{",
    ])
});
static CALL: Lazy<Vec<Regex>> = Lazy::new(|| compile(&[r"\w+\("]));
static CALL_WITH_ARGS: Lazy<Vec<Regex>> = Lazy::new(|| compile(&[r"\w+\([^)]*\)"]));
static CLASS_MEMBER: Lazy<Vec<Regex>> =
    Lazy::new(|| compile(&[r"class\s+\w+", r"constructor\s*\(", r"this\."]));
static DECLARATION: Lazy<Vec<Regex>> = Lazy::new(|| compile(&[r"function\s+\w+", r"class\s+\w+"]));
static CLASS: Lazy<Vec<Regex>> = Lazy::new(|| compile(&[r"class\s+\w+"]));
static IDENTIFIER: Lazy<Vec<Regex>> = Lazy::new(|| compile(&[r"\b[a-zA-Z_]\w*\b"]));
static FILE_HEADER: Lazy<Vec<Regex>> = Lazy::new(|| compile(&[r"(?m)^diff --git a/\S+ b/\S+"]));

fn any_match(patterns: &[Regex], line: &str) -> bool {
    patterns.iter().any(|re| re.is_match(line))
}

fn count_matches(patterns: &[Regex], code: &str) -> usize {
    patterns.iter().map(|re| re.find_iter(code).count()).sum()
}

/// Structural refactoring shapes, in classification priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefactoringPattern {
    ExtractMethod,
    ExtractClass,
    Rename,
    Move,
    Inline,
    Simplify,
    Split,
    Merge,
}

impl RefactoringPattern {
    pub const ALL: [RefactoringPattern; 8] = [
        Self::ExtractMethod,
        Self::ExtractClass,
        Self::Rename,
        Self::Move,
        Self::Inline,
        Self::Simplify,
        Self::Split,
        Self::Merge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractMethod => "extract_method",
            Self::ExtractClass => "extract_class",
            Self::Rename => "rename",
            Self::Move => "move",
            Self::Inline => "inline",
            Self::Simplify => "simplify",
            Self::Split => "split",
            Self::Merge => "merge",
        }
    }

    /// Confidence attached when this pattern decides the type.
    pub fn confidence(&self) -> f32 {
        match self {
            Self::Rename => 0.9,
            Self::ExtractMethod => 0.8,
            Self::ExtractClass | Self::Inline | Self::Split => 0.7,
            Self::Move | Self::Simplify | Self::Merge => 0.6,
        }
    }
}

struct ChangedLines<'a> {
    added: Vec<&'a str>,
    removed: Vec<&'a str>,
    files: usize,
}

impl<'a> ChangedLines<'a> {
    fn from_diff(diff: &'a str) -> Self {
        let mut added = Vec::new();
        let mut removed = Vec::new();
        for line in diff.lines() {
            if line.starts_with("+++") || line.starts_with("---") {
                continue;
            }
            if let Some(body) = line.strip_prefix('+') {
                added.push(body);
            } else if let Some(body) = line.strip_prefix('-') {
                removed.push(body);
            }
        }
        Self {
            added,
            removed,
            files: count_matches(&FILE_HEADER, diff),
        }
    }

    fn has(&self, pattern: RefactoringPattern) -> bool {
        match pattern {
            RefactoringPattern::ExtractMethod => self.extracts_method(),
            RefactoringPattern::ExtractClass => {
                self.added.iter().any(|l| any_match(&CLASS_MEMBER, l))
            }
            RefactoringPattern::Rename => self.renames(),
            RefactoringPattern::Move => self.files > 1,
            RefactoringPattern::Inline => {
                self.removed.iter().any(|l| any_match(&CALL_WITH_ARGS, l))
                    && self.added.len() > self.removed.len()
            }
            RefactoringPattern::Simplify => {
                let branching = |lines: &[&str]| {
                    lines
                        .iter()
                        .filter(|l| BRANCH_WORDS.iter().any(|w| l.contains(*w)))
                        .count()
                };
                branching(&self.removed) > branching(&self.added)
                    && self.removed.len() > self.added.len()
            }
            RefactoringPattern::Split => {
                let (added, removed) = self.declarations();
                added > removed && added > 1
            }
            RefactoringPattern::Merge => {
                let (added, removed) = self.declarations();
                removed > added && removed > 1
            }
        }
    }

    /// A new function definition alongside a new plain call site.
    fn extracts_method(&self) -> bool {
        let defines = self.added.iter().any(|l| any_match(&FUNCTION_DEFINITION, l));
        let calls = self.added.iter().any(|l| {
            any_match(&CALL, l) && !l.contains("function") && !l.contains("=>")
        });
        defines && calls
    }

    /// Similar numbers of distinct identifiers appear and disappear.
    fn renames(&self) -> bool {
        let distinct = |lines: &[&str]| {
            lines
                .iter()
                .copied()
                .flat_map(|l| IDENTIFIER.iter().flat_map(move |re| re.find_iter(l)))
                .map(|m| m.as_str())
                .collect::<HashSet<_>>()
                .len()
        };
        let added = distinct(&self.added);
        let removed = distinct(&self.removed);
        added > 2 && removed > 2 && added.abs_diff(removed) <= 2
    }

    fn declarations(&self) -> (usize, usize) {
        let count = |lines: &[&str]| lines.iter().filter(|l| any_match(&DECLARATION, l)).count();
        (count(&self.added), count(&self.removed))
    }
}

/// Every structural pattern present in `diff`, in priority order.
pub fn detect_refactoring_patterns(diff: &str) -> Vec<RefactoringPattern> {
    let lines = ChangedLines::from_diff(diff);
    RefactoringPattern::ALL
        .into_iter()
        .filter(|pattern| lines.has(*pattern))
        .collect()
}

/// Refactoring shape of a diff
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralAnalysis {
    /// Highest-priority detected pattern, or `unknown`
    pub refactoring_type: String,
    pub confidence: f32,
    pub patterns: Vec<RefactoringPattern>,
}

/// Classifies `diff` by its highest-priority structural pattern.
pub fn analyze_structure(diff: &str) -> StructuralAnalysis {
    let patterns = detect_refactoring_patterns(diff);
    let (refactoring_type, confidence) = match patterns.first() {
        Some(pattern) => (pattern.as_str().to_string(), pattern.confidence()),
        None => (UNKNOWN.to_string(), 0.0),
    };
    StructuralAnalysis {
        refactoring_type,
        confidence,
        patterns,
    }
}

/// One metric measured before and after a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricChange {
    pub before: usize,
    pub after: usize,
    pub change: i64,
}

impl MetricChange {
    fn measure(before: &str, after: &str, metric: impl Fn(&str) -> usize) -> Self {
        let (before, after) = (metric(before), metric(after));
        Self {
            before,
            after,
            change: after as i64 - before as i64,
        }
    }
}

/// Size and shape metrics of code before and after a refactoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodeMetrics {
    pub lines_of_code: MetricChange,
    pub functions: MetricChange,
    pub classes: MetricChange,
    pub complexity: MetricChange,
}

/// Function definitions, including arrow functions with a block body.
pub fn count_functions(code: &str) -> usize {
    count_matches(&FUNCTION_COUNT, code)
}

pub fn count_classes(code: &str) -> usize {
    count_matches(&CLASS, code)
}

/// One plus every branch keyword and boolean operator. Unlike the stored
/// chunk score this is not capped.
pub fn cyclomatic_complexity(code: &str) -> usize {
    1 + branch_count(code)
}

/// Line count as separated by `\n`; an empty text is one line.
fn line_count(code: &str) -> usize {
    code.split('\n').count()
}

pub fn calculate_metrics(before: &str, after: &str) -> CodeMetrics {
    CodeMetrics {
        lines_of_code: MetricChange::measure(before, after, line_count),
        functions: MetricChange::measure(before, after, count_functions),
        classes: MetricChange::measure(before, after, count_classes),
        complexity: MetricChange::measure(before, after, cyclomatic_complexity),
    }
}

/// Structural analysis of a diff, with metrics when both code versions are
/// given and non-empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefactoringAnalysis {
    #[serde(flatten)]
    pub structure: StructuralAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<CodeMetrics>,
}

pub fn analyze_refactoring(
    diff: &str,
    before: Option<&str>,
    after: Option<&str>,
) -> RefactoringAnalysis {
    let metrics = match (before, after) {
        (Some(before), Some(after)) if !before.is_empty() && !after.is_empty() => {
            Some(calculate_metrics(before, after))
        }
        _ => None,
    };
    RefactoringAnalysis {
        structure: analyze_structure(diff),
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTRACT_DIFF: &str = "\
diff --git a/src/cart.js b/src/cart.js
--- a/src/cart.js
+++ b/src/cart.js
-  const total = items.reduce((sum, item) => sum + item.price, 0);
+  const total = sumPrices(items);
+function sumPrices(items) {
+  return items.reduce((sum, item) => sum + item.price, 0);
+}
";

    #[test]
    fn extracted_function_wins() {
        let analysis = analyze_structure(EXTRACT_DIFF);
        assert_eq!(analysis.refactoring_type, "extract_method");
        assert!((analysis.confidence - 0.8).abs() < 1e-6);
        assert_eq!(analysis.patterns[0], RefactoringPattern::ExtractMethod);
        assert!(!analysis.patterns.contains(&RefactoringPattern::ExtractClass));
    }

    #[test]
    fn renamed_identifiers_are_a_rename() {
        let diff = "\
diff --git a/src/limits.js b/src/limits.js
-const maxItems = 10;
-let count = maxItems * 2;
+const itemLimit = 10;
+let count = itemLimit * 2;
";
        let analysis = analyze_structure(diff);
        assert_eq!(analysis.patterns, vec![RefactoringPattern::Rename]);
        assert_eq!(analysis.refactoring_type, "rename");
        assert!((analysis.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn changes_across_files_are_a_move() {
        let diff = "\
diff --git a/src/a.js b/src/a.js
-export const x = 1;
diff --git a/src/b.js b/src/b.js
+export const x = 1;
";
        assert!(detect_refactoring_patterns(diff).contains(&RefactoringPattern::Move));
    }

    #[test]
    fn fewer_branches_are_a_simplification() {
        let diff = "\
-if (a) {
-  if (b) {
-    run();
-  }
-}
+if (a && b) run();
";
        let patterns = detect_refactoring_patterns(diff);
        assert!(patterns.contains(&RefactoringPattern::Simplify));
        assert!(!patterns.contains(&RefactoringPattern::Inline));
    }

    #[test]
    fn declaration_counts_decide_split_and_merge() {
        let split = "\
-function handle(req) {}
+function parse(req) {}
+function respond(res) {}
";
        let patterns = detect_refactoring_patterns(split);
        assert!(patterns.contains(&RefactoringPattern::Split));
        assert!(!patterns.contains(&RefactoringPattern::Merge));

        let merge = "\
-function parse(req) {}
-function respond(res) {}
+function handle(req) {}
";
        let patterns = detect_refactoring_patterns(merge);
        assert!(patterns.contains(&RefactoringPattern::Merge));
        assert!(!patterns.contains(&RefactoringPattern::Split));
    }

    #[test]
    fn file_headers_are_not_code() {
        let analysis = analyze_structure("diff --git a/x.js b/x.js\n--- a/x.js\n+++ b/x.js\n");
        assert_eq!(analysis.refactoring_type, "unknown");
        assert_eq!(analysis.confidence, 0.0);
        assert!(analysis.patterns.is_empty());
    }

    #[test]
    fn metrics_compare_both_versions() {
        let before = "function a() {\n  if (x) { return 1; }\n}\n";
        let after = "class Foo {\n  run() {}\n}\nconst b = () => {\n  return 2;\n};\n";
        let metrics = calculate_metrics(before, after);

        assert_eq!(
            metrics.lines_of_code,
            MetricChange {
                before: 4,
                after: 7,
                change: 3
            }
        );
        assert_eq!((metrics.functions.before, metrics.functions.after), (1, 2));
        assert_eq!((metrics.classes.before, metrics.classes.after), (0, 1));
        assert_eq!(metrics.complexity.change, -1);
    }

    #[test]
    fn complexity_is_uncapped() {
        assert_eq!(cyclomatic_complexity(&"if ".repeat(30)), 31);
        assert_eq!(cyclomatic_complexity("let x = 1;"), 1);
    }

    #[test]
    fn metrics_need_both_versions() {
        assert!(analyze_refactoring(EXTRACT_DIFF, Some("a"), None).metrics.is_none());
        assert!(analyze_refactoring(EXTRACT_DIFF, Some(""), Some("b")).metrics.is_none());

        let analysis = analyze_refactoring(EXTRACT_DIFF, Some("a"), Some("a\nb"));
        assert_eq!(analysis.metrics.map(|m| m.lines_of_code.change), Some(1));
    }
}
