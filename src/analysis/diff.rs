// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unified git diff parsing.

use serde::Serialize;

/// Per-file counts and added text from a git diff
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffFile {
    /// Path taken from the `a/` side of the `diff --git` header
    pub path: String,
    pub added_lines: usize,
    pub removed_lines: usize,
    /// Added lines without their `+`, newline-terminated
    pub added_content: String,
}

/// A parsed diff
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedDiff {
    pub files: Vec<DiffFile>,
}

impl ParsedDiff {
    /// Paths of every changed file, in diff order.
    pub fn paths(&self) -> Vec<String> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    /// All added text across files.
    pub fn added_text(&self) -> String {
        self.files.iter().map(|f| f.added_content.as_str()).collect()
    }

    pub fn added_lines(&self) -> usize {
        self.files.iter().map(|f| f.added_lines).sum()
    }

    pub fn removed_lines(&self) -> usize {
        self.files.iter().map(|f| f.removed_lines).sum()
    }
}

/// Splits a `diff --git` header into the path on its `a/` side.
fn header_path(line: &str) -> String {
    let raw = line.split(' ').nth(2).unwrap_or_default();
    raw.strip_prefix("a/").unwrap_or(raw).to_string()
}

/// Parses unified diff text. Lines before the first `diff --git` header are
/// ignored; `+++`/`---` file markers are not counted.
pub fn parse_git_diff(diff: &str) -> ParsedDiff {
    let mut files = Vec::new();
    let mut current: Option<DiffFile> = None;

    for line in diff.lines() {
        if line.starts_with("diff --git") {
            files.extend(current.take());
            current = Some(DiffFile {
                path: header_path(line),
                ..Default::default()
            });
            continue;
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        if let Some(added) = line.strip_prefix('+') {
            if !line.starts_with("+++") {
                file.added_lines += 1;
                file.added_content.push_str(added);
                file.added_content.push('\n');
            }
        } else if line.starts_with('-') && !line.starts_with("---") {
            file.removed_lines += 1;
        }
    }
    files.extend(current);

    ParsedDiff { files }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
diff --git a/index.js b/index.js
index 000..111 100644
--- a/index.js
+++ b/index.js
@@ -0,0 +1,2 @@
+const x = 1;
+console.log(x);
diff --git a/src/old.rs b/src/old.rs
--- a/src/old.rs
+++ b/src/old.rs
@@ -1,3 +1,1 @@
-fn a() {}
-fn b() {}
+fn ab() {}
";

    #[test]
    fn counts_lines_per_file() {
        let parsed = parse_git_diff(SAMPLE);
        assert_eq!(parsed.paths(), vec!["index.js", "src/old.rs"]);

        let first = &parsed.files[0];
        assert_eq!(first.added_lines, 2);
        assert_eq!(first.removed_lines, 0);
        assert!(first.added_content.contains("const x = 1"));

        let second = &parsed.files[1];
        assert_eq!(second.added_lines, 1);
        assert_eq!(second.removed_lines, 2);

        assert_eq!(parsed.added_lines(), 3);
        assert_eq!(parsed.removed_lines(), 2);
        assert_eq!(
            parsed.added_text(),
            "const x = 1;\nconsole.log(x);\nfn ab() {}\n"
        );
    }

    #[test]
    fn text_without_headers_has_no_files() {
        let parsed = parse_git_diff("+added\n-removed\n");
        assert!(parsed.files.is_empty());
        assert_eq!(parsed.added_text(), "");
    }
}
