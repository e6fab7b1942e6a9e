// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source file scanner using walkdir

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::utils::STORE_DIR;

/// Directory names never descended into
pub const SKIP_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    ".next",
    "coverage",
    "db",
    ".vscode",
    STORE_DIR,
];

/// File extensions that are indexed
pub const SOURCE_EXTENSIONS: &[&str] = &[
    "js", "ts", "jsx", "tsx", "py", "java", "cpp", "c", "go", "rs", "php", "rb",
];

/// File scanner that skips build output, dependency and hidden directories
pub struct FileScanner {
    root: PathBuf,
    extra_skip_dirs: Vec<String>,
    max_file_size: u64,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extra_skip_dirs: Vec::new(),
            max_file_size: 1024 * 1024,
        }
    }

    /// Skip directories with these names as well
    pub fn with_exclude_dirs(mut self, dirs: &[String]) -> Self {
        self.extra_skip_dirs = dirs.to_vec();
        self
    }

    /// Skip files larger than `bytes`
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    fn is_skipped_dir(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let Some(name) = entry.file_name().to_str() else {
            return false;
        };
        name.starts_with('.')
            || SKIP_DIRS.contains(&name)
            || self.extra_skip_dirs.iter().any(|d| d == name)
    }

    /// Candidate source file paths, in walk order
    pub fn list_files(&self) -> (Vec<PathBuf>, usize) {
        let mut files = Vec::new();
        let mut errors = 0usize;

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_skipped_dir(e))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read directory entry: {}", e);
                    errors += 1;
                    continue;
                }
            };

            if !entry.file_type().is_file() || !is_source_file(entry.path()) {
                continue;
            }

            match entry.metadata() {
                Ok(meta) if meta.len() > self.max_file_size => {
                    tracing::debug!("Skipping large file {}", entry.path().display());
                }
                Ok(_) => files.push(entry.into_path()),
                Err(e) => {
                    tracing::warn!("Failed to get metadata for {}: {}", entry.path().display(), e);
                    errors += 1;
                }
            }
        }

        (files, errors)
    }
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| SOURCE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Detect language from a file path's extension
pub fn detect_language(path: impl AsRef<Path>) -> &'static str {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" => "python",
        "java" => "java",
        "cpp" => "cpp",
        "c" => "c",
        "go" => "go",
        "rs" => "rust",
        "php" => "php",
        "rb" => "ruby",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(paths: &[PathBuf], root: &Path) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn skips_dependency_and_hidden_dirs() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for sub in ["src", "node_modules", ".cache", "dist", "vendor"] {
            fs::create_dir(root.join(sub)).unwrap();
            fs::write(root.join(sub).join("a.js"), "let a = 1;").unwrap();
        }
        fs::write(root.join("README.md"), "# readme").unwrap();

        let scanner = FileScanner::new(root).with_exclude_dirs(&["vendor".to_string()]);
        let (files, errors) = scanner.list_files();
        assert_eq!(names(&files, root), vec!["src/a.js"]);
        assert_eq!(errors, 0);
    }

    #[test]
    fn hidden_root_is_still_walked() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join(".project");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("main.py"), "print('hi')").unwrap();

        let (files, errors) = FileScanner::new(&root).list_files();
        assert_eq!(names(&files, &root), vec!["main.py"]);
        assert_eq!(errors, 0);
    }

    #[test]
    fn respects_max_file_size() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("big.rs"), "x".repeat(2048)).unwrap();
        fs::write(dir.path().join("small.rs"), "fn main() {}").unwrap();

        let (files, _) = FileScanner::new(dir.path()).with_max_file_size(1024).list_files();
        assert_eq!(names(&files, dir.path()), vec!["small.rs"]);
    }

    #[test]
    fn detect_language_by_extension() {
        assert_eq!(detect_language("a/b.TSX"), "typescript");
        assert_eq!(detect_language("lib.rs"), "rust");
        assert_eq!(detect_language("notes.md"), "unknown");
        assert_eq!(detect_language("Makefile"), "unknown");
    }
}
