// SPDX-License-Identifier: MIT OR Apache-2.0

//! Utility functions for diffrag

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// The name of the knowledge store directory
pub const STORE_DIR: &str = ".diffrag";

/// File name of the SQLite database inside [`STORE_DIR`]
pub const STORE_FILE: &str = "knowledge.sqlite";

/// Find the nearest directory containing a `.diffrag` folder by walking up
/// from the given path.
pub fn find_store_root(start: impl AsRef<Path>) -> Option<PathBuf> {
    let mut current = start.as_ref().to_path_buf();

    // Canonicalize to handle relative paths
    if let Ok(canonical) = current.canonicalize() {
        current = canonical;
    }

    loop {
        if current.join(STORE_DIR).is_dir() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Database path for a project, preferring an existing store in a parent
/// directory and falling back to `<path>/.diffrag/knowledge.sqlite`.
pub fn default_store_path(path: impl AsRef<Path>) -> PathBuf {
    let root = find_store_root(&path).unwrap_or_else(|| path.as_ref().to_path_buf());
    root.join(STORE_DIR).join(STORE_FILE)
}

/// Truncates to at most `max_chars` characters without splitting a code point.
pub fn truncate_to_chars(input: &str, max_chars: usize) -> Cow<'_, str> {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Owned(input[..idx].to_string()),
        None => Cow::Borrowed(input),
    }
}

/// Current time as Unix milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn find_store_root_in_current_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(STORE_DIR)).unwrap();

        let root = find_store_root(dir.path()).unwrap();
        assert_eq!(root, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn find_store_root_in_parent() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(STORE_DIR)).unwrap();
        let subdir = dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();

        let root = find_store_root(&subdir).unwrap();
        assert_eq!(root, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn default_store_path_fallback() {
        let dir = TempDir::new().unwrap();
        let path = default_store_path(dir.path());
        assert_eq!(path, dir.path().join(STORE_DIR).join(STORE_FILE));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_to_chars("hello", 2), Cow::<str>::Owned("he".into()));
        assert_eq!(truncate_to_chars("hello", 5), Cow::Borrowed("hello"));
        assert_eq!(truncate_to_chars("héllo", 2), "hé");
        assert_eq!(truncate_to_chars("abc", 0), "");
    }
}
