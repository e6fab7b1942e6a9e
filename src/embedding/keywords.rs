// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyword extraction used for chunk metadata, keyword scoring and the
//! hash fallback embedding.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Maximum number of keywords kept per text.
pub const MAX_KEYWORDS: usize = 50;

/// Tokens of this length or shorter are always dropped.
const MIN_TOKEN_LEN: usize = 3;

/// Tokens longer than this are kept even outside the vocabulary.
const LONG_TOKEN_LEN: usize = 4;

const TECH_VOCABULARY: &[&str] = &[
    "function", "class", "const", "let", "var", "async", "await", "import", "export", "try",
    "catch", "if", "else", "for", "while", "return", "throw", "new", "this", "super", "extends",
    "implements", "interface", "type", "enum", "namespace", "module", "require", "promise",
    "callback", "event", "listener", "middleware", "route", "controller", "service", "model",
    "view", "component", "hook", "refactor", "optimize", "performance", "security", "test",
    "mock",
];

static VOCABULARY: Lazy<HashSet<&'static str>> =
    Lazy::new(|| TECH_VOCABULARY.iter().copied().collect());

/// Extracts up to [`MAX_KEYWORDS`] unique lowercase tokens in first-seen order.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
        .collect();

    let mut seen = HashSet::new();
    let mut keywords = Vec::new();

    for token in normalized.split_whitespace() {
        let len = token.chars().count();
        if len < MIN_TOKEN_LEN {
            continue;
        }
        if !(VOCABULARY.contains(token) || len > LONG_TOKEN_LEN) {
            continue;
        }
        if seen.insert(token) {
            keywords.push(token.to_string());
            if keywords.len() == MAX_KEYWORDS {
                break;
            }
        }
    }

    keywords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_vocabulary_and_long_tokens() {
        let keywords = extract_keywords("The Quick BROWN function() { if (x) {} }");
        assert!(keywords.contains(&"function".to_string()));
        assert!(keywords.contains(&"quick".to_string()));
        assert!(keywords.contains(&"brown".to_string()));
        assert!(keywords.iter().all(|k| k.chars().count() > 2));
        assert!(!keywords.contains(&"if".to_string()));
        // "the" is three letters and not in the vocabulary
        assert!(!keywords.contains(&"the".to_string()));
    }

    #[test]
    fn deduplicates_in_first_seen_order() {
        let keywords = extract_keywords("service Controller service controller_impl");
        assert_eq!(keywords, vec!["service", "controller", "controller_impl"]);
    }

    #[test]
    fn caps_result_length() {
        let text: String = (0..200).map(|i| format!("identifier{} ", i)).collect();
        let keywords = extract_keywords(&text);
        assert_eq!(keywords.len(), MAX_KEYWORDS);
        assert_eq!(keywords[0], "identifier0");
    }

    #[test]
    fn punctuation_splits_tokens() {
        let keywords = extract_keywords("user.service->render(props)");
        assert_eq!(keywords, vec!["service", "render", "props"]);
    }
}
