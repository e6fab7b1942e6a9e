// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output and color utilities for consistent terminal formatting
//!
//! Provides shared color functions respecting NO_COLOR environment variable.

use colored::Colorize;

/// Check if colors should be used (respects NO_COLOR env var)
pub fn use_colors() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Colorize file path (cyan)
pub fn colorize_path(text: &str, use_color: bool) -> String {
    if use_color {
        text.cyan().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize similarity score (yellow, three decimals)
pub fn colorize_score(score: f32, use_color: bool) -> String {
    let text = format!("{:.3}", score);
    if use_color {
        text.yellow().to_string()
    } else {
        text
    }
}

/// Colorize snippet text (dimmed)
pub fn colorize_snippet(text: &str, use_color: bool) -> String {
    if use_color {
        text.dimmed().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize classification label (green)
pub fn colorize_label(text: &str, use_color: bool) -> String {
    if use_color {
        text.green().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize risk score: red at 0.7 and above, yellow from 0.4, green below
pub fn colorize_risk(risk: f32, use_color: bool) -> String {
    let text = format!("{:.2}", risk);
    if !use_color {
        return text;
    }
    if risk >= 0.7 {
        text.red().bold().to_string()
    } else if risk >= 0.4 {
        text.yellow().to_string()
    } else {
        text.green().to_string()
    }
}

/// Colorize heading (bold)
pub fn colorize_heading(text: &str, use_color: bool) -> String {
    if use_color {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}

/// Indents every line of `text` by four spaces.
pub fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_output_without_color() {
        assert_eq!(colorize_score(0.12345, false), "0.123");
        assert_eq!(colorize_risk(0.5, false), "0.50");
        assert_eq!(colorize_path("a.rs", false), "a.rs");
    }

    #[test]
    fn indent_prefixes_each_line() {
        assert_eq!(indent("a\nb"), "    a\n    b");
    }
}
