// SPDX-License-Identifier: MIT OR Apache-2.0

//! `search` and `context` commands

use anyhow::Result;
use colored::Colorize;

use diffrag::analysis::{parse_git_diff, retrieve_context};
use diffrag::output::{colorize_path, colorize_score, colorize_snippet, indent, use_colors};
use diffrag::storage::SearchOptions;
use diffrag::{KnowledgeBase, ScoringStrategy};

use crate::cli::OutputFormat;
use crate::commands::{print_json, read_input};

/// Run the search command
pub async fn run(
    kb: &KnowledgeBase,
    query: &str,
    limit: Option<usize>,
    threshold: Option<f32>,
    scoring: Option<ScoringStrategy>,
    format: OutputFormat,
) -> Result<()> {
    let search = kb.config().search();
    let options = SearchOptions {
        limit: limit.unwrap_or_else(|| search.limit()),
        threshold: threshold.unwrap_or_else(|| search.threshold()),
        snippet_chars: search.snippet_chars(),
    };
    let scoring = scoring.unwrap_or_else(|| search.scoring());
    let results = kb.search_with(query, options, scoring).await?;

    if format == OutputFormat::Json {
        return print_json(&results);
    }

    let use_color = use_colors();
    if results.is_empty() {
        if use_color {
            println!("{} No results found for: {}", "✗".red(), query.yellow());
        } else {
            println!("No results found for: {}", query);
        }
        return Ok(());
    }

    println!(
        "\nFound {} results for: {} ({})\n",
        results.len(),
        query,
        scoring
    );
    for result in &results {
        println!(
            "{} [{}] {}",
            colorize_path(&result.source_path, use_color),
            result.language,
            colorize_score(result.similarity, use_color)
        );
        println!("{}", colorize_snippet(&indent(&result.content), use_color));
        println!();
    }
    Ok(())
}

/// Run the context command
pub async fn run_context(kb: &KnowledgeBase, diff_source: &str, format: OutputFormat) -> Result<()> {
    let diff = read_input(diff_source)?;
    let added = parse_git_diff(&diff).added_text();
    let query = if added.trim().is_empty() { diff } else { added };
    let snippets = retrieve_context(kb, &query).await;

    if format == OutputFormat::Json {
        return print_json(&snippets);
    }

    let use_color = use_colors();
    if snippets.is_empty() {
        println!("No related code found");
        return Ok(());
    }
    for snippet in &snippets {
        println!(
            "{} {}",
            colorize_path(&snippet.source_path, use_color),
            colorize_score(snippet.similarity, use_color)
        );
        println!("{}", colorize_snippet(&indent(&snippet.snippet), use_color));
        println!();
    }
    Ok(())
}
