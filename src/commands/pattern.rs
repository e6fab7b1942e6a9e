// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pattern add` and `pattern search` commands

use anyhow::Result;
use serde_json::json;

use diffrag::output::{colorize_label, colorize_score, colorize_snippet, indent, use_colors};
use diffrag::storage::NewPattern;
use diffrag::KnowledgeBase;

use crate::cli::{OutputFormat, PatternCommands};
use crate::commands::{print_json, read_input};

/// Run a pattern subcommand
pub async fn run(kb: &KnowledgeBase, command: PatternCommands, format: OutputFormat) -> Result<()> {
    match command {
        PatternCommands::Add {
            name,
            example,
            pattern_type,
            description,
            tags,
            confidence,
        } => {
            let code_example = read_input(&example)?;
            let id = kb
                .add_pattern(NewPattern {
                    pattern_name: name.clone(),
                    pattern_type,
                    description,
                    code_example,
                    tags,
                    confidence_score: confidence,
                })
                .await?;

            match format {
                OutputFormat::Json => print_json(&json!({ "id": id, "pattern_name": name }))?,
                OutputFormat::Text => println!("Added pattern {} as {}", name, id),
            }
        }
        PatternCommands::Search {
            query,
            limit,
            threshold,
        } => {
            let results = kb.search_patterns(&query, limit, threshold).await?;
            if format == OutputFormat::Json {
                return print_json(&results);
            }

            if results.is_empty() {
                println!("No patterns found for: {}", query);
                return Ok(());
            }

            let use_color = use_colors();
            for found in &results {
                let pattern = &found.pattern;
                println!(
                    "{} ({}) {}",
                    colorize_label(&pattern.pattern_name, use_color),
                    pattern.pattern_type,
                    colorize_score(found.similarity, use_color)
                );
                if !pattern.description.is_empty() {
                    println!("  {}", pattern.description);
                }
                println!("{}", colorize_snippet(&indent(&pattern.code_example), use_color));
                println!();
            }
        }
    }
    Ok(())
}
