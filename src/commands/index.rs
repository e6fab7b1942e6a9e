// SPDX-License-Identifier: MIT OR Apache-2.0

//! `index` and `add` commands

use anyhow::Result;
use colored::Colorize;
use serde_json::json;
use std::path::PathBuf;

use diffrag::indexer::IndexBuilder;
use diffrag::output::{colorize_path, use_colors};
use diffrag::KnowledgeBase;

use crate::cli::OutputFormat;
use crate::commands::{print_json, read_input};

/// Run the index command
pub async fn run(
    kb: &KnowledgeBase,
    path: Option<PathBuf>,
    quiet: bool,
    format: OutputFormat,
) -> Result<()> {
    let root = match path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    let progress = !quiet && format == OutputFormat::Text;
    let count = IndexBuilder::new(kb, &root)
        .with_progress(progress)
        .build()
        .await?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "root": root,
            "indexed": count,
        }))?,
        OutputFormat::Text => {
            if use_colors() {
                println!("{} Indexed {} files", "✓".green(), count.to_string().cyan());
            } else {
                println!("Indexed {} files", count);
            }
        }
    }
    Ok(())
}

/// Run the add command
pub async fn run_add(
    kb: &KnowledgeBase,
    file: &str,
    source: Option<&str>,
    chunk_type: &str,
    language: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let content = read_input(file)?;
    let source_path = source.unwrap_or(if file == "-" { "stdin" } else { file });
    let id = kb
        .add_chunk(&content, source_path, Some(chunk_type), language)
        .await?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "id": id,
            "source_path": source_path,
        }))?,
        OutputFormat::Text => println!(
            "Added {} as {}",
            colorize_path(source_path, use_colors()),
            id
        ),
    }
    Ok(())
}
