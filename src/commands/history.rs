// SPDX-License-Identifier: MIT OR Apache-2.0

//! `history` and `stats` commands

use anyhow::Result;
use serde_json::json;
use std::collections::BTreeMap;

use diffrag::analysis::{refactoring_history, CommitStats, RefactoringStats, STATS_WINDOW};
use diffrag::output::{colorize_heading, colorize_label, colorize_risk, use_colors};
use diffrag::KnowledgeBase;

use crate::cli::OutputFormat;
use crate::commands::print_json;

/// Run the history command
pub async fn run(
    kb: &KnowledgeBase,
    limit: usize,
    refactoring_only: bool,
    format: OutputFormat,
) -> Result<()> {
    let history = kb.get_commit_history(limit).await?;
    let records: Vec<_> = if refactoring_only {
        refactoring_history(&history)
    } else {
        history.iter().collect()
    };

    if format == OutputFormat::Json {
        return print_json(&records);
    }

    if records.is_empty() {
        println!("No commit analyses recorded");
        return Ok(());
    }

    let use_color = use_colors();
    for record in records {
        let hash = if record.commit_hash.is_empty() {
            "-------"
        } else {
            record.commit_hash.get(..7).unwrap_or(&record.commit_hash)
        };
        let refactoring = record
            .refactoring_type
            .as_deref()
            .map(|kind| format!(" [{}]", kind))
            .unwrap_or_default();
        println!(
            "{} {}{} risk {} {}",
            hash,
            colorize_label(&record.classification, use_color),
            refactoring,
            colorize_risk(record.risk_score, use_color),
            record.commit_message.lines().next().unwrap_or_default()
        );
    }
    Ok(())
}

fn print_counts(title: &str, counts: &BTreeMap<String, usize>, use_color: bool) {
    if counts.is_empty() {
        return;
    }
    println!("{}", colorize_heading(title, use_color));
    for (label, count) in counts {
        println!("  {:<16} {}", label, count);
    }
}

/// Run the stats command
pub async fn run_stats(kb: &KnowledgeBase, format: OutputFormat) -> Result<()> {
    let store = kb.stats().await?;
    let history = kb.get_commit_history(STATS_WINDOW).await?;
    let commits = CommitStats::from_history(&history);
    let refactorings = RefactoringStats::from_history(&history);

    if format == OutputFormat::Json {
        return print_json(&json!({
            "store": store,
            "commits": commits,
            "refactorings": refactorings,
        }));
    }

    let use_color = use_colors();
    println!("{}", colorize_heading("Store", use_color));
    if let Some(path) = &store.path {
        println!("  path             {}", path.display());
    }
    println!("  chunks           {}", store.chunks);
    match store.embedding_dim {
        Some(dim) => println!("  dimension        {}", dim),
        None => println!("  dimension        -"),
    }
    println!("  model            {}", store.model);

    println!("{}", colorize_heading("Commits", use_color));
    println!("  analyzed         {}", commits.total_commits);
    println!(
        "  average risk     {}",
        colorize_risk(commits.average_risk_score, use_color)
    );
    println!(
        "  complexity       +{} / -{} / ={}",
        commits.complexity_changes.increased,
        commits.complexity_changes.decreased,
        commits.complexity_changes.neutral
    );
    print_counts("By type", &commits.by_type, use_color);

    println!("{}", colorize_heading("Refactorings", use_color));
    println!("  total            {}", refactorings.total_refactorings);
    println!(
        "  avg complexity   {:.2}",
        refactorings.average_complexity_change
    );
    print_counts("By refactoring", &refactorings.by_type, use_color);
    Ok(())
}
