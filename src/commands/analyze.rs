// SPDX-License-Identifier: MIT OR Apache-2.0

//! `analyze` command

use anyhow::Result;
use serde::Serialize;

use diffrag::analysis::{
    analyze_commit, analyze_refactoring, classify_or_rules, configured_classifier,
    enrich_patterns, parse_git_diff, retrieve_context, ContextSnippet, MetricChange,
    RefactoringAnalysis,
};
use diffrag::output::{
    colorize_heading, colorize_label, colorize_path, colorize_risk, colorize_score, use_colors,
};
use diffrag::storage::{NewCommitAnalysis, PatternMatch};
use diffrag::KnowledgeBase;

use crate::cli::OutputFormat;
use crate::commands::{print_json, read_input};

#[derive(Serialize)]
struct AnalyzeOutput {
    id: Option<String>,
    analysis: NewCommitAnalysis,
    refactoring: RefactoringAnalysis,
    context: Vec<ContextSnippet>,
    patterns: Vec<PatternMatch>,
}

/// Run the analyze command
///
/// `versions` holds the before and after source files used for metrics.
pub async fn run(
    kb: &KnowledgeBase,
    diff_source: &str,
    message: &str,
    hash: &str,
    no_save: bool,
    versions: Option<(&str, &str)>,
    format: OutputFormat,
) -> Result<()> {
    let diff = read_input(diff_source)?;
    let mut analysis = analyze_commit(&diff, message, hash);

    let sources = match versions {
        Some((before, after)) => Some((read_input(before)?, read_input(after)?)),
        None => None,
    };
    let refactoring = analyze_refactoring(
        &diff,
        sources.as_ref().map(|(before, _)| before.as_str()),
        sources.as_ref().map(|(_, after)| after.as_str()),
    );

    let classifier = configured_classifier(kb.config().analysis());
    analysis.classification = classify_or_rules(classifier.as_ref(), message).await;

    let added = parse_git_diff(&diff).added_text();
    let (context, patterns) = if added.trim().is_empty() {
        (Vec::new(), Vec::new())
    } else {
        (
            retrieve_context(kb, &added).await,
            enrich_patterns(kb, &added).await,
        )
    };

    let id = if no_save || !kb.config().analysis().save() {
        None
    } else {
        Some(kb.add_commit_analysis(analysis.clone()).await?)
    };

    let output = AnalyzeOutput {
        id,
        analysis,
        refactoring,
        context,
        patterns,
    };

    if format == OutputFormat::Json {
        return print_json(&output);
    }

    let use_color = use_colors();
    let analysis = &output.analysis;
    println!(
        "{} {}",
        colorize_heading("Classification:", use_color),
        colorize_label(&analysis.classification, use_color)
    );
    if let Some(kind) = &analysis.refactoring_type {
        println!("{} {}", colorize_heading("Refactoring:", use_color), kind);
    }
    let structure = &output.refactoring.structure;
    if !structure.patterns.is_empty() {
        let names: Vec<&str> = structure.patterns.iter().map(|p| p.as_str()).collect();
        println!(
            "{} {} ({:.1}) [{}]",
            colorize_heading("Structure:", use_color),
            structure.refactoring_type,
            structure.confidence,
            names.join(", ")
        );
    }
    if let Some(metrics) = &output.refactoring.metrics {
        println!("{}", colorize_heading("Metrics:", use_color));
        print_metric("lines", &metrics.lines_of_code);
        print_metric("functions", &metrics.functions);
        print_metric("classes", &metrics.classes);
        print_metric("complexity", &metrics.complexity);
    }
    println!(
        "{} {:+}",
        colorize_heading("Complexity change:", use_color),
        analysis.complexity_change
    );
    println!(
        "{} {}",
        colorize_heading("Risk:", use_color),
        colorize_risk(analysis.risk_score, use_color)
    );
    if !analysis.files_changed.is_empty() {
        println!("{}", colorize_heading("Files:", use_color));
        for file in &analysis.files_changed {
            println!("  {}", colorize_path(file, use_color));
        }
    }
    if !output.context.is_empty() {
        println!("{}", colorize_heading("Related code:", use_color));
        for snippet in &output.context {
            println!(
                "  {} {}",
                colorize_path(&snippet.source_path, use_color),
                colorize_score(snippet.similarity, use_color)
            );
        }
    }
    if !output.patterns.is_empty() {
        println!("{}", colorize_heading("Related patterns:", use_color));
        for found in &output.patterns {
            println!(
                "  {} ({}) {}",
                found.pattern.pattern_name,
                found.pattern.pattern_type,
                colorize_score(found.similarity, use_color)
            );
        }
    }
    if let Some(id) = &output.id {
        println!("Saved as {}", id);
    }
    Ok(())
}

fn print_metric(name: &str, metric: &MetricChange) {
    println!(
        "  {:<11} {} -> {} ({:+})",
        name, metric.before, metric.after, metric.change
    );
}
