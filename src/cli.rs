// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// diffrag - Local knowledge store for git diff analysis
///
/// Indexes source code into an embedding-backed SQLite store and uses it to
/// add context to rule-based commit analysis.
#[derive(Parser, Debug)]
#[command(name = "diffrag")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Knowledge store database file (defaults to .diffrag/knowledge.sqlite)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Scoring strategy for queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliScoring {
    /// Cosine similarity of embeddings
    Embedding,
    /// Jaccard overlap of extracted keywords
    Keywords,
}

impl From<CliScoring> for diffrag::ScoringStrategy {
    fn from(scoring: CliScoring) -> Self {
        match scoring {
            CliScoring::Embedding => diffrag::ScoringStrategy::Embedding,
            CliScoring::Keywords => diffrag::ScoringStrategy::Keywords,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum PatternCommands {
    /// Store a named code pattern
    Add {
        /// Pattern name
        name: String,

        /// Example code (read from this file, or stdin with "-")
        #[arg(long)]
        example: String,

        /// Pattern category (e.g., design, anti-pattern)
        #[arg(short = 't', long = "type", default_value = "design")]
        pattern_type: String,

        /// Short description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Tags (can be specified multiple times)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Confidence in [0, 1]
        #[arg(long, default_value = "1.0")]
        confidence: f32,
    },

    /// Find stored patterns similar to a query
    Search {
        /// Query text
        query: String,

        /// Maximum number of results
        #[arg(short = 'm', long)]
        limit: Option<usize>,

        /// Minimum similarity (exclusive)
        #[arg(long)]
        threshold: Option<f32>,
    },
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index source files under a directory
    Index {
        /// Path to index (defaults to current directory)
        path: Option<PathBuf>,

        /// Suppress the progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Add one chunk of text to the store
    Add {
        /// File to add (or "-" for stdin)
        file: String,

        /// Source path recorded for the chunk (defaults to the file path)
        #[arg(long)]
        source: Option<String>,

        /// Chunk type tag
        #[arg(long = "type", default_value = "code")]
        chunk_type: String,

        /// Language (detected from the source path when omitted)
        #[arg(long)]
        language: Option<String>,
    },

    /// Find stored chunks similar to a query
    #[command(alias = "s")]
    Search {
        /// Query text
        query: String,

        /// Maximum number of results
        #[arg(short = 'm', long)]
        limit: Option<usize>,

        /// Minimum similarity (exclusive)
        #[arg(long)]
        threshold: Option<f32>,

        /// Scoring strategy (defaults to the configured one)
        #[arg(long, value_enum)]
        scoring: Option<CliScoring>,
    },

    /// Show stored code related to the lines a diff adds
    Context {
        /// Diff file (or "-" for stdin)
        #[arg(default_value = "-")]
        diff: String,
    },

    /// Analyze a commit diff and record the result
    Analyze {
        /// Diff file (or "-" for stdin)
        #[arg(default_value = "-")]
        diff: String,

        /// Commit message
        #[arg(short, long, default_value = "")]
        message: String,

        /// Commit hash
        #[arg(long, default_value = "")]
        hash: String,

        /// Do not store the analysis
        #[arg(long)]
        no_save: bool,

        /// Source file before the change, for refactoring metrics
        #[arg(long, requires = "after")]
        before: Option<String>,

        /// Source file after the change, for refactoring metrics
        #[arg(long, requires = "before")]
        after: Option<String>,
    },

    /// List recent commit analyses
    History {
        /// Number of records
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,

        /// Only commits classified as refactorings
        #[arg(long)]
        refactoring: bool,
    },

    /// Show store, commit and refactoring statistics
    Stats,

    /// Manage code patterns
    #[command(subcommand)]
    Pattern(PatternCommands),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
