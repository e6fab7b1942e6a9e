// SPDX-License-Identifier: MIT OR Apache-2.0

//! diffrag - Local knowledge store for git diff analysis
//!
//! Indexes code into an embedding-backed SQLite store and enriches
//! rule-based commit analysis with similar stored code.

mod cli;
mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

use diffrag::{Config, KnowledgeBase};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with DIFFRAG_LOG env var (e.g., DIFFRAG_LOG=debug diffrag search "query")
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("DIFFRAG_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    let cwd = std::env::current_dir()?;
    let mut config = Config::load(&cwd);
    if let Some(store) = cli.store {
        config.storage.path = Some(store);
    }
    // Nothing is opened until a command touches the store.
    let kb = KnowledgeBase::new(config);

    match cli.command {
        Commands::Index { path, quiet } => {
            commands::index::run(&kb, path, quiet, format).await?;
        }
        Commands::Add {
            file,
            source,
            chunk_type,
            language,
        } => {
            commands::index::run_add(
                &kb,
                &file,
                source.as_deref(),
                &chunk_type,
                language.as_deref(),
                format,
            )
            .await?;
        }
        Commands::Search {
            query,
            limit,
            threshold,
            scoring,
        } => {
            commands::search::run(
                &kb,
                &query,
                limit,
                threshold,
                scoring.map(Into::into),
                format,
            )
            .await?;
        }
        Commands::Context { diff } => {
            commands::search::run_context(&kb, &diff, format).await?;
        }
        Commands::Analyze {
            diff,
            message,
            hash,
            no_save,
            before,
            after,
        } => {
            let versions = before.as_deref().zip(after.as_deref());
            commands::analyze::run(&kb, &diff, &message, &hash, no_save, versions, format)
                .await?;
        }
        Commands::History { limit, refactoring } => {
            commands::history::run(&kb, limit, refactoring, format).await?;
        }
        Commands::Stats => {
            commands::history::run_stats(&kb, format).await?;
        }
        Commands::Pattern(command) => {
            commands::pattern::run(&kb, command, format).await?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "diffrag", &mut std::io::stdout());
        }
    }

    Ok(())
}
