mod batch;
mod completions;
mod count;
mod import;
mod init;
mod serve;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "duende")]
#[command(about = "Flamenco events discovery API server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Show detailed progress
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a duende data directory
    Init(init::InitArgs),

    /// Run the HTTP API server
    Serve(serve::ServeArgs),

    /// Count upcoming listable events
    Count(count::CountArgs),

    /// Import events from a JSON file
    Import(import::ImportArgs),

    /// Generate missing night plans in one batch
    Batch(batch::BatchArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let output = OutputConfig {
            json: self.json,
            quiet: self.quiet,
            verbose: self.verbose,
        };

        match self.command {
            Commands::Init(args) => init::run(args, output).await,
            Commands::Serve(args) => serve::run(args, output).await,
            Commands::Count(args) => count::run(args, output).await,
            Commands::Import(args) => import::run(args, output).await,
            Commands::Batch(args) => batch::run(args, output).await,
            Commands::Completions(args) => {
                completions::run(args);
                Ok(())
            }
        }
    }
}

/// Output configuration passed to all commands
#[derive(Debug, Clone, Copy)]
pub struct OutputConfig {
    pub json: bool,
    pub quiet: bool,
    pub verbose: bool,
}

/// Resolve the data root: an explicit path, or the per-user data
/// directory when none is given.
fn resolve_root(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(p) => p
            .canonicalize()
            .with_context(|| format!("Invalid path: {}", p.display())),
        None => Config::default_root(),
    }
}
