use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use super::OutputConfig;
use crate::config::Config;
use crate::content::{batch::run_batch, GeminiClient};
use crate::storage::EventStore;

#[derive(Args)]
pub struct BatchArgs {
    /// Data root (defaults to the per-user data directory)
    path: Option<PathBuf>,

    /// Override the configured batch size
    #[arg(long)]
    batch_size: Option<usize>,
}

#[derive(Serialize)]
struct BatchOutput {
    generated: usize,
    failed: usize,
    remaining: u64,
}

pub async fn run(args: BatchArgs, output: OutputConfig) -> Result<()> {
    let root = super::resolve_root(args.path)?;

    let config_path = Config::config_path(&root);
    if !config_path.exists() {
        bail!(
            "Duende not initialized in {}. Run `duende init` first.",
            root.display()
        );
    }
    let config = Config::load(&config_path).context("Failed to load configuration")?;

    let generator = GeminiClient::new(&config.content)
        .context("Content generation needs an API key (set GEMINI_API_KEY)")?;
    let store = tokio::sync::Mutex::new(EventStore::open(&config.db_path(&root))?);

    let batch_size = args.batch_size.unwrap_or(config.content.batch_size);
    let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();

    let spinner = if output.quiet || output.json {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
        pb.set_message(format!("Generating up to {batch_size} night plans…"));
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };

    let outcome = run_batch(&store, &generator, &today, batch_size).await?;
    spinner.finish_and_clear();
    store.into_inner().close()?;

    if output.json {
        let json_output = BatchOutput {
            generated: outcome.generated,
            failed: outcome.failed,
            remaining: outcome.remaining,
        };
        println!("{}", serde_json::to_string_pretty(&json_output)?);
    } else if !output.quiet {
        println!(
            "{} {} generated, {} failed, {} remaining",
            "✓".green(),
            outcome.generated,
            outcome.failed,
            outcome.remaining
        );
        if outcome.remaining > 0 {
            println!("Run {} again to continue.", "duende batch".cyan());
        }
    }

    Ok(())
}
