use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use super::OutputConfig;
use crate::config::Config;
use crate::planner::QueryPlanner;
use crate::storage::EventStore;

#[derive(Args)]
pub struct CountArgs {
    /// Data root (defaults to the per-user data directory)
    path: Option<PathBuf>,
}

#[derive(Serialize)]
struct CountOutput {
    total: u64,
}

pub async fn run(args: CountArgs, output: OutputConfig) -> Result<()> {
    let root = super::resolve_root(args.path)?;

    let config_path = Config::config_path(&root);
    if !config_path.exists() {
        bail!(
            "Duende not initialized in {}. Run `duende init` first.",
            root.display()
        );
    }
    let config = Config::load(&config_path).context("Failed to load configuration")?;

    let store = EventStore::open(&config.db_path(&root))?;
    let filter = QueryPlanner::eligibility_filter(chrono::Local::now().date_naive());
    let total = store.count_matching(&filter)?;
    store.close()?;

    if output.json {
        println!("{}", serde_json::to_string_pretty(&CountOutput { total })?);
    } else if !output.quiet {
        println!("{} upcoming events", total.to_string().cyan());
    }

    Ok(())
}
