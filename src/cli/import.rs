use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use super::OutputConfig;
use crate::config::Config;
use crate::storage::EventStore;
use crate::types::Event;

#[derive(Args)]
pub struct ImportArgs {
    /// JSON file containing an array of events
    file: PathBuf,

    /// Data root (defaults to the per-user data directory)
    path: Option<PathBuf>,
}

#[derive(Serialize)]
struct ImportOutput {
    imported: usize,
}

pub async fn run(args: ImportArgs, output: OutputConfig) -> Result<()> {
    let root = super::resolve_root(args.path)?;

    let config_path = Config::config_path(&root);
    if !config_path.exists() {
        bail!(
            "Duende not initialized in {}. Run `duende init` first.",
            root.display()
        );
    }
    let config = Config::load(&config_path).context("Failed to load configuration")?;

    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let events: Vec<Event> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", args.file.display()))?;

    let store = EventStore::open(&config.db_path(&root))?;
    let mut imported = 0;
    for event in &events {
        store.insert_event(event)?;
        imported += 1;
        if output.verbose && !output.quiet && !output.json {
            println!("  {} — {} ({})", event.name, event.artist, event.date);
        }
    }
    store.close()?;

    if output.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&ImportOutput { imported })?
        );
    } else if !output.quiet {
        println!("{} {} events imported", "✓".green(), imported);
    }

    Ok(())
}
