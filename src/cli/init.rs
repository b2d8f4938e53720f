use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use super::OutputConfig;
use crate::config::Config;
use crate::references::ReferenceData;
use crate::storage::EventStore;

#[derive(Args)]
pub struct InitArgs {
    /// Data root to initialize (defaults to the per-user data directory)
    path: Option<PathBuf>,

    /// Overwrite existing configuration
    #[arg(long)]
    force: bool,
}

#[derive(Serialize)]
struct InitOutput {
    status: String,
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    references: Option<String>,
}

pub async fn run(args: InitArgs, output: OutputConfig) -> Result<()> {
    let root = match args.path {
        Some(p) => {
            std::fs::create_dir_all(&p)
                .with_context(|| format!("Failed to create directory: {}", p.display()))?;
            p.canonicalize()
                .with_context(|| format!("Invalid path: {}", p.display()))?
        }
        None => {
            let root = Config::default_root()?;
            std::fs::create_dir_all(&root)
                .with_context(|| format!("Failed to create directory: {}", root.display()))?;
            root
        }
    };

    let data_dir = Config::data_dir(&root);
    let config_path = Config::config_path(&root);
    let references_path = data_dir.join("references.toml");

    // Check if already initialized
    if config_path.exists() && !args.force {
        if output.json {
            let json_output = InitOutput {
                status: "already_initialized".to_string(),
                path: data_dir.display().to_string(),
                config: Some(config_path.display().to_string()),
                database: None,
                references: None,
            };
            println!("{}", serde_json::to_string_pretty(&json_output)?);
            return Ok(());
        }
        bail!(
            "Duende already initialized in {}. Use --force to reinitialize.",
            data_dir.display()
        );
    }

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

    // Write the canonical reference data and point the config at it so
    // list updates go through one versioned file.
    let references = ReferenceData::default();
    references.save(&references_path)?;

    let mut config = Config::default();
    config.references.path = Some(references_path.clone());
    config.save(&config_path)?;

    if output.verbose && !output.quiet && !output.json {
        println!("  Creating config: {}", config_path.display());
        println!("  Creating references: {}", references_path.display());
    }

    let db_path = config.db_path(&root);
    if args.force && db_path.exists() {
        std::fs::remove_file(&db_path).with_context(|| {
            format!("Failed to remove existing database: {}", db_path.display())
        })?;
    }
    let store = EventStore::open(&db_path).with_context(|| {
        format!("Failed to initialize database: {}", db_path.display())
    })?;
    store.close()?;

    if output.verbose && !output.quiet && !output.json {
        println!("  Creating database: {}", db_path.display());
    }

    if output.json {
        let json_output = InitOutput {
            status: "initialized".to_string(),
            path: data_dir.display().to_string(),
            config: Some(config_path.display().to_string()),
            database: Some(db_path.display().to_string()),
            references: Some(references_path.display().to_string()),
        };
        println!("{}", serde_json::to_string_pretty(&json_output)?);
    } else if !output.quiet {
        println!(
            "{} Duende initialized in {}",
            "✓".green(),
            data_dir.display()
        );
        println!("  Config:     {}", config_path.display());
        println!("  Database:   {}", db_path.display());
        println!("  References: {}", references_path.display());
        println!("\nNext steps:");
        println!("  {} to run the API server", "duende serve".cyan());
        println!("  {} to check the event count", "duende count".cyan());
    }

    Ok(())
}
