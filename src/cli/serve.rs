use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use super::OutputConfig;

#[derive(Args)]
pub struct ServeArgs {
    /// Data root to serve (defaults to the per-user data directory)
    path: Option<PathBuf>,

    /// Override the configured HTTP port
    #[arg(long)]
    port: Option<u16>,
}

pub async fn run(args: ServeArgs, _output: OutputConfig) -> Result<()> {
    let root = super::resolve_root(args.path)?;
    crate::http::run_server(&root, args.port).await
}
