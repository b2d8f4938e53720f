//! HTTP server for the Duende REST API.
//!
//! One router, one shared store, one planner. The per-request flow is
//! classify → assemble → execute → normalize; the store call is the
//! only suspension point.

mod handlers;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::content::{ContentGenerator, GeminiClient};
use crate::planner::QueryPlanner;
use crate::references::ReferenceData;
use crate::storage::EventStore;

/// Shared application state for HTTP handlers
pub struct AppState {
    pub config: Config,
    pub planner: QueryPlanner,
    pub store: Mutex<EventStore>,
    /// None when no API key is configured; content endpoints answer 503.
    pub generator: Option<Arc<dyn ContentGenerator>>,
}

/// Run the HTTP server for an initialized data root.
pub async fn run_server(root: &Path, port: Option<u16>) -> Result<()> {
    let config_path = Config::config_path(root);
    if !config_path.exists() {
        anyhow::bail!(
            "Duende not initialized in {}. Run `duende init` first.",
            root.display()
        );
    }

    let config = Config::load(&config_path).context("Failed to load config")?;

    let refs = match &config.references.path {
        Some(path) => ReferenceData::load(path)?,
        None => ReferenceData::default(),
    };
    tracing::info!(version = refs.version, "Loaded reference data");

    let store = EventStore::open(&config.db_path(root)).context("Failed to open event store")?;

    let generator: Option<Arc<dyn ContentGenerator>> = match GeminiClient::new(&config.content) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "Content generation disabled");
            None
        }
    };

    let port = port.unwrap_or(config.server.port);
    let state = Arc::new(AppState {
        planner: QueryPlanner::new(refs),
        store: Mutex::new(store),
        generator,
        config,
    });

    let app = handlers::router(Arc::clone(&state));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Duende HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("HTTP server error")?;

    // The router is gone once serve returns; close the store explicitly.
    if let Ok(state) = Arc::try_unwrap(state) {
        state.store.into_inner().close()?;
    }

    Ok(())
}
