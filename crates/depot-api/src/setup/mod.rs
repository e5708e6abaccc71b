//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::{Context, Result};
use depot_core::Config;
use depot_worker::JobScheduler;
use std::sync::Arc;

/// A fully wired application, ready to serve.
pub struct App {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    /// Reclaim job; shut it down after the server stops.
    pub scheduler: JobScheduler,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<App> {
    // Validate configuration first - fail fast on misconfiguration
    config
        .validate()
        .context("Configuration validation failed")?;

    crate::telemetry::init_telemetry(config.log_json())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;
    let (state, scheduler) = services::initialize_services(&config, pool, storage)?;
    let router = routes::setup_routes(&config, state.clone());

    Ok(App {
        state,
        router,
        scheduler,
    })
}
