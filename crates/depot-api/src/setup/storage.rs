//! Storage setup

use anyhow::{Context, Result};
use depot_core::Config;
use depot_storage::{create_storage, FileStorage};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn FileStorage>> {
    tracing::info!(backend = %config.storage_backend(), "Initializing storage backend...");
    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage backend")?;
    tracing::info!(
        backend = ?storage.backend_type(),
        "Storage backend initialized successfully"
    );
    Ok(storage)
}
