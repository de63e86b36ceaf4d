//! Storage setup and initialization

use anyhow::{Context, Result};
use filebox_core::Config;
use filebox_storage::{create_storage, spawn_initializer, InitOutcome, Storage};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Build the storage backend and start creating its container in the
/// background.
pub async fn setup_storage(
    config: &Config,
    shutdown: CancellationToken,
) -> Result<(Arc<dyn Storage>, JoinHandle<InitOutcome>)> {
    tracing::info!("Initializing storage abstraction...");
    let storage = create_storage(config)
        .await
        .context("Failed to configure storage backend")?;
    tracing::info!(
        backend = %storage.backend_type(),
        container = ?config.container_name.as_deref().or(config.local_storage_path.as_deref()),
        "Storage abstraction initialized successfully"
    );

    let init = spawn_initializer(storage.clone(), shutdown);

    Ok((storage, init))
}
