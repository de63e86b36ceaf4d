//! Application setup and initialization
//!
//! This module contains all application initialization logic extracted from main.rs
//! for better organization and testability.

pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::Result;
use filebox_core::Config;
use filebox_storage::InitOutcome;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Everything `main` needs to start serving.
pub struct InitializedApp {
    pub router: axum::Router,
    /// Background container initialization; serving does not wait on it.
    pub storage_init: JoinHandle<InitOutcome>,
}

/// Initialize the entire application
///
/// `shutdown` bounds the background storage initialization.
pub async fn initialize_app(config: Config, shutdown: CancellationToken) -> Result<InitializedApp> {
    let (storage, storage_init) = storage::setup_storage(&config, shutdown).await?;

    let vision = services::setup_vision(&config)?;

    let state = Arc::new(AppState {
        config,
        storage,
        vision,
    });

    let router = routes::setup_routes(&state.config, state.clone())?;

    Ok(InitializedApp {
        router,
        storage_init,
    })
}
