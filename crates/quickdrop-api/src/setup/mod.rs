//! Application setup and initialization
//!
//! This module contains all application initialization logic extracted from main.rs
//! so that tests can build the same router without binding a socket.

pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use crate::state::AppState;
use anyhow::Result;
use quickdrop_core::Config;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A fully wired application, ready to serve.
pub struct App {
    pub state: Arc<AppState>,
    pub router: axum::Router,
    /// Background reaper; aborted on shutdown.
    pub reaper: JoinHandle<()>,
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<App> {
    // Initialize telemetry first
    quickdrop_infra::init_telemetry(config.is_production(), &config.environment)
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!("Configuration loaded and validated successfully");

    let (state, router) = build_app(config).await?;
    let reaper = Arc::clone(&state.cleanup).start();

    Ok(App {
        state,
        router,
        reaper,
    })
}

/// Wire storage, registry and routes without starting background tasks.
pub async fn build_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    config.validate()?;
    let storage = storage::setup_storage(&config).await?;
    let state = services::initialize_services(&config, storage)?;
    let router = routes::setup_routes(&config, Arc::clone(&state));
    Ok((state, router))
}
