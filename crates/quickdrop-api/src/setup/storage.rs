//! Storage setup and initialization

use anyhow::{Context, Result};
use quickdrop_core::Config;
use quickdrop_storage::{LocalStorage, Storage};
use std::sync::Arc;

/// Open the storage directory and clear files left behind by a previous run.
///
/// The registry lives in memory only, so every stored file found at startup is unreachable.
pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!(path = %config.storage_path.display(), "Initializing storage...");

    let storage = LocalStorage::new(&config.storage_path)
        .await
        .with_context(|| {
            format!(
                "Failed to open storage directory {}",
                config.storage_path.display()
            )
        })?;

    let purged = storage
        .purge_orphans()
        .await
        .context("Failed to clear orphaned files")?;
    if purged > 0 {
        tracing::warn!(files = purged, "Removed files left over from a previous run");
    }

    storage
        .health_check()
        .await
        .context("Storage directory is not writable")?;

    tracing::info!("Storage initialized successfully");
    Ok(Arc::new(storage))
}
