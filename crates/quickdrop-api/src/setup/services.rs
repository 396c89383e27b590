//! Registry, exchange service and reaper wiring

use crate::state::AppState;
use anyhow::{Context, Result};
use quickdrop_core::{Config, RandomCodes};
use quickdrop_services::{CleanupService, ExchangeService, ItemStore, Storage};
use std::sync::Arc;

pub fn initialize_services(config: &Config, storage: Arc<dyn Storage>) -> Result<Arc<AppState>> {
    let ttl = chrono::Duration::from_std(config.item_ttl()).context("ITEM_TTL_SECS is too large")?;
    let upload_timeout = chrono::Duration::from_std(config.upload_timeout())
        .context("UPLOAD_TIMEOUT_SECS is too large")?;

    if config.reaper_interval() > config.item_ttl() {
        tracing::warn!(
            reaper_interval_secs = config.reaper_interval_secs,
            item_ttl_secs = config.item_ttl_secs,
            "Reaper interval exceeds item TTL; expired files will linger on disk"
        );
    }

    let store = ItemStore::new();
    let exchange = ExchangeService::new(
        store.clone(),
        Arc::clone(&storage),
        Arc::new(RandomCodes),
        ttl,
    );
    let cleanup = Arc::new(CleanupService::new(
        store,
        storage,
        config.reaper_interval(),
        upload_timeout,
    ));

    tracing::info!(
        item_ttl_secs = config.item_ttl_secs,
        reaper_interval_secs = config.reaper_interval_secs,
        upload_timeout_secs = config.upload_timeout_secs,
        "Exchange services initialized"
    );

    Ok(Arc::new(AppState {
        exchange,
        cleanup,
    }))
}
