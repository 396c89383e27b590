use std::sync::Arc;

use quickdrop_services::{CleanupService, ExchangeService};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub exchange: ExchangeService,
    pub cleanup: Arc<CleanupService>,
}
