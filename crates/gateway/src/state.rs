use std::sync::Arc;

use wsa_hub::EventHub;
use wsa_store::Store;

use crate::runtime::Orchestrator;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    // ── Persistence & live events ────────────────────────────────────
    pub store: Arc<dyn Store>,
    pub hub: EventHub,

    // ── Pipeline orchestration ────────────────────────────────────────
    pub orchestrator: Arc<Orchestrator>,
}
