//! Application state for the API server

use std::sync::Arc;

use crate::config::Config;
use crate::engine::Engine;
use crate::event_hub::EventHub;

/// Shared application state accessible to all route handlers.
///
/// `Engine` is already a cheap Arc-wrapped handle, so this struct clones for
/// free per request; only `Config` needs its own Arc.
#[derive(Clone)]
pub struct AppState {
    /// The task engine: queue, dispatcher, pause/cancel/retry
    pub engine: Engine,
    /// Pub/sub hub backing the SSE endpoints
    pub hub: EventHub,
    /// Effective runtime configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Build state from its collaborators.
    pub fn new(engine: Engine, hub: EventHub, config: Arc<Config>) -> Self {
        Self { engine, hub, config }
    }
}
