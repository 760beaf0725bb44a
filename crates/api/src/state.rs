use std::sync::Arc;

use procman_core::registry::ProcessRegistry;
use procman_db::JobStore;

use crate::config::ServerConfig;
use crate::engine::ExecutionCoordinator;
use crate::render::ResultRenderer;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (every field is behind an `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Job persistence.
    pub store: Arc<dyn JobStore>,
    /// Registered processes, immutable after start-up.
    pub registry: Arc<ProcessRegistry>,
    /// Runs execute requests and tracks asynchronous jobs.
    pub coordinator: Arc<ExecutionCoordinator>,
    /// HTML rendering of job results.
    pub renderer: Arc<dyn ResultRenderer>,
}

impl AppState {
    /// Wire the coordinator to `store` and `registry` using `config`.
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<ProcessRegistry>,
        renderer: Arc<dyn ResultRenderer>,
        config: &ServerConfig,
    ) -> Self {
        let coordinator = Arc::new(ExecutionCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            config.base_url.clone(),
            config.pretty_print,
        ));

        Self {
            store,
            registry,
            coordinator,
            renderer,
        }
    }
}
