use std::sync::Arc;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: beacon_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Runs fan-out for document events posted to the hook endpoint.
    pub trigger: Arc<beacon_events::TriggerHook>,
}
