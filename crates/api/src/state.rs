use std::sync::Arc;

use velocity_core::engine::DoraEngine;

use crate::cache::ProfileCache;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or is already a handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: velocity_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Aggregation engine over the registered event sources.
    pub engine: Arc<DoraEngine>,
    /// Read-through profile cache.
    pub profiles: Arc<ProfileCache>,
}
