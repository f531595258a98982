//! Liveness for the velocity API: database reachability plus the size of
//! the profile cache.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

pub const SERVICE_NAME: &str = "velocity-api";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub service: &'static str,
    /// `ok`, or `degraded` while the database is unreachable. DORA reports
    /// backed by Postgres fail until it recovers.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    pub cached_profiles: usize,
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = velocity_db::health_check(&state.pool).await.is_ok();
    if !db_healthy {
        tracing::warn!("Health check could not reach the database");
    }

    Json(HealthResponse {
        service: SERVICE_NAME,
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        cached_profiles: state.profiles.entry_count().await,
    })
}

/// Mounted at the root, outside `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
