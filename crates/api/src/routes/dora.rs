use axum::routing::post;
use axum::Router;

use crate::handlers::dora;
use crate::state::AppState;

/// Routes mounted at `/dora`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/deployment-frequency", post(dora::deployment_frequency))
        .route("/change-failure-rate", post(dora::change_failure_rate))
        .route("/drilldown", post(dora::drilldown))
        .route("/report", post(dora::report))
}
