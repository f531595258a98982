pub mod dora;
pub mod health;
pub mod velocity_profile;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /dora/deployment-frequency                       deployment frequency report (POST)
/// /dora/change-failure-rate                        change failure rate report (POST)
/// /dora/drilldown                                  records behind a report (POST)
/// /dora/report                                     report and drill-down together (POST)
///
/// /velocity-profiles                               list, create
/// /velocity-profiles/{id}                          get
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/dora", dora::router())
        .nest("/velocity-profiles", velocity_profile::router())
}
