use axum::routing::get;
use axum::Router;

use crate::handlers::velocity_profile;
use crate::state::AppState;

/// Routes mounted at `/velocity-profiles`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(velocity_profile::list).post(velocity_profile::create),
        )
        .route("/{id}", get(velocity_profile::get_by_id))
}
