use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use velocity_core::error::CoreError;
use velocity_core::profile::VelocityProfile;
use velocity_core::types::DbId;
use velocity_db::models::velocity_profile::CreateVelocityProfile;
use velocity_db::repositories::VelocityProfileRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/velocity-profiles
///
/// Filter specs and thresholds are validated before anything is stored.
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateVelocityProfile>,
) -> AppResult<(StatusCode, Json<DataResponse<VelocityProfile>>)> {
    let candidate = VelocityProfile {
        id: 0,
        name: input.name.clone(),
        ou_ref_ids: input.ou_ref_ids.clone(),
        deployment_frequency: input.config.deployment_frequency.clone(),
        change_failure_rate: input.config.change_failure_rate.clone(),
        lead_time_for_change: input.config.lead_time_for_change.clone(),
        mean_time_to_restore: input.config.mean_time_to_restore.clone(),
    };
    candidate.validate()?;

    let row = VelocityProfileRepo::create(&state.pool, &input).await?;
    tracing::info!(profile_id = row.id, "Created velocity profile");
    // OU mappings may now resolve to a different profile.
    state.profiles.clear().await;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse { data: row.into() }),
    ))
}

/// GET /api/v1/velocity-profiles
pub async fn list(State(state): State<AppState>) -> AppResult<Json<DataResponse<Vec<VelocityProfile>>>> {
    let rows = VelocityProfileRepo::list(&state.pool).await?;
    Ok(Json(DataResponse {
        data: rows.into_iter().map(VelocityProfile::from).collect(),
    }))
}

/// GET /api/v1/velocity-profiles/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<VelocityProfile>>> {
    let row = VelocityProfileRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "VelocityProfile",
            id,
        }))?;
    Ok(Json(DataResponse { data: row.into() }))
}
