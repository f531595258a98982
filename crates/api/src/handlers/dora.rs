//! Handlers for DORA deployment reports and drill-downs.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use velocity_core::drilldown::{DrillDownPage, DrillDownRequest};
use velocity_core::engine::DoraResponse;
use velocity_core::profile::{Metric, SpecRole, VelocityProfile};
use velocity_core::request::{OuScope, RequestFilter};
use velocity_core::types::DbId;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body shared by every DORA endpoint.
///
/// The profile is taken from `profile_id` when present, otherwise from the
/// organisational unit (`ou_ref_id`, then `ou.ou_ref_id`).
#[derive(Debug, Deserialize)]
pub struct DoraRequest {
    pub profile_id: Option<DbId>,
    pub ou_ref_id: Option<DbId>,
    /// Drill-down and report only. Defaults to deployment frequency.
    pub metric: Option<Metric>,
    /// Drill-down only. Defaults to the filter spec the metric's series counts.
    pub role: Option<SpecRole>,
    pub filter: RequestFilter,
    pub ou: Option<OuScope>,
    #[serde(flatten)]
    pub page: DrillDownRequest,
}

/// Report plus the drill-down over the same predicate.
#[derive(Debug, Serialize)]
pub struct ReportWithDrillDown {
    pub report: DoraResponse,
    pub drill_down: DrillDownPage,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn resolve_profile(state: &AppState, body: &DoraRequest) -> AppResult<Arc<VelocityProfile>> {
    let ou_ref_id = body.ou_ref_id.or(body.ou.as_ref().map(|ou| ou.ou_ref_id));
    let profile = match (body.profile_id, ou_ref_id) {
        (Some(id), _) => state.profiles.by_id(id).await?,
        (None, Some(ou_ref_id)) => state.profiles.for_ou(ou_ref_id).await?,
        (None, None) => {
            return Err(AppError::BadRequest(
                "profile_id or ou_ref_id is required".into(),
            ))
        }
    };
    Ok(profile)
}

/// The spec whose events a metric's series counts.
fn default_role(metric: Metric) -> SpecRole {
    match metric {
        Metric::ChangeFailureRate => SpecRole::Failed,
        _ => SpecRole::Total,
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/dora/deployment-frequency
pub async fn deployment_frequency(
    State(state): State<AppState>,
    Json(body): Json<DoraRequest>,
) -> AppResult<Json<DataResponse<DoraResponse>>> {
    let profile = resolve_profile(&state, &body).await?;
    let report = state
        .engine
        .deployment_frequency(&profile, &body.filter, body.ou.as_ref())
        .await?;
    Ok(Json(DataResponse { data: report }))
}

/// POST /api/v1/dora/change-failure-rate
pub async fn change_failure_rate(
    State(state): State<AppState>,
    Json(body): Json<DoraRequest>,
) -> AppResult<Json<DataResponse<DoraResponse>>> {
    let profile = resolve_profile(&state, &body).await?;
    let report = state
        .engine
        .change_failure_rate(&profile, &body.filter, body.ou.as_ref())
        .await?;
    Ok(Json(DataResponse { data: report }))
}

/// POST /api/v1/dora/drilldown
pub async fn drilldown(
    State(state): State<AppState>,
    Json(body): Json<DoraRequest>,
) -> AppResult<Json<DataResponse<DrillDownPage>>> {
    let profile = resolve_profile(&state, &body).await?;
    let metric = body.metric.unwrap_or(Metric::DeploymentFrequency);
    let role = body.role.unwrap_or_else(|| default_role(metric));
    let page = state
        .engine
        .drill_down(
            metric,
            role,
            &profile,
            &body.filter,
            body.ou.as_ref(),
            &body.page,
        )
        .await?;
    Ok(Json(DataResponse { data: page }))
}

/// POST /api/v1/dora/report
pub async fn report(
    State(state): State<AppState>,
    Json(body): Json<DoraRequest>,
) -> AppResult<Json<DataResponse<ReportWithDrillDown>>> {
    let profile = resolve_profile(&state, &body).await?;
    let metric = body.metric.unwrap_or(Metric::DeploymentFrequency);
    let (report, drill_down) = state
        .engine
        .report_with_drill_down(metric, &profile, &body.filter, body.ou.as_ref(), &body.page)
        .await?;
    Ok(Json(DataResponse {
        data: ReportWithDrillDown { report, drill_down },
    }))
}
