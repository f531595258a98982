//! Velocity profile rows and DTOs (`velocity_profiles`).

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use velocity_core::profile::{MetricConfig, VelocityProfile};
use velocity_core::types::{DbId, Timestamp};

/// Per-metric configuration stored in the `config` JSONB column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub deployment_frequency: MetricConfig,
    pub change_failure_rate: MetricConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_time_for_change: Option<MetricConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_time_to_restore: Option<MetricConfig>,
}

/// A row from the `velocity_profiles` table.
#[derive(Debug, Clone, FromRow)]
pub struct VelocityProfileRow {
    pub id: DbId,
    pub name: String,
    pub ou_ref_ids: Vec<DbId>,
    pub config: Json<ProfileConfig>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<VelocityProfileRow> for VelocityProfile {
    fn from(row: VelocityProfileRow) -> Self {
        let config = row.config.0;
        VelocityProfile {
            id: row.id,
            name: row.name,
            ou_ref_ids: row.ou_ref_ids,
            deployment_frequency: config.deployment_frequency,
            change_failure_rate: config.change_failure_rate,
            lead_time_for_change: config.lead_time_for_change,
            mean_time_to_restore: config.mean_time_to_restore,
        }
    }
}

/// DTO for creating a profile.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateVelocityProfile {
    pub name: String,
    #[serde(default)]
    pub ou_ref_ids: Vec<DbId>,
    pub config: ProfileConfig,
}
