//! Repository for the `velocity_profiles` table.

use sqlx::types::Json;
use sqlx::PgPool;
use velocity_core::types::DbId;

use crate::models::velocity_profile::{CreateVelocityProfile, VelocityProfileRow};

/// Column list for `velocity_profiles` queries.
const COLUMNS: &str = "id, name, ou_ref_ids, config, created_at, updated_at";

/// Provides read and create operations for workflow profiles.
pub struct VelocityProfileRepo;

impl VelocityProfileRepo {
    pub async fn create(
        pool: &PgPool,
        input: &CreateVelocityProfile,
    ) -> Result<VelocityProfileRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO velocity_profiles (name, ou_ref_ids, config) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, VelocityProfileRow>(&query)
            .bind(&input.name)
            .bind(&input.ou_ref_ids)
            .bind(Json(&input.config))
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<VelocityProfileRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM velocity_profiles WHERE id = $1");
        sqlx::query_as::<_, VelocityProfileRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Profile mapped to an organisational unit. When several profiles list
    /// the unit, the oldest one wins.
    pub async fn find_by_ou_ref_id(
        pool: &PgPool,
        ou_ref_id: DbId,
    ) -> Result<Option<VelocityProfileRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM velocity_profiles \
             WHERE $1 = ANY(ou_ref_ids) \
             ORDER BY id \
             LIMIT 1"
        );
        sqlx::query_as::<_, VelocityProfileRow>(&query)
            .bind(ou_ref_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<VelocityProfileRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM velocity_profiles ORDER BY id");
        sqlx::query_as::<_, VelocityProfileRow>(&query)
            .fetch_all(pool)
            .await
    }
}
