//! Repository for `cicd_job_runs` and its stage, step and parameter tables.

use sqlx::types::Json;
use sqlx::PgPool;
use velocity_core::drilldown::ResolvedSort;
use velocity_core::event::{ChildRun, JobRunEvent};
use velocity_core::filter::CompiledPredicate;
use velocity_core::types::DbId;

use super::QueryError;
use crate::models::job_run::{ChildRunRow, JobRunParamRow, JobRunRow};
use crate::sql;

/// Column list for `cicd_job_runs` queries.
const COLUMNS: &str = "\
    r.id, r.cicd_job_id, r.integration_id, r.instance_name, r.job_name, \
    r.job_normalized_full_name, r.project, r.job_run_number, r.status, r.cicd_user_id, \
    r.triage_rules, r.metadata, r.start_time, r.end_time, r.duration_secs";

pub struct JobRunRepo;

impl JobRunRepo {
    /// Insert a job run with its stages, steps and parameters in one transaction.
    pub async fn insert(pool: &PgPool, run: &JobRunEvent) -> Result<DbId, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let id: DbId = sqlx::query_scalar(
            "INSERT INTO cicd_job_runs \
                (cicd_job_id, integration_id, instance_name, job_name, \
                 job_normalized_full_name, project, job_run_number, status, cicd_user_id, \
                 triage_rules, metadata, start_time, end_time, duration_secs) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING id",
        )
        .bind(&run.cicd_job_id)
        .bind(&run.integration_id)
        .bind(&run.instance_name)
        .bind(&run.job_name)
        .bind(&run.job_normalized_full_name)
        .bind(&run.project)
        .bind(run.job_run_number)
        .bind(&run.status)
        .bind(&run.cicd_user_id)
        .bind(&run.triage_rules)
        .bind(Json(&run.metadata))
        .bind(run.start_time)
        .bind(run.end_time)
        .bind(run.duration_secs)
        .fetch_one(&mut *tx)
        .await?;

        for (table, children) in [
            ("cicd_job_run_stages", &run.stages),
            ("cicd_job_run_steps", &run.steps),
        ] {
            for ChildRun { name, result } in children {
                let query =
                    format!("INSERT INTO {table} (job_run_id, name, result) VALUES ($1, $2, $3)");
                sqlx::query(&query)
                    .bind(id)
                    .bind(name)
                    .bind(result)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        for param in &run.params {
            sqlx::query(
                "INSERT INTO cicd_job_run_params (job_run_id, name, value) VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(&param.name)
            .bind(&param.value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    /// One sorted page of matching runs with their children attached.
    pub async fn list_page(
        pool: &PgPool,
        predicate: &CompiledPredicate,
        sort: ResolvedSort,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<JobRunEvent>, QueryError> {
        let mut qb = sql::list_query(predicate, COLUMNS, sort, limit, offset)?;
        let rows = qb.build_query_as::<JobRunRow>().fetch_all(pool).await?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<DbId> = rows.iter().map(|r| r.id).collect();
        let stages = Self::children_for(pool, "cicd_job_run_stages", &ids).await?;
        let steps = Self::children_for(pool, "cicd_job_run_steps", &ids).await?;
        let params = Self::params_for(pool, &ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| row.into_event(&stages, &steps, &params))
            .collect())
    }

    async fn children_for(
        pool: &PgPool,
        table: &str,
        run_ids: &[DbId],
    ) -> Result<Vec<ChildRunRow>, sqlx::Error> {
        let query = format!(
            "SELECT job_run_id, name, result FROM {table} \
             WHERE job_run_id = ANY($1) ORDER BY job_run_id, id"
        );
        sqlx::query_as::<_, ChildRunRow>(&query)
            .bind(run_ids)
            .fetch_all(pool)
            .await
    }

    async fn params_for(pool: &PgPool, run_ids: &[DbId]) -> Result<Vec<JobRunParamRow>, sqlx::Error> {
        sqlx::query_as::<_, JobRunParamRow>(
            "SELECT job_run_id, name, value FROM cicd_job_run_params \
             WHERE job_run_id = ANY($1) ORDER BY job_run_id, id",
        )
        .bind(run_ids)
        .fetch_all(pool)
        .await
    }
}
