//! Repository for the `scm_pull_requests` table.

use sqlx::PgPool;
use velocity_core::drilldown::ResolvedSort;
use velocity_core::event::PrEvent;
use velocity_core::filter::CompiledPredicate;
use velocity_core::types::DbId;

use super::QueryError;
use crate::models::pull_request::PullRequestRow;
use crate::sql;

/// Column list for `scm_pull_requests` queries.
const COLUMNS: &str = "\
    r.id, r.integration_id, r.repo_ids, r.project, r.title, r.creator, \
    r.source_branch, r.target_branch, r.state, r.labels, r.merged, \
    r.pr_created_at, r.pr_updated_at, r.pr_merged_at, r.pr_closed_at, \
    r.lines_added, r.lines_deleted, r.files_ct";

pub struct PullRequestRepo;

impl PullRequestRepo {
    /// Insert a pull request, returning its new id. The event's `id` is ignored.
    pub async fn insert(pool: &PgPool, pr: &PrEvent) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO scm_pull_requests \
                (integration_id, repo_ids, project, title, creator, source_branch, \
                 target_branch, state, labels, merged, pr_created_at, pr_updated_at, \
                 pr_merged_at, pr_closed_at, lines_added, lines_deleted, files_ct) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING id",
        )
        .bind(&pr.integration_id)
        .bind(&pr.repo_ids)
        .bind(&pr.project)
        .bind(&pr.title)
        .bind(&pr.creator)
        .bind(&pr.source_branch)
        .bind(&pr.target_branch)
        .bind(&pr.state)
        .bind(&pr.labels)
        .bind(pr.merged)
        .bind(pr.pr_created_at)
        .bind(pr.pr_updated_at)
        .bind(pr.pr_merged_at)
        .bind(pr.pr_closed_at)
        .bind(pr.lines_added)
        .bind(pr.lines_deleted)
        .bind(pr.files_ct)
        .fetch_one(pool)
        .await
    }

    /// One sorted page of matching pull requests.
    pub async fn list_page(
        pool: &PgPool,
        predicate: &CompiledPredicate,
        sort: ResolvedSort,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PrEvent>, QueryError> {
        let mut qb = sql::list_query(predicate, COLUMNS, sort, limit, offset)?;
        let rows = qb.build_query_as::<PullRequestRow>().fetch_all(pool).await?;
        Ok(rows.into_iter().map(PrEvent::from).collect())
    }
}
