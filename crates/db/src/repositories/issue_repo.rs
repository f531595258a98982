//! Repository for the `issues` table.

use sqlx::PgPool;
use velocity_core::drilldown::ResolvedSort;
use velocity_core::event::IssueEvent;
use velocity_core::filter::CompiledPredicate;
use velocity_core::types::DbId;

use super::QueryError;
use crate::models::issue::IssueRow;
use crate::sql;

/// Column list for `issues` queries.
const COLUMNS: &str = "\
    r.id, r.integration_id, r.key, r.project, r.summary, r.issue_type, r.status, \
    r.priority, r.assignee, r.labels, r.components, r.fix_versions, \
    r.issue_created_at, r.issue_updated_at, r.issue_resolved_at, r.released_in";

pub struct IssueRepo;

impl IssueRepo {
    pub async fn insert(pool: &PgPool, issue: &IssueEvent) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO issues \
                (integration_id, key, project, summary, issue_type, status, priority, \
                 assignee, labels, components, fix_versions, issue_created_at, \
                 issue_updated_at, issue_resolved_at, released_in) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING id",
        )
        .bind(&issue.integration_id)
        .bind(&issue.key)
        .bind(&issue.project)
        .bind(&issue.summary)
        .bind(&issue.issue_type)
        .bind(&issue.status)
        .bind(&issue.priority)
        .bind(&issue.assignee)
        .bind(&issue.labels)
        .bind(&issue.components)
        .bind(&issue.fix_versions)
        .bind(issue.issue_created_at)
        .bind(issue.issue_updated_at)
        .bind(issue.issue_resolved_at)
        .bind(issue.released_in)
        .fetch_one(pool)
        .await
    }

    pub async fn list_page(
        pool: &PgPool,
        predicate: &CompiledPredicate,
        sort: ResolvedSort,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<IssueEvent>, QueryError> {
        let mut qb = sql::list_query(predicate, COLUMNS, sort, limit, offset)?;
        let rows = qb.build_query_as::<IssueRow>().fetch_all(pool).await?;
        Ok(rows.into_iter().map(IssueEvent::from).collect())
    }
}
