//! Repository for the `scm_commits` table.

use sqlx::PgPool;
use velocity_core::drilldown::ResolvedSort;
use velocity_core::event::CommitEvent;
use velocity_core::filter::CompiledPredicate;
use velocity_core::types::DbId;

use super::QueryError;
use crate::models::commit::CommitRow;
use crate::sql;

/// Column list for `scm_commits` queries.
const COLUMNS: &str = "\
    r.id, r.integration_id, r.repo_ids, r.project, r.commit_sha, r.message, \
    r.committer, r.author, r.branch, r.tags, r.direct_merge, \
    r.created_at, r.committed_at, r.commit_pushed_at";

pub struct CommitRepo;

impl CommitRepo {
    pub async fn insert(pool: &PgPool, commit: &CommitEvent) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO scm_commits \
                (integration_id, repo_ids, project, commit_sha, message, committer, author, \
                 branch, tags, direct_merge, created_at, committed_at, commit_pushed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING id",
        )
        .bind(&commit.integration_id)
        .bind(&commit.repo_ids)
        .bind(&commit.project)
        .bind(&commit.commit_sha)
        .bind(&commit.message)
        .bind(&commit.committer)
        .bind(&commit.author)
        .bind(&commit.branch)
        .bind(&commit.tags)
        .bind(commit.direct_merge)
        .bind(commit.created_at)
        .bind(commit.committed_at)
        .bind(commit.commit_pushed_at)
        .fetch_one(pool)
        .await
    }

    pub async fn list_page(
        pool: &PgPool,
        predicate: &CompiledPredicate,
        sort: ResolvedSort,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CommitEvent>, QueryError> {
        let mut qb = sql::list_query(predicate, COLUMNS, sort, limit, offset)?;
        let rows = qb.build_query_as::<CommitRow>().fetch_all(pool).await?;
        Ok(rows.into_iter().map(CommitEvent::from).collect())
    }
}
