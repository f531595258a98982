//! Commit rows (`scm_commits`).

use sqlx::FromRow;
use velocity_core::event::CommitEvent;
use velocity_core::types::{DbId, Timestamp};

/// A row from the `scm_commits` table.
#[derive(Debug, Clone, FromRow)]
pub struct CommitRow {
    pub id: DbId,
    pub integration_id: String,
    pub repo_ids: Vec<String>,
    pub project: Option<String>,
    pub commit_sha: String,
    pub message: Option<String>,
    pub committer: Option<String>,
    pub author: Option<String>,
    pub branch: Option<String>,
    pub tags: Vec<String>,
    pub direct_merge: bool,
    pub created_at: Option<Timestamp>,
    pub committed_at: Option<Timestamp>,
    pub commit_pushed_at: Option<Timestamp>,
}

impl From<CommitRow> for CommitEvent {
    fn from(row: CommitRow) -> Self {
        CommitEvent {
            id: row.id,
            integration_id: row.integration_id,
            repo_ids: row.repo_ids,
            project: row.project,
            commit_sha: row.commit_sha,
            message: row.message,
            committer: row.committer,
            author: row.author,
            branch: row.branch,
            tags: row.tags,
            direct_merge: row.direct_merge,
            created_at: row.created_at,
            committed_at: row.committed_at,
            commit_pushed_at: row.commit_pushed_at,
        }
    }
}
