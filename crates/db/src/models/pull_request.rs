//! Pull request rows (`scm_pull_requests`).

use sqlx::FromRow;
use velocity_core::event::PrEvent;
use velocity_core::types::{DbId, Timestamp};

/// A row from the `scm_pull_requests` table.
#[derive(Debug, Clone, FromRow)]
pub struct PullRequestRow {
    pub id: DbId,
    pub integration_id: String,
    pub repo_ids: Vec<String>,
    pub project: Option<String>,
    pub title: Option<String>,
    pub creator: Option<String>,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
    pub state: Option<String>,
    pub labels: Vec<String>,
    pub merged: bool,
    pub pr_created_at: Option<Timestamp>,
    pub pr_updated_at: Option<Timestamp>,
    pub pr_merged_at: Option<Timestamp>,
    pub pr_closed_at: Option<Timestamp>,
    pub lines_added: i64,
    pub lines_deleted: i64,
    pub files_ct: i64,
}

impl From<PullRequestRow> for PrEvent {
    fn from(row: PullRequestRow) -> Self {
        PrEvent {
            id: row.id,
            integration_id: row.integration_id,
            repo_ids: row.repo_ids,
            project: row.project,
            title: row.title,
            creator: row.creator,
            source_branch: row.source_branch,
            target_branch: row.target_branch,
            state: row.state,
            labels: row.labels,
            merged: row.merged,
            pr_created_at: row.pr_created_at,
            pr_updated_at: row.pr_updated_at,
            pr_merged_at: row.pr_merged_at,
            pr_closed_at: row.pr_closed_at,
            lines_added: row.lines_added,
            lines_deleted: row.lines_deleted,
            files_ct: row.files_ct,
        }
    }
}
