//! Issue rows (`issues`).

use sqlx::FromRow;
use velocity_core::event::IssueEvent;
use velocity_core::types::{DbId, Timestamp};

/// A row from the `issues` table.
#[derive(Debug, Clone, FromRow)]
pub struct IssueRow {
    pub id: DbId,
    pub integration_id: String,
    pub key: String,
    pub project: Option<String>,
    pub summary: Option<String>,
    pub issue_type: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub components: Vec<String>,
    pub fix_versions: Vec<String>,
    pub issue_created_at: Option<Timestamp>,
    pub issue_updated_at: Option<Timestamp>,
    pub issue_resolved_at: Option<Timestamp>,
    pub released_in: Option<Timestamp>,
}

impl From<IssueRow> for IssueEvent {
    fn from(row: IssueRow) -> Self {
        IssueEvent {
            id: row.id,
            integration_id: row.integration_id,
            key: row.key,
            project: row.project,
            summary: row.summary,
            issue_type: row.issue_type,
            status: row.status,
            priority: row.priority,
            assignee: row.assignee,
            labels: row.labels,
            components: row.components,
            fix_versions: row.fix_versions,
            issue_created_at: row.issue_created_at,
            issue_updated_at: row.issue_updated_at,
            issue_resolved_at: row.issue_resolved_at,
            released_in: row.released_in,
        }
    }
}
