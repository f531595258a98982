//! Event records returned by drill-down and evaluated by the in-memory source.
//!
//! Each record exposes its filterable attributes through [`Field`] so the
//! same compiled predicate can be checked against a row in memory or
//! rendered to SQL by a database adapter.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::bucketing::{StackKey, UNKNOWN_STACK};
use crate::filter::field::{ChildKind, Field, MetadataKey};
use crate::profile::{CalculationField, EventSource};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrEvent {
    pub id: DbId,
    pub integration_id: String,
    #[serde(default)]
    pub repo_ids: Vec<String>,
    pub project: Option<String>,
    pub title: Option<String>,
    pub creator: Option<String>,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
    pub state: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub merged: bool,
    pub pr_created_at: Option<Timestamp>,
    pub pr_updated_at: Option<Timestamp>,
    pub pr_merged_at: Option<Timestamp>,
    pub pr_closed_at: Option<Timestamp>,
    #[serde(default)]
    pub lines_added: i64,
    #[serde(default)]
    pub lines_deleted: i64,
    #[serde(default)]
    pub files_ct: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitEvent {
    pub id: DbId,
    pub integration_id: String,
    #[serde(default)]
    pub repo_ids: Vec<String>,
    pub project: Option<String>,
    pub commit_sha: String,
    pub message: Option<String>,
    pub committer: Option<String>,
    pub author: Option<String>,
    pub branch: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub direct_merge: bool,
    pub created_at: Option<Timestamp>,
    pub committed_at: Option<Timestamp>,
    pub commit_pushed_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueEvent {
    pub id: DbId,
    pub integration_id: String,
    pub key: String,
    pub project: Option<String>,
    pub summary: Option<String>,
    pub issue_type: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub fix_versions: Vec<String>,
    pub issue_created_at: Option<Timestamp>,
    pub issue_updated_at: Option<Timestamp>,
    pub issue_resolved_at: Option<Timestamp>,
    /// Release date of the earliest fix version.
    pub released_in: Option<Timestamp>,
}

/// Free-form deployment metadata attached to a job run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRunMetadata {
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub environments: Vec<String>,
    #[serde(default)]
    pub infrastructures: Vec<String>,
    #[serde(default)]
    pub deployment_types: Vec<String>,
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub rollback: Option<bool>,
}

impl JobRunMetadata {
    pub fn values(&self, key: MetadataKey) -> &[String] {
        match key {
            MetadataKey::Service => &self.services,
            MetadataKey::Environment => &self.environments,
            MetadataKey::Infrastructure => &self.infrastructures,
            MetadataKey::DeploymentType => &self.deployment_types,
            MetadataKey::Repository => &self.repositories,
            MetadataKey::Branch => &self.branches,
            MetadataKey::Tag => &self.tags,
            MetadataKey::Rollback => &[],
        }
    }
}

/// A stage or step of a job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRun {
    pub name: String,
    pub result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRunParam {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRunEvent {
    pub id: DbId,
    pub cicd_job_id: String,
    pub integration_id: String,
    pub instance_name: Option<String>,
    pub job_name: String,
    pub job_normalized_full_name: Option<String>,
    pub project: Option<String>,
    pub job_run_number: i64,
    pub status: Option<String>,
    pub cicd_user_id: Option<String>,
    #[serde(default)]
    pub triage_rules: Vec<String>,
    #[serde(default)]
    pub metadata: JobRunMetadata,
    #[serde(default)]
    pub params: Vec<JobRunParam>,
    #[serde(default)]
    pub stages: Vec<ChildRun>,
    #[serde(default)]
    pub steps: Vec<ChildRun>,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub duration_secs: Option<i64>,
}

/// A record from any event source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventRecord {
    PullRequest(PrEvent),
    Commit(CommitEvent),
    Issue(IssueEvent),
    JobRun(JobRunEvent),
}

// ---------------------------------------------------------------------------
// Attribute access
// ---------------------------------------------------------------------------

fn opt(value: &Option<String>) -> Vec<&str> {
    value.as_deref().into_iter().collect()
}

fn many(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

impl EventRecord {
    pub fn id(&self) -> DbId {
        match self {
            EventRecord::PullRequest(e) => e.id,
            EventRecord::Commit(e) => e.id,
            EventRecord::Issue(e) => e.id,
            EventRecord::JobRun(e) => e.id,
        }
    }

    pub fn source(&self) -> EventSource {
        match self {
            EventRecord::PullRequest(_) => EventSource::PullRequest,
            EventRecord::Commit(_) => EventSource::Commit,
            EventRecord::Issue(_) => EventSource::Issue,
            EventRecord::JobRun(_) => EventSource::JobRun,
        }
    }

    /// String values of a field; empty when the field is unset or foreign to the source.
    pub fn values(&self, field: Field) -> Vec<&str> {
        match (self, field) {
            (EventRecord::PullRequest(e), f) => match f {
                Field::IntegrationId => vec![e.integration_id.as_str()],
                Field::RepoId => many(&e.repo_ids),
                Field::Project => opt(&e.project),
                Field::Creator => opt(&e.creator),
                Field::SourceBranch => opt(&e.source_branch),
                Field::TargetBranch => opt(&e.target_branch),
                Field::Label => many(&e.labels),
                Field::State => opt(&e.state),
                Field::Title => opt(&e.title),
                _ => Vec::new(),
            },
            (EventRecord::Commit(e), f) => match f {
                Field::IntegrationId => vec![e.integration_id.as_str()],
                Field::RepoId => many(&e.repo_ids),
                Field::Project => opt(&e.project),
                Field::Committer => opt(&e.committer),
                Field::Author => opt(&e.author),
                Field::CommitBranch => opt(&e.branch),
                Field::Tag => many(&e.tags),
                _ => Vec::new(),
            },
            (EventRecord::Issue(e), f) => match f {
                Field::IntegrationId => vec![e.integration_id.as_str()],
                Field::Project => opt(&e.project),
                Field::IssueType => opt(&e.issue_type),
                Field::Status => opt(&e.status),
                Field::Priority => opt(&e.priority),
                Field::Assignee => opt(&e.assignee),
                Field::Label => many(&e.labels),
                Field::Component => many(&e.components),
                Field::FixVersion => many(&e.fix_versions),
                _ => Vec::new(),
            },
            (EventRecord::JobRun(e), f) => match f {
                Field::IntegrationId => vec![e.integration_id.as_str()],
                Field::JobId => vec![e.cicd_job_id.as_str()],
                Field::InstanceName => opt(&e.instance_name),
                Field::JobName => vec![e.job_name.as_str()],
                Field::JobNormalizedFullName => opt(&e.job_normalized_full_name),
                Field::Project => opt(&e.project),
                Field::JobStatus => opt(&e.status),
                Field::CicdUserId => opt(&e.cicd_user_id),
                Field::TriageRule => many(&e.triage_rules),
                Field::Metadata(key) => many(e.metadata.values(key)),
                _ => Vec::new(),
            },
        }
    }

    /// Boolean attribute; `None` for fields that are not flags of this source.
    pub fn flag(&self, field: Field) -> Option<bool> {
        match (self, field) {
            (EventRecord::PullRequest(e), Field::Merged) => Some(e.merged),
            (EventRecord::Commit(e), Field::DirectMerge) => Some(e.direct_merge),
            (EventRecord::JobRun(e), Field::Metadata(MetadataKey::Rollback)) => {
                Some(e.metadata.rollback.unwrap_or(false))
            }
            _ => None,
        }
    }

    pub fn timestamp(&self, field: CalculationField) -> Option<Timestamp> {
        match (self, field) {
            (EventRecord::PullRequest(e), CalculationField::PrMergedAt) => e.pr_merged_at,
            (EventRecord::PullRequest(e), CalculationField::PrClosedAt) => e.pr_closed_at,
            (EventRecord::Commit(e), CalculationField::CommittedAt) => e.committed_at,
            (EventRecord::Commit(e), CalculationField::CommitPushedAt) => e.commit_pushed_at,
            (EventRecord::Issue(e), CalculationField::IssueResolvedAt) => e.issue_resolved_at,
            (EventRecord::Issue(e), CalculationField::IssueUpdatedAt) => e.issue_updated_at,
            (EventRecord::Issue(e), CalculationField::ReleasedIn) => e.released_in,
            (EventRecord::JobRun(e), CalculationField::StartTime) => e.start_time,
            (EventRecord::JobRun(e), CalculationField::EndTime) => e.end_time,
            _ => None,
        }
    }

    pub fn children(&self, kind: ChildKind) -> &[ChildRun] {
        match (self, kind) {
            (EventRecord::JobRun(e), ChildKind::Stage) => &e.stages,
            (EventRecord::JobRun(e), ChildKind::Step) => &e.steps,
            _ => &[],
        }
    }

    pub fn params(&self) -> &[JobRunParam] {
        match self {
            EventRecord::JobRun(e) => &e.params,
            _ => &[],
        }
    }

    /// Label of the stack this record contributes to; exactly one per record.
    ///
    /// Multi-valued attributes are sorted and comma-joined so every record
    /// lands in a single stack and stack counts sum to the bucket count.
    pub fn stack_label(&self, key: StackKey) -> String {
        let field = key.field_for(self.source());
        let mut values: Vec<&str> = match field {
            Some(f) => self.values(f).into_iter().filter(|v| !v.is_empty()).collect(),
            None => Vec::new(),
        };
        if values.is_empty() {
            return UNKNOWN_STACK.to_string();
        }
        values.sort_unstable();
        values.join(",")
    }

    /// Value used to order drill-down rows by a whitelisted column.
    pub fn sort_value(&self, column: &str) -> SortValue {
        let ts = |t: Option<Timestamp>| t.map_or(SortValue::Null, |t| SortValue::Int(t.timestamp()));
        let text = |s: &Option<String>| s.clone().map_or(SortValue::Null, SortValue::Text);
        match self {
            EventRecord::PullRequest(e) => match column {
                "pr_created_at" => ts(e.pr_created_at),
                "pr_updated_at" => ts(e.pr_updated_at),
                "pr_merged_at" => ts(e.pr_merged_at),
                "pr_closed_at" => ts(e.pr_closed_at),
                "title" => text(&e.title),
                "project" => text(&e.project),
                "creator" => text(&e.creator),
                "lines_added" => SortValue::Int(e.lines_added),
                "lines_deleted" => SortValue::Int(e.lines_deleted),
                "lines_changed" => SortValue::Int(e.lines_added.saturating_add(e.lines_deleted)),
                "files_ct" => SortValue::Int(e.files_ct),
                _ => SortValue::Null,
            },
            EventRecord::Commit(e) => match column {
                "created_at" => ts(e.created_at),
                "committed_at" => ts(e.committed_at),
                "commit_pushed_at" => ts(e.commit_pushed_at),
                _ => SortValue::Null,
            },
            EventRecord::Issue(e) => match column {
                "issue_created_at" => ts(e.issue_created_at),
                "issue_updated_at" => ts(e.issue_updated_at),
                "issue_resolved_at" => ts(e.issue_resolved_at),
                "released_in" => ts(e.released_in),
                "key" => SortValue::Text(e.key.clone()),
                "priority" => text(&e.priority),
                _ => SortValue::Null,
            },
            EventRecord::JobRun(e) => match column {
                "start_time" => ts(e.start_time),
                "end_time" => ts(e.end_time),
                "duration" => e.duration_secs.map_or(SortValue::Null, SortValue::Int),
                "job_name" => SortValue::Text(e.job_name.clone()),
                "status" => text(&e.status),
                "job_run_number" => SortValue::Int(e.job_run_number),
                _ => SortValue::Null,
            },
        }
    }
}

/// Comparable sort key; nulls order after every value in both directions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortValue {
    Null,
    Int(i64),
    Text(String),
}

impl SortValue {
    /// Compare two keys, keeping nulls last regardless of direction.
    pub fn compare(&self, other: &Self, descending: bool) -> Ordering {
        let ordered = |o: Ordering| if descending { o.reverse() } else { o };
        match (self, other) {
            (SortValue::Null, SortValue::Null) => Ordering::Equal,
            (SortValue::Null, _) => Ordering::Greater,
            (_, SortValue::Null) => Ordering::Less,
            (SortValue::Int(a), SortValue::Int(b)) => ordered(a.cmp(b)),
            (SortValue::Text(a), SortValue::Text(b)) => ordered(a.as_bytes().cmp(b.as_bytes())),
            (SortValue::Int(_), SortValue::Text(_)) => Ordering::Less,
            (SortValue::Text(_), SortValue::Int(_)) => Ordering::Greater,
        }
    }
}
