//! Filter vocabulary per event source.
//!
//! Filter maps in profiles and requests are keyed by the names below. A name
//! that is not listed for the active source is an invalid filter.

use serde::Serialize;

use crate::profile::EventSource;

/// Keys inside a job run's deployment metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataKey {
    Service,
    Environment,
    Infrastructure,
    DeploymentType,
    Repository,
    Branch,
    Tag,
    Rollback,
}

impl MetadataKey {
    /// JSON key under which the value is stored.
    pub fn json_key(self) -> &'static str {
        match self {
            MetadataKey::Service => "services",
            MetadataKey::Environment => "environments",
            MetadataKey::Infrastructure => "infrastructures",
            MetadataKey::DeploymentType => "deployment_types",
            MetadataKey::Repository => "repositories",
            MetadataKey::Branch => "branches",
            MetadataKey::Tag => "tags",
            MetadataKey::Rollback => "rollback",
        }
    }
}

/// A filterable attribute of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    IntegrationId,
    Project,
    RepoId,
    // Pull requests
    Creator,
    SourceBranch,
    TargetBranch,
    Label,
    State,
    Title,
    Merged,
    // Commits
    Committer,
    Author,
    CommitBranch,
    Tag,
    DirectMerge,
    // Issues
    IssueType,
    Status,
    Priority,
    Assignee,
    Component,
    FixVersion,
    // Job runs
    JobId,
    InstanceName,
    JobName,
    JobNormalizedFullName,
    JobStatus,
    CicdUserId,
    TriageRule,
    Metadata(MetadataKey),
}

impl Field {
    /// Whether the attribute holds a list of values rather than one.
    pub fn is_multi_valued(self) -> bool {
        match self {
            Field::RepoId
            | Field::Label
            | Field::Tag
            | Field::Component
            | Field::FixVersion
            | Field::TriageRule => true,
            Field::Metadata(key) => key != MetadataKey::Rollback,
            _ => false,
        }
    }

    /// Whether the attribute is boolean.
    pub fn is_flag(self) -> bool {
        matches!(
            self,
            Field::Merged | Field::DirectMerge | Field::Metadata(MetadataKey::Rollback)
        )
    }

    /// Branch attribute a request-level `branches` filter targets.
    pub fn branch_for(source: EventSource) -> Option<Field> {
        match source {
            EventSource::PullRequest => Some(Field::TargetBranch),
            EventSource::Commit => Some(Field::CommitBranch),
            EventSource::JobRun => Some(Field::Metadata(MetadataKey::Branch)),
            EventSource::Issue => None,
        }
    }

    /// User attribute that OU membership restricts.
    pub fn user_for(source: EventSource) -> Field {
        match source {
            EventSource::PullRequest => Field::Creator,
            EventSource::Commit => Field::Committer,
            EventSource::Issue => Field::Assignee,
            EventSource::JobRun => Field::CicdUserId,
        }
    }
}

/// Child rows of a job run that stage/step filters inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildKind {
    Stage,
    Step,
}

impl ChildKind {
    pub fn names_key(self) -> &'static str {
        match self {
            ChildKind::Stage => "stage_names",
            ChildKind::Step => "step_names",
        }
    }

    pub fn statuses_key(self) -> &'static str {
        match self {
            ChildKind::Stage => "stage_statuses",
            ChildKind::Step => "step_statuses",
        }
    }
}

/// Filter key for job-run build parameters.
pub const PARAMETERS_KEY: &str = "parameters";

/// Filter key for integration ids; recognised on every source.
pub const INTEGRATION_IDS_KEY: &str = "integration_ids";

const PR_FIELDS: &[(&str, Field)] = &[
    ("integration_ids", Field::IntegrationId),
    ("repo_ids", Field::RepoId),
    ("projects", Field::Project),
    ("creators", Field::Creator),
    ("source_branches", Field::SourceBranch),
    ("target_branches", Field::TargetBranch),
    ("labels", Field::Label),
    ("states", Field::State),
    ("titles", Field::Title),
];

const COMMIT_FIELDS: &[(&str, Field)] = &[
    ("integration_ids", Field::IntegrationId),
    ("repo_ids", Field::RepoId),
    ("projects", Field::Project),
    ("committers", Field::Committer),
    ("authors", Field::Author),
    ("commit_branches", Field::CommitBranch),
    ("tags", Field::Tag),
];

const ISSUE_FIELDS: &[(&str, Field)] = &[
    ("integration_ids", Field::IntegrationId),
    ("projects", Field::Project),
    ("issue_types", Field::IssueType),
    ("statuses", Field::Status),
    ("priorities", Field::Priority),
    ("assignees", Field::Assignee),
    ("labels", Field::Label),
    ("components", Field::Component),
    ("fix_versions", Field::FixVersion),
];

const JOB_RUN_FIELDS: &[(&str, Field)] = &[
    ("integration_ids", Field::IntegrationId),
    ("cicd_job_ids", Field::JobId),
    ("instance_names", Field::InstanceName),
    ("job_names", Field::JobName),
    ("job_normalized_full_names", Field::JobNormalizedFullName),
    ("projects", Field::Project),
    ("job_statuses", Field::JobStatus),
    ("cicd_user_ids", Field::CicdUserId),
    ("triage_rules", Field::TriageRule),
    ("services", Field::Metadata(MetadataKey::Service)),
    ("environments", Field::Metadata(MetadataKey::Environment)),
    ("infrastructures", Field::Metadata(MetadataKey::Infrastructure)),
    ("deployment_types", Field::Metadata(MetadataKey::DeploymentType)),
    ("repositories", Field::Metadata(MetadataKey::Repository)),
    ("branches", Field::Metadata(MetadataKey::Branch)),
    ("tags", Field::Metadata(MetadataKey::Tag)),
    ("rollback", Field::Metadata(MetadataKey::Rollback)),
];

/// Field names recognised for a source, in declaration order.
pub fn vocabulary(source: EventSource) -> &'static [(&'static str, Field)] {
    match source {
        EventSource::PullRequest => PR_FIELDS,
        EventSource::Commit => COMMIT_FIELDS,
        EventSource::Issue => ISSUE_FIELDS,
        EventSource::JobRun => JOB_RUN_FIELDS,
    }
}

/// Resolve a filter key for a source.
pub fn lookup(source: EventSource, name: &str) -> Option<Field> {
    vocabulary(source)
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, field)| *field)
}

/// Whether a key names a stage/step or parameter concept of the source.
pub fn is_structural_key(source: EventSource, name: &str) -> bool {
    source == EventSource::JobRun
        && [
            ChildKind::Stage.names_key(),
            ChildKind::Stage.statuses_key(),
            ChildKind::Step.names_key(),
            ChildKind::Step.statuses_key(),
            PARAMETERS_KEY,
        ]
        .contains(&name)
}
