//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use velocity_core::engine::DoraEngine;
use velocity_core::event::{
    ChildRun, CommitEvent, EventRecord, IssueEvent, JobRunEvent, JobRunMetadata, PrEvent,
};
use velocity_core::memory::InMemorySource;
use velocity_core::profile::{
    CalculationField, DeploymentCriteria, DeploymentRoute, EventSource, FilterSpec, MetricConfig,
    VelocityProfile,
};
use velocity_core::request::RequestFilter;
use velocity_core::source::SourceRegistry;
use velocity_core::types::{TimeRange, Timestamp, SECONDS_PER_DAY};

/// Ten-day window: 2020-06-20T00:35:23Z .. 2020-06-30T00:35:23Z.
pub const BEGIN: i64 = 1592613323;
pub const END: i64 = 1593477323;

pub fn range() -> TimeRange {
    TimeRange::new(BEGIN, END).unwrap()
}

pub fn request() -> RequestFilter {
    RequestFilter::new(range())
}

pub fn ts(secs: i64) -> Timestamp {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// A moment `n` days into the window.
pub fn day(n: i64) -> Timestamp {
    ts(BEGIN + n * SECONDS_PER_DAY + 3600)
}

/// A moment well before the window.
pub fn before() -> Timestamp {
    ts(BEGIN - 30 * SECONDS_PER_DAY)
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

pub fn pr(id: i64) -> PrEvent {
    PrEvent {
        id,
        integration_id: "1".into(),
        repo_ids: vec!["api".into()],
        project: Some("platform".into()),
        title: Some(format!("Change {id}")),
        creator: Some("alice".into()),
        source_branch: Some(format!("feature/{id}")),
        target_branch: Some("main".into()),
        state: Some("merged".into()),
        labels: Vec::new(),
        merged: true,
        pr_created_at: Some(before()),
        pr_updated_at: Some(day(1)),
        pr_merged_at: Some(day(1)),
        pr_closed_at: Some(day(1)),
        lines_added: 10,
        lines_deleted: 2,
        files_ct: 1,
    }
}

pub fn commit(id: i64) -> CommitEvent {
    CommitEvent {
        id,
        integration_id: "1".into(),
        repo_ids: vec!["api".into()],
        project: Some("platform".into()),
        commit_sha: format!("{id:040x}"),
        message: Some("fix".into()),
        committer: Some("alice".into()),
        author: Some("alice".into()),
        branch: Some("main".into()),
        tags: Vec::new(),
        direct_merge: false,
        created_at: Some(day(1)),
        committed_at: Some(day(1)),
        commit_pushed_at: Some(day(1)),
    }
}

pub fn issue(id: i64) -> IssueEvent {
    IssueEvent {
        id,
        integration_id: "2".into(),
        key: format!("OPS-{id}"),
        project: Some("OPS".into()),
        summary: Some("deploy".into()),
        issue_type: Some("TASK".into()),
        status: Some("DONE".into()),
        priority: Some("HIGH".into()),
        assignee: Some("bob".into()),
        labels: Vec::new(),
        components: Vec::new(),
        fix_versions: Vec::new(),
        issue_created_at: Some(before()),
        issue_updated_at: Some(day(2)),
        issue_resolved_at: Some(day(2)),
        released_in: None,
    }
}

pub fn job_run(id: i64, job_name: &str, status: &str) -> JobRunEvent {
    JobRunEvent {
        id,
        cicd_job_id: format!("job-{job_name}"),
        integration_id: "3".into(),
        instance_name: Some("jenkins".into()),
        job_name: job_name.into(),
        job_normalized_full_name: Some(format!("folder/{job_name}")),
        project: Some("platform".into()),
        job_run_number: id,
        status: Some(status.into()),
        cicd_user_id: Some("carol".into()),
        triage_rules: Vec::new(),
        metadata: JobRunMetadata::default(),
        params: Vec::new(),
        stages: Vec::new(),
        steps: Vec::new(),
        start_time: Some(day(3)),
        end_time: Some(day(3)),
        duration_secs: Some(60),
    }
}

pub fn stage(name: &str, result: &str) -> ChildRun {
    ChildRun {
        name: name.into(),
        result: Some(result.into()),
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

pub fn spec(
    route: DeploymentRoute,
    criteria: DeploymentCriteria,
    field: CalculationField,
) -> FilterSpec {
    FilterSpec::new(route, criteria, field)
}

pub fn job_spec() -> FilterSpec {
    spec(
        DeploymentRoute::CicdJob,
        DeploymentCriteria::JobRunCompleted,
        CalculationField::EndTime,
    )
}

/// Profile using `df` for deployment frequency and `cfr_total`/`cfr_failed`
/// for change failure rate.
pub fn profile(df: FilterSpec, cfr_total: FilterSpec, cfr_failed: Option<FilterSpec>) -> VelocityProfile {
    let mut cfr = MetricConfig::new(cfr_total);
    cfr.failed = cfr_failed;
    VelocityProfile {
        id: 1,
        name: "default".into(),
        ou_ref_ids: vec![10],
        deployment_frequency: MetricConfig::new(df),
        change_failure_rate: cfr,
        lead_time_for_change: None,
        mean_time_to_restore: None,
    }
}

pub fn df_profile(df: FilterSpec) -> VelocityProfile {
    profile(df, job_spec(), None)
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// In-memory sources for every event kind plus an engine over them.
pub struct Fixture {
    pub prs: InMemorySource,
    pub commits: InMemorySource,
    pub issues: InMemorySource,
    pub job_runs: InMemorySource,
    pub engine: DoraEngine,
}

impl Fixture {
    pub fn new() -> Self {
        let prs = InMemorySource::new(EventSource::PullRequest);
        let commits = InMemorySource::new(EventSource::Commit);
        let issues = InMemorySource::new(EventSource::Issue);
        let job_runs = InMemorySource::new(EventSource::JobRun);
        let registry = SourceRegistry::new()
            .with(Arc::new(prs.clone()))
            .with(Arc::new(commits.clone()))
            .with(Arc::new(issues.clone()))
            .with(Arc::new(job_runs.clone()));
        Self {
            prs,
            commits,
            issues,
            job_runs,
            engine: DoraEngine::new(registry),
        }
    }

    pub async fn add_prs(&self, prs: impl IntoIterator<Item = PrEvent>) {
        self.prs
            .insert(prs.into_iter().map(EventRecord::PullRequest))
            .await
            .unwrap();
    }

    pub async fn add_commits(&self, commits: impl IntoIterator<Item = CommitEvent>) {
        self.commits
            .insert(commits.into_iter().map(EventRecord::Commit))
            .await
            .unwrap();
    }

    pub async fn add_issues(&self, issues: impl IntoIterator<Item = IssueEvent>) {
        self.issues
            .insert(issues.into_iter().map(EventRecord::Issue))
            .await
            .unwrap();
    }

    pub async fn add_job_runs(&self, runs: impl IntoIterator<Item = JobRunEvent>) {
        self.job_runs
            .insert(runs.into_iter().map(EventRecord::JobRun))
            .await
            .unwrap();
    }
}
