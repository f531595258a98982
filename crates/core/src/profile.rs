//! Workflow ("velocity") profile model.
//!
//! A profile is tenant configuration: for each DORA metric it declares which
//! events count (the "total" filter) and, for change failure rate, which of
//! those count as failures. Profiles are read-only inputs to the engine and
//! travel as JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::band::{validate_thresholds, BandThresholds, Direction};
use crate::criteria;
use crate::error::CoreError;
use crate::filter;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// DORA metric a request is asking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    DeploymentFrequency,
    ChangeFailureRate,
    LeadTimeForChange,
    MeanTimeToRestore,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::DeploymentFrequency => "deployment_frequency",
            Metric::ChangeFailureRate => "change_failure_rate",
            Metric::LeadTimeForChange => "lead_time_for_change",
            Metric::MeanTimeToRestore => "mean_time_to_restore",
        }
    }
}

/// Which event type is the unit of "deployment" for a filter spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentRoute {
    Pr,
    Commit,
    Issue,
    CicdJob,
}

impl DeploymentRoute {
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentRoute::Pr => "pr",
            DeploymentRoute::Commit => "commit",
            DeploymentRoute::Issue => "issue",
            DeploymentRoute::CicdJob => "cicd_job",
        }
    }

    /// Event source whose adapter executes predicates for this route.
    pub fn source(self) -> EventSource {
        match self {
            DeploymentRoute::Pr => EventSource::PullRequest,
            DeploymentRoute::Commit => EventSource::Commit,
            DeploymentRoute::Issue => EventSource::Issue,
            DeploymentRoute::CicdJob => EventSource::JobRun,
        }
    }
}

/// Physical event source backing a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    PullRequest,
    Commit,
    Issue,
    JobRun,
}

impl EventSource {
    pub const ALL: [EventSource; 4] = [
        EventSource::PullRequest,
        EventSource::Commit,
        EventSource::Issue,
        EventSource::JobRun,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventSource::PullRequest => "pull_request",
            EventSource::Commit => "commit",
            EventSource::Issue => "issue",
            EventSource::JobRun => "job_run",
        }
    }
}

/// Rule within a route deciding whether an event counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentCriteria {
    PrMerged,
    PrClosed,
    PrMergedClosed,
    CommitWithTag,
    CommitMergedToBranch,
    CommitMergedToBranchWithTag,
    IssueResolved,
    IssueUpdated,
    IssueReleased,
    JobRunStarted,
    JobRunCompleted,
}

impl DeploymentCriteria {
    pub fn as_str(self) -> &'static str {
        match self {
            DeploymentCriteria::PrMerged => "pr_merged",
            DeploymentCriteria::PrClosed => "pr_closed",
            DeploymentCriteria::PrMergedClosed => "pr_merged_closed",
            DeploymentCriteria::CommitWithTag => "commit_with_tag",
            DeploymentCriteria::CommitMergedToBranch => "commit_merged_to_branch",
            DeploymentCriteria::CommitMergedToBranchWithTag => "commit_merged_to_branch_with_tag",
            DeploymentCriteria::IssueResolved => "issue_resolved",
            DeploymentCriteria::IssueUpdated => "issue_updated",
            DeploymentCriteria::IssueReleased => "issue_released",
            DeploymentCriteria::JobRunStarted => "job_run_started",
            DeploymentCriteria::JobRunCompleted => "job_run_completed",
        }
    }
}

/// Timestamp column used for time-range filtering and bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationField {
    PrMergedAt,
    PrClosedAt,
    CommittedAt,
    CommitPushedAt,
    IssueResolvedAt,
    IssueUpdatedAt,
    ReleasedIn,
    StartTime,
    EndTime,
}

impl CalculationField {
    pub fn as_str(self) -> &'static str {
        match self {
            CalculationField::PrMergedAt => "pr_merged_at",
            CalculationField::PrClosedAt => "pr_closed_at",
            CalculationField::CommittedAt => "committed_at",
            CalculationField::CommitPushedAt => "commit_pushed_at",
            CalculationField::IssueResolvedAt => "issue_resolved_at",
            CalculationField::IssueUpdatedAt => "issue_updated_at",
            CalculationField::ReleasedIn => "released_in",
            CalculationField::StartTime => "start_time",
            CalculationField::EndTime => "end_time",
        }
    }

    /// Source that carries this timestamp.
    pub fn source(self) -> EventSource {
        match self {
            CalculationField::PrMergedAt | CalculationField::PrClosedAt => EventSource::PullRequest,
            CalculationField::CommittedAt | CalculationField::CommitPushedAt => EventSource::Commit,
            CalculationField::IssueResolvedAt
            | CalculationField::IssueUpdatedAt
            | CalculationField::ReleasedIn => EventSource::Issue,
            CalculationField::StartTime | CalculationField::EndTime => EventSource::JobRun,
        }
    }
}

/// Which of a metric's two filter specs a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecRole {
    #[default]
    Total,
    Failed,
}

// ---------------------------------------------------------------------------
// Filter values
// ---------------------------------------------------------------------------

/// A `name = value` constraint on a job run's build parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParameter {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Value side of a strict or exclude filter entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Flag(bool),
    Single(String),
    List(Vec<String>),
    Parameters(Vec<JobParameter>),
}

impl FilterValue {
    /// Non-blank string values, trimmed. Flags and parameters yield nothing.
    pub fn values(&self) -> Vec<String> {
        let raw: Vec<&String> = match self {
            FilterValue::Single(v) => vec![v],
            FilterValue::List(vs) => vs.iter().collect(),
            FilterValue::Flag(_) | FilterValue::Parameters(_) => Vec::new(),
        };
        raw.into_iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(values: Vec<&str>) -> Self {
        FilterValue::List(values.into_iter().map(str::to_string).collect())
    }
}

/// Partial-match operators for one field (`{"$begins": [...], "$contains": [...]}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialMatch {
    #[serde(rename = "$begins", default, skip_serializing_if = "Option::is_none")]
    pub begins: Option<FilterValue>,
    #[serde(rename = "$contains", default, skip_serializing_if = "Option::is_none")]
    pub contains: Option<FilterValue>,
    /// Any other operator; rejected by the compiler.
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

impl PartialMatch {
    pub fn begins_with(prefixes: Vec<&str>) -> Self {
        Self {
            begins: Some(prefixes.into()),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// One event-classification rule set bound to a single route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub calculation_field: CalculationField,
    pub deployment_route: DeploymentRoute,
    pub deployment_criteria: DeploymentCriteria,
    #[serde(default, alias = "scm_filters", alias = "issue_filters")]
    pub filters: BTreeMap<String, FilterValue>,
    #[serde(default)]
    pub exclude_filters: BTreeMap<String, FilterValue>,
    #[serde(default)]
    pub partial_match_filters: BTreeMap<String, PartialMatch>,
    /// Manually selected CI/CD jobs; only meaningful for the `cicd_job` route.
    #[serde(default)]
    pub event_job_ids: Vec<String>,
}

impl FilterSpec {
    pub fn new(
        deployment_route: DeploymentRoute,
        deployment_criteria: DeploymentCriteria,
        calculation_field: CalculationField,
    ) -> Self {
        Self {
            calculation_field,
            deployment_route,
            deployment_criteria,
            filters: BTreeMap::new(),
            exclude_filters: BTreeMap::new(),
            partial_match_filters: BTreeMap::new(),
            event_job_ids: Vec::new(),
        }
    }

    pub fn with_filter(mut self, field: &str, value: FilterValue) -> Self {
        self.filters.insert(field.to_string(), value);
        self
    }

    pub fn with_exclude(mut self, field: &str, value: FilterValue) -> Self {
        self.exclude_filters.insert(field.to_string(), value);
        self
    }

    pub fn with_partial(mut self, field: &str, value: PartialMatch) -> Self {
        self.partial_match_filters.insert(field.to_string(), value);
        self
    }
}

/// Per-metric configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfig {
    pub total: FilterSpec,
    #[serde(default)]
    pub failed: Option<FilterSpec>,
    #[serde(default)]
    pub integration_ids: Vec<String>,
    /// Rate thresholds; metric defaults apply when absent.
    #[serde(default)]
    pub thresholds: Option<BandThresholds>,
    /// Count thresholds consulted in absolute mode.
    #[serde(default)]
    pub absolute_thresholds: Option<BandThresholds>,
    #[serde(default)]
    pub is_absolute: bool,
}

impl MetricConfig {
    pub fn new(total: FilterSpec) -> Self {
        Self {
            total,
            failed: None,
            integration_ids: Vec::new(),
            thresholds: None,
            absolute_thresholds: None,
            is_absolute: false,
        }
    }

    pub fn spec(&self, role: SpecRole) -> Option<&FilterSpec> {
        match role {
            SpecRole::Total => Some(&self.total),
            SpecRole::Failed => self.failed.as_ref(),
        }
    }
}

/// Tenant workflow profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityProfile {
    pub id: DbId,
    pub name: String,
    #[serde(default)]
    pub ou_ref_ids: Vec<DbId>,
    pub deployment_frequency: MetricConfig,
    pub change_failure_rate: MetricConfig,
    #[serde(default)]
    pub lead_time_for_change: Option<MetricConfig>,
    #[serde(default)]
    pub mean_time_to_restore: Option<MetricConfig>,
}

impl VelocityProfile {
    /// Configuration for a metric, or a validation error when the profile
    /// does not define one.
    pub fn metric_config(&self, metric: Metric) -> Result<&MetricConfig, CoreError> {
        let config = match metric {
            Metric::DeploymentFrequency => Some(&self.deployment_frequency),
            Metric::ChangeFailureRate => Some(&self.change_failure_rate),
            Metric::LeadTimeForChange => self.lead_time_for_change.as_ref(),
            Metric::MeanTimeToRestore => self.mean_time_to_restore.as_ref(),
        };
        config.ok_or_else(|| {
            CoreError::Validation(format!(
                "profile {} has no {} configuration",
                self.id,
                metric.as_str()
            ))
        })
    }

    /// Check a profile before it is stored: every deployment frequency and
    /// change failure rate spec must resolve to a supported route/criteria
    /// rule and use only its route's filter keys, and thresholds must be
    /// ordered.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (metric, config) in [
            (Metric::DeploymentFrequency, &self.deployment_frequency),
            (Metric::ChangeFailureRate, &self.change_failure_rate),
        ] {
            for spec in std::iter::once(&config.total).chain(config.failed.as_ref()) {
                criteria::resolve(metric, spec)?;
                filter::check_spec(spec)?;
            }
        }

        let df = &self.deployment_frequency;
        if let Some(t) = &df.thresholds {
            validate_thresholds(t, Direction::HigherIsBetter, "deployment_frequency.thresholds")?;
        }
        if let Some(t) = &df.absolute_thresholds {
            validate_thresholds(
                t,
                Direction::HigherIsBetter,
                "deployment_frequency.absolute_thresholds",
            )?;
        }

        let cfr = &self.change_failure_rate;
        if let Some(t) = &cfr.thresholds {
            validate_thresholds(t, Direction::LowerIsBetter, "change_failure_rate.thresholds")?;
        }
        if let Some(t) = &cfr.absolute_thresholds {
            validate_thresholds(
                t,
                Direction::LowerIsBetter,
                "change_failure_rate.absolute_thresholds",
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- serde ---

    #[test]
    fn deserializes_profile_json() {
        let json = serde_json::json!({
            "id": 7,
            "name": "default",
            "ou_ref_ids": [42],
            "deployment_frequency": {
                "integration_ids": ["1"],
                "total": {
                    "calculation_field": "pr_merged_at",
                    "deployment_route": "pr",
                    "deployment_criteria": "pr_merged",
                    "scm_filters": { "target_branches": ["main"] },
                    "partial_match_filters": { "labels": { "$begins": ["release"] } }
                }
            },
            "change_failure_rate": {
                "is_absolute": true,
                "total": {
                    "calculation_field": "end_time",
                    "deployment_route": "cicd_job",
                    "deployment_criteria": "job_run_completed"
                },
                "failed": {
                    "calculation_field": "end_time",
                    "deployment_route": "cicd_job",
                    "deployment_criteria": "job_run_completed",
                    "filters": { "job_statuses": "FAILURE", "rollback": true }
                }
            }
        });

        let profile: VelocityProfile = serde_json::from_value(json).unwrap();
        assert_eq!(profile.ou_ref_ids, vec![42]);
        assert_eq!(
            profile.deployment_frequency.total.filters["target_branches"],
            FilterValue::List(vec!["main".into()])
        );
        let failed = profile.change_failure_rate.failed.as_ref().unwrap();
        assert_eq!(failed.filters["rollback"], FilterValue::Flag(true));
        assert_eq!(failed.filters["job_statuses"].values(), vec!["FAILURE"]);
        assert!(profile.change_failure_rate.is_absolute);
    }

    #[test]
    fn partial_match_keeps_unknown_operators() {
        let partial: PartialMatch =
            serde_json::from_value(serde_json::json!({ "$ends": ["x"] })).unwrap();
        assert!(partial.begins.is_none());
        assert!(partial.other.contains_key("$ends"));
    }

    // -- FilterValue::values ---

    #[test]
    fn values_drop_blank_entries() {
        let value = FilterValue::List(vec!["  ".into(), "main".into(), "".into()]);
        assert_eq!(value.values(), vec!["main"]);
        assert!(FilterValue::Flag(true).values().is_empty());
    }

    // -- validate ---

    fn pr_spec() -> FilterSpec {
        FilterSpec::new(
            DeploymentRoute::Pr,
            DeploymentCriteria::PrMerged,
            CalculationField::PrMergedAt,
        )
    }

    fn profile_with(df: FilterSpec, failed: Option<FilterSpec>) -> VelocityProfile {
        let mut cfr = MetricConfig::new(pr_spec());
        cfr.failed = failed;
        VelocityProfile {
            id: 1,
            name: "p".into(),
            ou_ref_ids: vec![],
            deployment_frequency: MetricConfig::new(df),
            change_failure_rate: cfr,
            lead_time_for_change: None,
            mean_time_to_restore: None,
        }
    }

    #[test]
    fn valid_profile_passes() {
        let failed = pr_spec().with_filter("labels", vec!["hotfix"].into());
        assert!(profile_with(pr_spec(), Some(failed)).validate().is_ok());
    }

    #[test]
    fn unsupported_route_criteria_pair_is_rejected() {
        let spec = FilterSpec::new(
            DeploymentRoute::Pr,
            DeploymentCriteria::JobRunCompleted,
            CalculationField::PrMergedAt,
        );
        assert!(matches!(
            profile_with(spec, None).validate(),
            Err(CoreError::UnsupportedCriteria(_))
        ));
    }

    #[test]
    fn calculation_field_from_another_route_is_rejected() {
        let spec = FilterSpec::new(
            DeploymentRoute::Pr,
            DeploymentCriteria::PrMerged,
            CalculationField::EndTime,
        );
        assert!(matches!(
            profile_with(spec, None).validate(),
            Err(CoreError::UnsupportedCriteria(_))
        ));
    }

    #[test]
    fn unknown_filter_key_in_failed_spec_is_rejected() {
        let failed = pr_spec().with_filter("colours", vec!["red"].into());
        assert!(matches!(
            profile_with(pr_spec(), Some(failed)).validate(),
            Err(CoreError::InvalidFilter(_))
        ));
    }

    // -- metric_config ---

    #[test]
    fn missing_lead_time_config_is_validation_error() {
        let spec = FilterSpec::new(
            DeploymentRoute::Pr,
            DeploymentCriteria::PrMerged,
            CalculationField::PrMergedAt,
        );
        let profile = VelocityProfile {
            id: 1,
            name: "p".into(),
            ou_ref_ids: vec![],
            deployment_frequency: MetricConfig::new(spec.clone()),
            change_failure_rate: MetricConfig::new(spec),
            lead_time_for_change: None,
            mean_time_to_restore: None,
        };
        assert!(profile.metric_config(Metric::DeploymentFrequency).is_ok());
        assert!(matches!(
            profile.metric_config(Metric::LeadTimeForChange),
            Err(CoreError::Validation(_))
        ));
    }
}
