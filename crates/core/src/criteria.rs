//! Route/criteria resolution.
//!
//! A fixed table maps `(metric, route, criteria)` to the rule deciding
//! whether an event counts as a deployment (or a failure). Each rule lists the
//! calculation fields it can be bucketed by and the extra conditions it adds
//! to the compiled filter.

use crate::error::CoreError;
use crate::event::EventRecord;
use crate::filter::field::Field;
use crate::filter::FilterCondition;
use crate::profile::{
    CalculationField, DeploymentCriteria, DeploymentRoute, EventSource, FilterSpec, Metric,
};

/// A row-level requirement of a criteria rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// The PR was merged.
    Merged,
    /// The commit landed on its branch directly.
    DirectMerge,
    /// The commit carries at least one tag.
    Tagged,
    /// The timestamp is set.
    Present(CalculationField),
}

impl Requirement {
    pub fn to_condition(self) -> FilterCondition {
        match self {
            Requirement::Merged => FilterCondition::Flag {
                field: Field::Merged,
                value: true,
            },
            Requirement::DirectMerge => FilterCondition::Flag {
                field: Field::DirectMerge,
                value: true,
            },
            Requirement::Tagged => FilterCondition::HasAny { field: Field::Tag },
            Requirement::Present(timestamp) => FilterCondition::NotNull { timestamp },
        }
    }
}

/// Classification rule for one route/criteria pairing.
#[derive(Debug, PartialEq, Eq)]
pub struct CriteriaRule {
    pub metrics: &'static [Metric],
    pub route: DeploymentRoute,
    pub criteria: DeploymentCriteria,
    /// Calculation fields the rule may be bucketed by; the first is the default.
    pub timestamp_fields: &'static [CalculationField],
    pub requirements: &'static [Requirement],
}

impl CriteriaRule {
    /// Conditions the rule adds for a given calculation field.
    pub fn conditions(&self, timestamp: CalculationField) -> Vec<FilterCondition> {
        let mut out: Vec<FilterCondition> =
            self.requirements.iter().map(|r| r.to_condition()).collect();
        let present = Requirement::Present(timestamp).to_condition();
        if !out.contains(&present) {
            out.push(present);
        }
        out
    }

    /// Whether an event satisfies the rule when bucketed by `timestamp`.
    pub fn matches(&self, event: &EventRecord, timestamp: CalculationField) -> bool {
        event.source() == self.route.source()
            && self.conditions(timestamp).iter().all(|c| c.matches(event))
    }
}

const DORA: &[Metric] = &[Metric::DeploymentFrequency, Metric::ChangeFailureRate];

const PR_FIELDS: &[CalculationField] = &[CalculationField::PrMergedAt, CalculationField::PrClosedAt];

const COMMIT_FIELDS: &[CalculationField] = &[
    CalculationField::CommittedAt,
    CalculationField::CommitPushedAt,
];

/// The classification table.
pub static CRITERIA_RULES: &[CriteriaRule] = &[
    CriteriaRule {
        metrics: DORA,
        route: DeploymentRoute::Pr,
        criteria: DeploymentCriteria::PrMerged,
        timestamp_fields: PR_FIELDS,
        requirements: &[
            Requirement::Merged,
            Requirement::Present(CalculationField::PrMergedAt),
        ],
    },
    CriteriaRule {
        metrics: DORA,
        route: DeploymentRoute::Pr,
        criteria: DeploymentCriteria::PrClosed,
        timestamp_fields: &[CalculationField::PrClosedAt, CalculationField::PrMergedAt],
        requirements: &[Requirement::Present(CalculationField::PrClosedAt)],
    },
    CriteriaRule {
        metrics: DORA,
        route: DeploymentRoute::Pr,
        criteria: DeploymentCriteria::PrMergedClosed,
        timestamp_fields: PR_FIELDS,
        requirements: &[
            Requirement::Merged,
            Requirement::Present(CalculationField::PrMergedAt),
            Requirement::Present(CalculationField::PrClosedAt),
        ],
    },
    CriteriaRule {
        metrics: DORA,
        route: DeploymentRoute::Commit,
        criteria: DeploymentCriteria::CommitWithTag,
        timestamp_fields: COMMIT_FIELDS,
        requirements: &[Requirement::Tagged],
    },
    CriteriaRule {
        metrics: DORA,
        route: DeploymentRoute::Commit,
        criteria: DeploymentCriteria::CommitMergedToBranch,
        timestamp_fields: COMMIT_FIELDS,
        requirements: &[Requirement::DirectMerge],
    },
    CriteriaRule {
        metrics: DORA,
        route: DeploymentRoute::Commit,
        criteria: DeploymentCriteria::CommitMergedToBranchWithTag,
        timestamp_fields: COMMIT_FIELDS,
        requirements: &[Requirement::DirectMerge, Requirement::Tagged],
    },
    CriteriaRule {
        metrics: DORA,
        route: DeploymentRoute::Issue,
        criteria: DeploymentCriteria::IssueResolved,
        timestamp_fields: &[CalculationField::IssueResolvedAt],
        requirements: &[],
    },
    CriteriaRule {
        metrics: DORA,
        route: DeploymentRoute::Issue,
        criteria: DeploymentCriteria::IssueUpdated,
        timestamp_fields: &[CalculationField::IssueUpdatedAt],
        requirements: &[],
    },
    CriteriaRule {
        metrics: DORA,
        route: DeploymentRoute::Issue,
        criteria: DeploymentCriteria::IssueReleased,
        timestamp_fields: &[CalculationField::ReleasedIn],
        requirements: &[],
    },
    CriteriaRule {
        metrics: DORA,
        route: DeploymentRoute::CicdJob,
        criteria: DeploymentCriteria::JobRunStarted,
        timestamp_fields: &[CalculationField::StartTime],
        requirements: &[],
    },
    CriteriaRule {
        metrics: DORA,
        route: DeploymentRoute::CicdJob,
        criteria: DeploymentCriteria::JobRunCompleted,
        timestamp_fields: &[CalculationField::EndTime],
        requirements: &[],
    },
];

/// Outcome of resolving a filter spec for a metric.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedRoute {
    pub source: EventSource,
    pub timestamp_field: CalculationField,
    pub rule: &'static CriteriaRule,
}

impl ResolvedRoute {
    pub fn conditions(&self) -> Vec<FilterCondition> {
        self.rule.conditions(self.timestamp_field)
    }
}

/// Look up the rule for a metric and filter spec.
///
/// Pairings without an entry, and calculation fields the rule cannot bucket
/// by, are configuration errors.
pub fn resolve(metric: Metric, spec: &FilterSpec) -> Result<ResolvedRoute, CoreError> {
    let rule = CRITERIA_RULES
        .iter()
        .find(|r| {
            r.route == spec.deployment_route
                && r.criteria == spec.deployment_criteria
                && r.metrics.contains(&metric)
        })
        .ok_or_else(|| {
            CoreError::UnsupportedCriteria(format!(
                "{} does not support route {} with criteria {}",
                metric.as_str(),
                spec.deployment_route.as_str(),
                spec.deployment_criteria.as_str()
            ))
        })?;

    if !rule.timestamp_fields.contains(&spec.calculation_field) {
        return Err(CoreError::UnsupportedCriteria(format!(
            "criteria {} cannot be calculated on {}",
            spec.deployment_criteria.as_str(),
            spec.calculation_field.as_str()
        )));
    }

    Ok(ResolvedRoute {
        source: spec.deployment_route.source(),
        timestamp_field: spec.calculation_field,
        rule,
    })
}
