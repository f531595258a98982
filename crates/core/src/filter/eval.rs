//! In-memory evaluation of compiled predicates.
//!
//! Mirrors the SQL rendering in the database crate condition for condition,
//! so the in-memory source and the Postgres source select the same rows.

use super::{CompiledPredicate, FilterCondition};
use crate::event::EventRecord;

impl CompiledPredicate {
    /// Whether an event satisfies the time range and every condition.
    pub fn matches(&self, event: &EventRecord) -> bool {
        if event.source() != self.source {
            return false;
        }
        let in_range = event
            .timestamp(self.timestamp_field)
            .is_some_and(|ts| self.time_range.contains(&ts));
        in_range && self.conditions.iter().all(|c| c.matches(event))
    }
}

impl FilterCondition {
    pub fn matches(&self, event: &EventRecord) -> bool {
        match self {
            FilterCondition::Strict { field, values } => event
                .values(*field)
                .iter()
                .any(|v| values.iter().any(|x| x == v)),
            FilterCondition::Exclude { field, values } => !event
                .values(*field)
                .iter()
                .any(|v| values.iter().any(|x| x == v)),
            FilterCondition::Partial {
                field,
                prefixes,
                fragments,
            } => event.values(*field).iter().any(|v| {
                let v = v.to_lowercase();
                prefixes.iter().any(|p| v.starts_with(p.as_str()))
                    || fragments.iter().any(|f| v.contains(f.as_str()))
            }),
            FilterCondition::ChildMatch {
                child,
                names,
                statuses,
            } => child_matches(event, *child, names, statuses),
            FilterCondition::ExcludeChild {
                child,
                names,
                statuses,
            } => !child_matches(event, *child, names, statuses),
            FilterCondition::Flag { field, value } => event.flag(*field) == Some(*value),
            FilterCondition::NotNull { timestamp } => event.timestamp(*timestamp).is_some(),
            FilterCondition::HasAny { field } => {
                event.values(*field).iter().any(|v| !v.is_empty())
            }
            FilterCondition::Parameter { name, values } => event
                .params()
                .iter()
                .any(|p| &p.name == name && values.contains(&p.value)),
            FilterCondition::Nothing => false,
        }
    }
}

fn child_matches(
    event: &EventRecord,
    kind: super::field::ChildKind,
    names: &[String],
    statuses: &[String],
) -> bool {
    event.children(kind).iter().any(|c| {
        names.contains(&c.name)
            && (statuses.is_empty()
                || c
                    .result
                    .as_deref()
                    .is_some_and(|r| statuses.contains(&r.to_lowercase())))
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::event::{ChildRun, JobRunEvent, JobRunMetadata, PrEvent};
    use crate::filter::field::{ChildKind, Field};
    use crate::profile::{CalculationField, EventSource};
    use crate::types::TimeRange;

    fn pr(id: i64, branch: &str, merged_at: Option<i64>, labels: &[&str]) -> EventRecord {
        EventRecord::PullRequest(PrEvent {
            id,
            integration_id: "1".into(),
            repo_ids: vec!["repo".into()],
            project: None,
            title: Some(format!("PR {id}")),
            creator: Some("alice".into()),
            source_branch: Some(branch.into()),
            target_branch: Some("main".into()),
            state: Some("merged".into()),
            labels: labels.iter().map(|s| s.to_string()).collect(),
            merged: merged_at.is_some(),
            pr_created_at: None,
            pr_updated_at: None,
            pr_merged_at: merged_at.map(|t| Utc.timestamp_opt(t, 0).unwrap()),
            pr_closed_at: None,
            lines_added: 0,
            lines_deleted: 0,
            files_ct: 0,
        })
    }

    fn predicate(conditions: Vec<FilterCondition>) -> CompiledPredicate {
        CompiledPredicate {
            source: EventSource::PullRequest,
            timestamp_field: CalculationField::PrMergedAt,
            time_range: TimeRange::new(100, 200).unwrap(),
            conditions,
        }
    }

    // -- time range ---

    #[test]
    fn events_outside_range_or_without_timestamp_never_match() {
        let pred = predicate(vec![]);
        assert!(pred.matches(&pr(1, "a", Some(150), &[])));
        assert!(!pred.matches(&pr(2, "a", Some(201), &[])));
        assert!(!pred.matches(&pr(3, "a", None, &[])));
    }

    // -- strict / exclude / partial ---

    #[test]
    fn exclude_is_complement_of_strict() {
        let values = vec!["hotfix".to_string()];
        let strict = FilterCondition::Strict {
            field: Field::Label,
            values: values.clone(),
        };
        let exclude = FilterCondition::Exclude {
            field: Field::Label,
            values,
        };
        for event in [
            pr(1, "a", Some(150), &["hotfix"]),
            pr(2, "a", Some(150), &["feature", "hotfix"]),
            pr(3, "a", Some(150), &[]),
        ] {
            assert_ne!(strict.matches(&event), exclude.matches(&event));
        }
    }

    #[test]
    fn partial_matches_true_prefixes_case_insensitively() {
        let cond = FilterCondition::Partial {
            field: Field::SourceBranch,
            prefixes: vec!["release/".into()],
            fragments: vec![],
        };
        assert!(cond.matches(&pr(1, "Release/1.0", Some(150), &[])));
        assert!(!cond.matches(&pr(2, "hotfix/release/1.0", Some(150), &[])));
    }

    #[test]
    fn contains_fragments_match_anywhere() {
        let cond = FilterCondition::Partial {
            field: Field::SourceBranch,
            prefixes: vec![],
            fragments: vec!["release".into()],
        };
        assert!(cond.matches(&pr(1, "hotfix/RELEASE/1.0", Some(150), &[])));
    }

    // -- child conditions ---

    #[test]
    fn exclude_child_considers_name_and_status_together() {
        let run = EventRecord::JobRun(JobRunEvent {
            id: 1,
            cicd_job_id: "j".into(),
            integration_id: "1".into(),
            instance_name: None,
            job_name: "deploy".into(),
            job_normalized_full_name: None,
            project: None,
            job_run_number: 1,
            status: None,
            cicd_user_id: None,
            triage_rules: vec![],
            metadata: JobRunMetadata::default(),
            params: vec![],
            stages: vec![
                ChildRun {
                    name: "deploy".into(),
                    result: Some("SUCCESS".into()),
                },
                ChildRun {
                    name: "test".into(),
                    result: Some("FAILED".into()),
                },
            ],
            steps: vec![],
            start_time: None,
            end_time: None,
            duration_secs: None,
        });

        let excl = |names: &[&str], statuses: &[&str]| FilterCondition::ExcludeChild {
            child: ChildKind::Stage,
            names: names.iter().map(|s| s.to_string()).collect(),
            statuses: statuses.iter().map(|s| s.to_string()).collect(),
        };

        // "deploy" exists but did not fail: the run is kept.
        assert!(excl(&["deploy"], &["failed"]).matches(&run));
        // "test" failed: the run is excluded.
        assert!(!excl(&["test"], &["failed"]).matches(&run));
        // No status qualifier: any "deploy" stage excludes.
        assert!(!excl(&["deploy"], &[]).matches(&run));
    }

    #[test]
    fn nothing_matches_nothing() {
        assert!(!FilterCondition::Nothing.matches(&pr(1, "a", Some(150), &[])));
    }
}
