//! Filter compiler.
//!
//! Turns a profile [`FilterSpec`] plus a per-call [`RequestFilter`] and an
//! optional [`OuScope`] into an immutable [`CompiledPredicate`] bound to one
//! event source. The predicate is a flat conjunction of [`FilterCondition`]s;
//! adapters either evaluate it directly ([`CompiledPredicate::matches`]) or
//! render it into their own query language.
//!
//! Semantics:
//!
//! - values listed for one field are OR-ed; different fields and different
//!   filter classes are AND-ed
//! - blank values are dropped, and an entry with only blank values adds nothing
//! - integration ids from every layer are intersected; an empty intersection
//!   compiles to [`FilterCondition::Nothing`]

pub mod eval;
pub mod field;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::CoreError;
use crate::profile::{CalculationField, EventSource, FilterSpec, FilterValue, PartialMatch};
use crate::request::{OuScope, RequestFilter};
use crate::types::TimeRange;

use field::{ChildKind, Field, INTEGRATION_IDS_KEY, PARAMETERS_KEY};

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// One conjunct of a compiled predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FilterCondition {
    /// Field value is one of `values` (multi-valued fields: any overlap).
    Strict { field: Field, values: Vec<String> },
    /// Field value is none of `values`; unset fields pass.
    Exclude { field: Field, values: Vec<String> },
    /// Case-insensitive begins-with any prefix or contains any fragment.
    /// Patterns are stored lowercase.
    Partial {
        field: Field,
        prefixes: Vec<String>,
        fragments: Vec<String>,
    },
    /// Some stage/step has one of `names` and, when given, one of `statuses`.
    ChildMatch {
        child: ChildKind,
        names: Vec<String>,
        statuses: Vec<String>,
    },
    /// No stage/step has one of `names` with one of `statuses`.
    ExcludeChild {
        child: ChildKind,
        names: Vec<String>,
        statuses: Vec<String>,
    },
    /// Boolean attribute equals `value`.
    Flag { field: Field, value: bool },
    /// Timestamp attribute is present.
    NotNull { timestamp: CalculationField },
    /// Multi-valued attribute has at least one value.
    HasAny { field: Field },
    /// Build parameter `name` has one of `values`.
    Parameter { name: String, values: Vec<String> },
    /// Matches nothing.
    Nothing,
}

/// Request-scoped, immutable predicate over one event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledPredicate {
    pub source: EventSource,
    pub timestamp_field: CalculationField,
    pub time_range: TimeRange,
    pub conditions: Vec<FilterCondition>,
}

impl CompiledPredicate {
    /// Append further required conditions (e.g. deployment criteria).
    pub fn conjoin(mut self, extra: impl IntoIterator<Item = FilterCondition>) -> Self {
        for condition in extra {
            if !self.conditions.contains(&condition) {
                self.conditions.push(condition);
            }
        }
        self
    }

    /// Whether the predicate statically matches no rows.
    pub fn is_unsatisfiable(&self) -> bool {
        self.conditions.contains(&FilterCondition::Nothing)
    }
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Compile a profile filter spec, scoped by the profile's integration ids,
/// narrowed by a request and an optional OU scope.
pub fn compile(
    spec: &FilterSpec,
    profile_integration_ids: &[String],
    request: &RequestFilter,
    ou: Option<&OuScope>,
) -> Result<CompiledPredicate, CoreError> {
    request.time_range.validate()?;
    let source = route_source(spec)?;

    let mut out = Vec::new();

    // Integration scope.
    let mut scopes: Vec<Vec<String>> = vec![
        profile_integration_ids.to_vec(),
        request.integration_ids.clone(),
    ];
    for map in [&spec.filters, &request.filters] {
        if let Some(value) = map.get(INTEGRATION_IDS_KEY) {
            scopes.push(value.values());
        }
    }
    if let Some(ou) = ou {
        scopes.push(ou.integration_ids.clone());
    }
    out.extend(intersect_integration_ids(scopes));

    // Strict, exclude and partial classes, profile first.
    compile_strict(source, &spec.filters, &mut out)?;
    compile_strict(source, &request.filters, &mut out)?;
    compile_exclude(source, &spec.exclude_filters, &mut out)?;
    compile_exclude(source, &request.exclude_filters, &mut out)?;
    compile_partial(source, &spec.partial_match_filters, &mut out)?;
    compile_partial(source, &request.partial_match_filters, &mut out)?;

    out.extend(compile_job_ids(spec, source)?);

    // Request shorthands.
    let job_names = non_blank(&request.job_names);
    if !job_names.is_empty() {
        let field = field::lookup(source, "job_names").ok_or_else(|| unknown(source, "job_names"))?;
        out.push(FilterCondition::Strict {
            field,
            values: job_names,
        });
    }
    let branches = non_blank(&request.branches);
    if !branches.is_empty() {
        let field = Field::branch_for(source).ok_or_else(|| unknown(source, "branches"))?;
        out.push(FilterCondition::Strict {
            field,
            values: branches,
        });
    }
    for (kind, names) in [
        (ChildKind::Stage, &request.stage_names),
        (ChildKind::Step, &request.step_names),
    ] {
        let names = non_blank(names);
        if names.is_empty() {
            continue;
        }
        if source != EventSource::JobRun {
            return Err(unknown(source, kind.names_key()));
        }
        out.push(FilterCondition::ChildMatch {
            child: kind,
            names,
            statuses: Vec::new(),
        });
    }

    // OU membership.
    if let Some(ou) = ou {
        let users: BTreeSet<String> = non_blank(&ou.static_user_ids)
            .into_iter()
            .chain(non_blank(&ou.dynamic_user_ids))
            .collect();
        if !users.is_empty() {
            out.push(FilterCondition::Strict {
                field: Field::user_for(source),
                values: users.into_iter().collect(),
            });
        }
    }

    tracing::debug!(
        source = source.as_str(),
        timestamp = spec.calculation_field.as_str(),
        conditions = out.len(),
        "Compiled filter predicate"
    );

    Ok(CompiledPredicate {
        source,
        timestamp_field: spec.calculation_field,
        time_range: request.time_range,
        conditions: out,
    })
}

/// Check a stored filter spec on its own: the calculation field belongs to
/// the route and every filter key is in the route's vocabulary.
pub fn check_spec(spec: &FilterSpec) -> Result<(), CoreError> {
    let source = route_source(spec)?;
    let mut out = Vec::new();
    compile_strict(source, &spec.filters, &mut out)?;
    compile_exclude(source, &spec.exclude_filters, &mut out)?;
    compile_partial(source, &spec.partial_match_filters, &mut out)?;
    compile_job_ids(spec, source)?;
    Ok(())
}

fn route_source(spec: &FilterSpec) -> Result<EventSource, CoreError> {
    let source = spec.deployment_route.source();
    if spec.calculation_field.source() != source {
        return Err(CoreError::UnsupportedCriteria(format!(
            "calculation field {} does not belong to route {}",
            spec.calculation_field.as_str(),
            spec.deployment_route.as_str()
        )));
    }
    Ok(source)
}

/// Manual job selection.
fn compile_job_ids(
    spec: &FilterSpec,
    source: EventSource,
) -> Result<Option<FilterCondition>, CoreError> {
    let job_ids = non_blank(&spec.event_job_ids);
    if job_ids.is_empty() {
        return Ok(None);
    }
    if source != EventSource::JobRun {
        return Err(CoreError::InvalidFilter(format!(
            "event_job_ids is not supported for route {}",
            spec.deployment_route.as_str()
        )));
    }
    Ok(Some(FilterCondition::Strict {
        field: Field::JobId,
        values: job_ids,
    }))
}

fn intersect_integration_ids(scopes: Vec<Vec<String>>) -> Option<FilterCondition> {
    let mut acc: Option<BTreeSet<String>> = None;
    for scope in scopes {
        let set: BTreeSet<String> = non_blank(&scope).into_iter().collect();
        if set.is_empty() {
            continue;
        }
        acc = Some(match acc {
            None => set,
            Some(prev) => prev.intersection(&set).cloned().collect(),
        });
    }
    acc.map(|ids| {
        if ids.is_empty() {
            FilterCondition::Nothing
        } else {
            FilterCondition::Strict {
                field: Field::IntegrationId,
                values: ids.into_iter().collect(),
            }
        }
    })
}

fn compile_strict(
    source: EventSource,
    map: &BTreeMap<String, FilterValue>,
    out: &mut Vec<FilterCondition>,
) -> Result<(), CoreError> {
    for (key, value) in map {
        if key == INTEGRATION_IDS_KEY {
            continue;
        }
        if key == PARAMETERS_KEY && source == EventSource::JobRun {
            out.extend(compile_parameters(value)?);
            continue;
        }
        if field::is_structural_key(source, key) {
            continue;
        }
        let field = field::lookup(source, key).ok_or_else(|| unknown(source, key))?;
        if let Some(condition) = value_condition(field, key, value, false)? {
            out.push(condition);
        }
    }
    out.extend(compile_children(source, map, false)?);
    Ok(())
}

fn compile_exclude(
    source: EventSource,
    map: &BTreeMap<String, FilterValue>,
    out: &mut Vec<FilterCondition>,
) -> Result<(), CoreError> {
    for (key, value) in map {
        if key == PARAMETERS_KEY && source == EventSource::JobRun {
            return Err(CoreError::InvalidFilter(
                "parameters cannot be used as an exclude filter".into(),
            ));
        }
        if field::is_structural_key(source, key) {
            continue;
        }
        let field = field::lookup(source, key)
            .ok_or_else(|| CoreError::InvalidFilter(format!(
                "exclude filter '{key}' has no matching field for source {}",
                source.as_str()
            )))?;
        if let Some(condition) = value_condition(field, key, value, true)? {
            out.push(condition);
        }
    }
    out.extend(compile_children(source, map, true)?);
    Ok(())
}

fn compile_partial(
    source: EventSource,
    map: &BTreeMap<String, PartialMatch>,
    out: &mut Vec<FilterCondition>,
) -> Result<(), CoreError> {
    for (key, partial) in map {
        let field = field::lookup(source, key).ok_or_else(|| unknown(source, key))?;
        if field.is_flag() {
            return Err(CoreError::InvalidFilter(format!(
                "'{key}' is a flag and cannot be partially matched"
            )));
        }
        if let Some(op) = partial.other.keys().next() {
            return Err(CoreError::InvalidFilter(format!(
                "unsupported partial match operator '{op}' for '{key}'"
            )));
        }
        let lower = |v: &Option<FilterValue>| -> Vec<String> {
            v.as_ref()
                .map(|v| v.values().iter().map(|s| s.to_lowercase()).collect())
                .unwrap_or_default()
        };
        let prefixes = lower(&partial.begins);
        let fragments = lower(&partial.contains);
        if prefixes.is_empty() && fragments.is_empty() {
            continue;
        }
        out.push(FilterCondition::Partial {
            field,
            prefixes,
            fragments,
        });
    }
    Ok(())
}

/// Condition for one strict/exclude entry, or `None` when it carries no values.
fn value_condition(
    field: Field,
    key: &str,
    value: &FilterValue,
    exclude: bool,
) -> Result<Option<FilterCondition>, CoreError> {
    if field.is_flag() {
        let flag = match value {
            FilterValue::Flag(b) => *b,
            FilterValue::Single(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                "" => return Ok(None),
                other => {
                    return Err(CoreError::InvalidFilter(format!(
                        "'{key}' expects true or false, got '{other}'"
                    )))
                }
            },
            _ => {
                return Err(CoreError::InvalidFilter(format!(
                    "'{key}' expects true or false"
                )))
            }
        };
        return Ok(Some(FilterCondition::Flag {
            field,
            value: flag != exclude,
        }));
    }

    if matches!(value, FilterValue::Flag(_) | FilterValue::Parameters(_)) {
        return Err(CoreError::InvalidFilter(format!(
            "'{key}' expects a string or a list of strings"
        )));
    }
    let values = value.values();
    if values.is_empty() {
        return Ok(None);
    }
    Ok(Some(if exclude {
        FilterCondition::Exclude { field, values }
    } else {
        FilterCondition::Strict { field, values }
    }))
}

fn compile_parameters(value: &FilterValue) -> Result<Vec<FilterCondition>, CoreError> {
    let params = match value {
        FilterValue::Parameters(params) => params,
        // `[]` deserializes as an empty list before it can match `Parameters`.
        FilterValue::List(values) if values.is_empty() => return Ok(Vec::new()),
        _ => {
            return Err(CoreError::InvalidFilter(
                "parameters expects a list of {name, values} objects".into(),
            ))
        }
    };
    Ok(params
        .iter()
        .filter_map(|p| {
            let name = p.name.trim();
            let values = non_blank(&p.values);
            (!name.is_empty() && !values.is_empty()).then(|| FilterCondition::Parameter {
                name: name.to_string(),
                values,
            })
        })
        .collect())
}

/// Stage/step conditions from `*_names` and `*_statuses` keys.
fn compile_children(
    source: EventSource,
    map: &BTreeMap<String, FilterValue>,
    exclude: bool,
) -> Result<Vec<FilterCondition>, CoreError> {
    let mut out = Vec::new();
    if source != EventSource::JobRun {
        return Ok(out);
    }
    for kind in [ChildKind::Stage, ChildKind::Step] {
        let names = map.get(kind.names_key()).map(FilterValue::values).unwrap_or_default();
        let statuses: Vec<String> = map
            .get(kind.statuses_key())
            .map(FilterValue::values)
            .unwrap_or_default()
            .iter()
            .map(|s| s.to_lowercase())
            .collect();
        if names.is_empty() {
            if !statuses.is_empty() {
                return Err(CoreError::InvalidFilter(format!(
                    "{} requires {}",
                    kind.statuses_key(),
                    kind.names_key()
                )));
            }
            continue;
        }
        out.push(if exclude {
            FilterCondition::ExcludeChild {
                child: kind,
                names,
                statuses,
            }
        } else {
            FilterCondition::ChildMatch {
                child: kind,
                names,
                statuses,
            }
        });
    }
    Ok(out)
}

fn non_blank(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn unknown(source: EventSource, key: &str) -> CoreError {
    CoreError::InvalidFilter(format!(
        "unknown filter field '{key}' for source {}",
        source.as_str()
    ))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::profile::{DeploymentCriteria, DeploymentRoute, JobParameter};

    fn range() -> TimeRange {
        TimeRange::new(1592613323, 1593477323).unwrap()
    }

    fn pr_spec() -> FilterSpec {
        FilterSpec::new(
            DeploymentRoute::Pr,
            DeploymentCriteria::PrMerged,
            CalculationField::PrMergedAt,
        )
    }

    fn job_spec() -> FilterSpec {
        FilterSpec::new(
            DeploymentRoute::CicdJob,
            DeploymentCriteria::JobRunCompleted,
            CalculationField::EndTime,
        )
    }

    // -- compile: classes ---

    #[test]
    fn strict_exclude_and_partial_compile_to_distinct_conditions() {
        let spec = pr_spec()
            .with_filter("target_branches", vec!["main", " "].into())
            .with_exclude("labels", vec!["wip"].into())
            .with_partial("source_branches", PartialMatch::begins_with(vec!["Release/"]));

        let pred = compile(&spec, &[], &RequestFilter::new(range()), None).unwrap();

        assert_eq!(pred.source, EventSource::PullRequest);
        assert_eq!(
            pred.conditions,
            vec![
                FilterCondition::Strict {
                    field: Field::TargetBranch,
                    values: vec!["main".into()],
                },
                FilterCondition::Exclude {
                    field: Field::Label,
                    values: vec!["wip".into()],
                },
                FilterCondition::Partial {
                    field: Field::SourceBranch,
                    prefixes: vec!["release/".into()],
                    fragments: vec![],
                },
            ]
        );
    }

    #[test]
    fn blank_entries_contribute_nothing() {
        let spec = pr_spec()
            .with_filter("creators", vec!["", "  "].into())
            .with_partial("titles", PartialMatch::begins_with(vec![""]));
        let pred = compile(&spec, &[], &RequestFilter::new(range()), None).unwrap();
        assert!(pred.conditions.is_empty());
    }

    #[test]
    fn request_filters_are_and_merged_with_profile() {
        let spec = pr_spec().with_filter("target_branches", vec!["main", "dev"].into());
        let mut request = RequestFilter::new(range());
        request.branches = vec!["main".into()];

        let pred = compile(&spec, &[], &request, None).unwrap();
        assert_eq!(pred.conditions.len(), 2);
    }

    // -- compile: errors ---

    #[test]
    fn unknown_field_is_invalid_filter() {
        let spec = pr_spec().with_filter("job_names", vec!["build"].into());
        let err = compile(&spec, &[], &RequestFilter::new(range()), None).unwrap_err();
        assert_matches!(err, CoreError::InvalidFilter(_));
    }

    #[test]
    fn exclude_without_route_concept_is_invalid_filter() {
        let spec = pr_spec().with_exclude("stage_names", vec!["deploy"].into());
        let err = compile(&spec, &[], &RequestFilter::new(range()), None).unwrap_err();
        assert_matches!(err, CoreError::InvalidFilter(msg) if msg.contains("stage_names"));
    }

    #[test]
    fn statuses_without_names_are_rejected() {
        let spec = job_spec().with_exclude("stage_statuses", vec!["FAILED"].into());
        let err = compile(&spec, &[], &RequestFilter::new(range()), None).unwrap_err();
        assert_matches!(err, CoreError::InvalidFilter(_));
    }

    #[test]
    fn unknown_partial_operator_is_rejected() {
        let partial: PartialMatch =
            serde_json::from_value(serde_json::json!({ "$regex": "x" })).unwrap();
        let spec = pr_spec().with_partial("titles", partial);
        let err = compile(&spec, &[], &RequestFilter::new(range()), None).unwrap_err();
        assert_matches!(err, CoreError::InvalidFilter(_));
    }

    #[test]
    fn foreign_calculation_field_is_unsupported() {
        let mut spec = pr_spec();
        spec.calculation_field = CalculationField::CommittedAt;
        let err = compile(&spec, &[], &RequestFilter::new(range()), None).unwrap_err();
        assert_matches!(err, CoreError::UnsupportedCriteria(_));
    }

    #[test]
    fn inverted_time_range_is_validation_error() {
        let request = RequestFilter::new(TimeRange { begin: 10, end: 1 });
        let err = compile(&pr_spec(), &[], &request, None).unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    // -- compile: job runs ---

    #[test]
    fn exclude_stage_with_status_compiles_to_negative_child_match() {
        let spec = job_spec()
            .with_exclude("stage_names", vec!["deploy"].into())
            .with_exclude("stage_statuses", vec!["FAILED"].into());
        let pred = compile(&spec, &[], &RequestFilter::new(range()), None).unwrap();
        assert_eq!(
            pred.conditions,
            vec![FilterCondition::ExcludeChild {
                child: ChildKind::Stage,
                names: vec!["deploy".into()],
                statuses: vec!["failed".into()],
            }]
        );
    }

    #[test]
    fn metadata_flags_and_parameters_compile() {
        let spec = job_spec()
            .with_filter("rollback", FilterValue::Flag(true))
            .with_filter("environments", vec!["prod"].into())
            .with_filter(
                "parameters",
                FilterValue::Parameters(vec![JobParameter {
                    name: "region".into(),
                    values: vec!["us-east-1".into()],
                }]),
            );
        let pred = compile(&spec, &[], &RequestFilter::new(range()), None).unwrap();
        assert!(pred.conditions.contains(&FilterCondition::Flag {
            field: Field::Metadata(field::MetadataKey::Rollback),
            value: true,
        }));
        assert!(pred.conditions.contains(&FilterCondition::Parameter {
            name: "region".into(),
            values: vec!["us-east-1".into()],
        }));
        assert_eq!(pred.conditions.len(), 3);
    }

    #[test]
    fn empty_parameters_list_contributes_nothing() {
        let value: FilterValue = serde_json::from_value(serde_json::json!([])).unwrap();
        let spec = job_spec().with_filter("parameters", value);
        let pred = compile(&spec, &[], &RequestFilter::new(range()), None).unwrap();
        assert!(pred.conditions.is_empty());
    }

    #[test]
    fn string_list_parameters_are_rejected() {
        let spec = job_spec().with_filter("parameters", vec!["region"].into());
        let err = compile(&spec, &[], &RequestFilter::new(range()), None).unwrap_err();
        assert_matches!(err, CoreError::InvalidFilter(_));
    }

    #[test]
    fn event_job_ids_require_job_route() {
        let mut spec = pr_spec();
        spec.event_job_ids = vec!["42".into()];
        let err = compile(&spec, &[], &RequestFilter::new(range()), None).unwrap_err();
        assert_matches!(err, CoreError::InvalidFilter(_));
    }

    // -- compile: scope ---

    #[test]
    fn integration_scopes_intersect() {
        let mut request = RequestFilter::new(range());
        request.integration_ids = vec!["1".into(), "2".into()];
        let ou = OuScope {
            ou_ref_id: 9,
            integration_ids: vec!["2".into(), "3".into()],
            ..OuScope::default()
        };

        let pred = compile(&pr_spec(), &["2".into(), "1".into()], &request, Some(&ou)).unwrap();
        assert_eq!(
            pred.conditions,
            vec![FilterCondition::Strict {
                field: Field::IntegrationId,
                values: vec!["2".into()],
            }]
        );
    }

    #[test]
    fn disjoint_integration_scopes_match_nothing() {
        let mut request = RequestFilter::new(range());
        request.integration_ids = vec!["5".into()];
        let pred = compile(&pr_spec(), &["1".into()], &request, None).unwrap();
        assert!(pred.is_unsatisfiable());
    }

    #[test]
    fn ou_users_restrict_route_user_field() {
        let ou = OuScope {
            ou_ref_id: 1,
            static_user_ids: vec!["alice".into()],
            dynamic_user_ids: vec!["bob".into(), "alice".into()],
            ..OuScope::default()
        };
        let pred = compile(&job_spec(), &[], &RequestFilter::new(range()), Some(&ou)).unwrap();
        assert_eq!(
            pred.conditions,
            vec![FilterCondition::Strict {
                field: Field::CicdUserId,
                values: vec!["alice".into(), "bob".into()],
            }]
        );
    }

    // -- conjoin ---

    #[test]
    fn conjoin_skips_duplicates() {
        let pred = compile(&pr_spec(), &[], &RequestFilter::new(range()), None)
            .unwrap()
            .conjoin([
                FilterCondition::Flag {
                    field: Field::Merged,
                    value: true,
                },
                FilterCondition::Flag {
                    field: Field::Merged,
                    value: true,
                },
            ]);
        assert_eq!(pred.conditions.len(), 1);
    }
}
