//! Render compiled predicates as PostgreSQL.
//!
//! Each [`FilterCondition`] becomes one parenthesised conjunct over the
//! source table aliased as `r`, with every value bound as a parameter.
//! The rendering matches the in-memory evaluator in `velocity_core`, so
//! both sources select the same rows for the same predicate.

use sqlx::{Postgres, QueryBuilder};
use velocity_core::bucketing::{Granularity, StackKey, UNKNOWN_STACK};
use velocity_core::drilldown::ResolvedSort;
use velocity_core::error::CoreError;
use velocity_core::filter::field::{ChildKind, Field, MetadataKey};
use velocity_core::filter::{CompiledPredicate, FilterCondition};
use velocity_core::profile::{CalculationField, EventSource};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Table backing an event source.
pub fn table(source: EventSource) -> &'static str {
    match source {
        EventSource::PullRequest => "scm_pull_requests",
        EventSource::Commit => "scm_commits",
        EventSource::Issue => "issues",
        EventSource::JobRun => "cicd_job_runs",
    }
}

/// Qualified timestamp column for a calculation field.
pub fn timestamp_column(field: CalculationField) -> &'static str {
    match field {
        CalculationField::PrMergedAt => "r.pr_merged_at",
        CalculationField::PrClosedAt => "r.pr_closed_at",
        CalculationField::CommittedAt => "r.committed_at",
        CalculationField::CommitPushedAt => "r.commit_pushed_at",
        CalculationField::IssueResolvedAt => "r.issue_resolved_at",
        CalculationField::IssueUpdatedAt => "r.issue_updated_at",
        CalculationField::ReleasedIn => "r.released_in",
        CalculationField::StartTime => "r.start_time",
        CalculationField::EndTime => "r.end_time",
    }
}

/// Child table holding stage or step results.
pub fn child_table(kind: ChildKind) -> &'static str {
    match kind {
        ChildKind::Stage => "cicd_job_run_stages",
        ChildKind::Step => "cicd_job_run_steps",
    }
}

/// How a field is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// Nullable text column.
    Scalar(&'static str),
    /// `TEXT[]` column.
    Array(&'static str),
    /// Array of strings under a key of the `metadata` JSONB column.
    JsonArray(&'static str),
    /// Non-null boolean expression.
    Flag(&'static str),
}

/// Storage of a field for a source; `None` when the source lacks it.
pub fn column(source: EventSource, field: Field) -> Option<Column> {
    use Column::*;
    let column = match (source, field) {
        (_, Field::IntegrationId) => Scalar("r.integration_id"),
        (_, Field::Project) => Scalar("r.project"),
        (EventSource::PullRequest | EventSource::Commit, Field::RepoId) => Array("r.repo_ids"),
        (EventSource::PullRequest | EventSource::Issue, Field::Label) => Array("r.labels"),

        (EventSource::PullRequest, Field::Creator) => Scalar("r.creator"),
        (EventSource::PullRequest, Field::SourceBranch) => Scalar("r.source_branch"),
        (EventSource::PullRequest, Field::TargetBranch) => Scalar("r.target_branch"),
        (EventSource::PullRequest, Field::State) => Scalar("r.state"),
        (EventSource::PullRequest, Field::Title) => Scalar("r.title"),
        (EventSource::PullRequest, Field::Merged) => Flag("r.merged"),

        (EventSource::Commit, Field::Committer) => Scalar("r.committer"),
        (EventSource::Commit, Field::Author) => Scalar("r.author"),
        (EventSource::Commit, Field::CommitBranch) => Scalar("r.branch"),
        (EventSource::Commit, Field::Tag) => Array("r.tags"),
        (EventSource::Commit, Field::DirectMerge) => Flag("r.direct_merge"),

        (EventSource::Issue, Field::IssueType) => Scalar("r.issue_type"),
        (EventSource::Issue, Field::Status) => Scalar("r.status"),
        (EventSource::Issue, Field::Priority) => Scalar("r.priority"),
        (EventSource::Issue, Field::Assignee) => Scalar("r.assignee"),
        (EventSource::Issue, Field::Component) => Array("r.components"),
        (EventSource::Issue, Field::FixVersion) => Array("r.fix_versions"),

        (EventSource::JobRun, Field::JobId) => Scalar("r.cicd_job_id"),
        (EventSource::JobRun, Field::InstanceName) => Scalar("r.instance_name"),
        (EventSource::JobRun, Field::JobName) => Scalar("r.job_name"),
        (EventSource::JobRun, Field::JobNormalizedFullName) => {
            Scalar("r.job_normalized_full_name")
        }
        (EventSource::JobRun, Field::JobStatus) => Scalar("r.status"),
        (EventSource::JobRun, Field::CicdUserId) => Scalar("r.cicd_user_id"),
        (EventSource::JobRun, Field::TriageRule) => Array("r.triage_rules"),
        (EventSource::JobRun, Field::Metadata(MetadataKey::Rollback)) => {
            Flag("COALESCE((r.metadata->>'rollback')::boolean, FALSE)")
        }
        (EventSource::JobRun, Field::Metadata(key)) => JsonArray(key.json_key()),

        _ => return None,
    };
    Some(column)
}

fn require_column(source: EventSource, field: Field) -> Result<Column, CoreError> {
    column(source, field).ok_or_else(|| {
        CoreError::Internal(format!(
            "field {field:?} has no column in {}",
            table(source)
        ))
    })
}

/// Set-returning expression over the elements of an array column.
fn elements(column: Column) -> Option<String> {
    match column {
        Column::Array(col) => Some(format!("unnest({col})")),
        Column::JsonArray(key) => Some(format!(
            "jsonb_array_elements_text(CASE WHEN jsonb_typeof(r.metadata->'{key}') = 'array' \
             THEN r.metadata->'{key}' ELSE '[]'::jsonb END)"
        )),
        Column::Scalar(_) | Column::Flag(_) => None,
    }
}

// ---------------------------------------------------------------------------
// LIKE patterns
// ---------------------------------------------------------------------------

/// Escape `LIKE` metacharacters using the default backslash escape.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Lower-case `LIKE` patterns for begins-with prefixes and contains fragments.
pub fn like_patterns(prefixes: &[String], fragments: &[String]) -> Vec<String> {
    prefixes
        .iter()
        .map(|p| format!("{}%", escape_like(p)))
        .chain(fragments.iter().map(|f| format!("%{}%", escape_like(f))))
        .collect()
}

// ---------------------------------------------------------------------------
// WHERE clause
// ---------------------------------------------------------------------------

/// Append ` WHERE ...` for a predicate: time range first, then each condition.
pub fn push_where(
    qb: &mut QueryBuilder<'static, Postgres>,
    predicate: &CompiledPredicate,
) -> Result<(), CoreError> {
    let range = predicate.time_range;
    let (begin, end) = range
        .begin_utc()
        .zip(range.end_utc())
        .ok_or_else(|| CoreError::Validation("time range is out of bounds".into()))?;
    let ts = timestamp_column(predicate.timestamp_field);

    qb.push(format!(" WHERE {ts} >= "))
        .push_bind(begin)
        .push(format!(" AND {ts} <= "))
        .push_bind(end);

    for condition in &predicate.conditions {
        qb.push(" AND (");
        push_condition(qb, predicate.source, condition)?;
        qb.push(")");
    }
    Ok(())
}

/// Append one condition as a boolean expression that never yields NULL.
pub fn push_condition(
    qb: &mut QueryBuilder<'static, Postgres>,
    source: EventSource,
    condition: &FilterCondition,
) -> Result<(), CoreError> {
    match condition {
        FilterCondition::Strict { field, values } => match require_column(source, *field)? {
            Column::Scalar(col) => {
                qb.push(format!("COALESCE({col} = ANY("))
                    .push_bind(values.clone())
                    .push("), FALSE)");
            }
            Column::Array(col) => {
                qb.push(format!("{col} && ")).push_bind(values.clone());
            }
            column @ Column::JsonArray(_) => {
                qb.push(format!(
                    "EXISTS (SELECT 1 FROM {} v WHERE v = ANY(",
                    elements(column).unwrap_or_default()
                ))
                .push_bind(values.clone())
                .push("))");
            }
            Column::Flag(_) => return Err(flag_misuse(*field)),
        },

        FilterCondition::Exclude { field, values } => match require_column(source, *field)? {
            Column::Scalar(col) => {
                qb.push(format!("{col} IS NULL OR NOT ({col} = ANY("))
                    .push_bind(values.clone())
                    .push("))");
            }
            Column::Array(col) => {
                qb.push(format!("NOT ({col} && ")).push_bind(values.clone()).push(")");
            }
            column @ Column::JsonArray(_) => {
                qb.push(format!(
                    "NOT EXISTS (SELECT 1 FROM {} v WHERE v = ANY(",
                    elements(column).unwrap_or_default()
                ))
                .push_bind(values.clone())
                .push("))");
            }
            Column::Flag(_) => return Err(flag_misuse(*field)),
        },

        FilterCondition::Partial {
            field,
            prefixes,
            fragments,
        } => {
            let patterns = like_patterns(prefixes, fragments);
            match require_column(source, *field)? {
                Column::Scalar(col) => {
                    qb.push(format!("COALESCE(LOWER({col}) LIKE ANY("))
                        .push_bind(patterns)
                        .push("), FALSE)");
                }
                column @ (Column::Array(_) | Column::JsonArray(_)) => {
                    qb.push(format!(
                        "EXISTS (SELECT 1 FROM {} v WHERE LOWER(v) LIKE ANY(",
                        elements(column).unwrap_or_default()
                    ))
                    .push_bind(patterns)
                    .push("))");
                }
                Column::Flag(_) => return Err(flag_misuse(*field)),
            }
        }

        FilterCondition::ChildMatch {
            child,
            names,
            statuses,
        } => {
            require_job_runs(source, "stage/step")?;
            qb.push("EXISTS ");
            push_child_subquery(qb, *child, names, statuses);
        }

        FilterCondition::ExcludeChild {
            child,
            names,
            statuses,
        } => {
            require_job_runs(source, "stage/step")?;
            qb.push("NOT EXISTS ");
            push_child_subquery(qb, *child, names, statuses);
        }

        FilterCondition::Flag { field, value } => match require_column(source, *field)? {
            Column::Flag(expr) => {
                qb.push(format!("{expr} = ")).push_bind(*value);
            }
            _ => {
                return Err(CoreError::Internal(format!(
                    "field {field:?} is not a boolean"
                )))
            }
        },

        FilterCondition::NotNull { timestamp } => {
            qb.push(format!("{} IS NOT NULL", timestamp_column(*timestamp)));
        }

        FilterCondition::HasAny { field } => match require_column(source, *field)? {
            Column::Scalar(col) => {
                qb.push(format!("COALESCE({col} <> '', FALSE)"));
            }
            column @ (Column::Array(_) | Column::JsonArray(_)) => {
                qb.push(format!(
                    "EXISTS (SELECT 1 FROM {} v WHERE v <> '')",
                    elements(column).unwrap_or_default()
                ));
            }
            Column::Flag(_) => return Err(flag_misuse(*field)),
        },

        FilterCondition::Parameter { name, values } => {
            require_job_runs(source, "parameter")?;
            qb.push(
                "EXISTS (SELECT 1 FROM cicd_job_run_params p \
                 WHERE p.job_run_id = r.id AND p.name = ",
            )
            .push_bind(name.clone())
            .push(" AND p.value = ANY(")
            .push_bind(values.clone())
            .push("))");
        }

        FilterCondition::Nothing => {
            qb.push("FALSE");
        }
    }
    Ok(())
}

fn push_child_subquery(
    qb: &mut QueryBuilder<'static, Postgres>,
    child: ChildKind,
    names: &[String],
    statuses: &[String],
) {
    qb.push(format!(
        "(SELECT 1 FROM {} c WHERE c.job_run_id = r.id AND c.name = ANY(",
        child_table(child)
    ))
    .push_bind(names.to_vec())
    .push(")");
    if !statuses.is_empty() {
        qb.push(" AND LOWER(c.result) = ANY(")
            .push_bind(statuses.to_vec())
            .push(")");
    }
    qb.push(")");
}

fn require_job_runs(source: EventSource, what: &str) -> Result<(), CoreError> {
    if source == EventSource::JobRun {
        Ok(())
    } else {
        Err(CoreError::Internal(format!(
            "{what} conditions only apply to job runs, not {}",
            source.as_str()
        )))
    }
}

fn flag_misuse(field: Field) -> CoreError {
    CoreError::Internal(format!("flag field {field:?} used as a value filter"))
}

// ---------------------------------------------------------------------------
// Stacks and sorting
// ---------------------------------------------------------------------------

/// Expression yielding one stack label per row.
///
/// Multi-valued attributes are sorted bytewise and comma-joined; rows with
/// no value fall into the unknown stack.
pub fn stack_expr(source: EventSource, key: StackKey) -> Result<String, CoreError> {
    key.validate_for(source)?;
    let field = key
        .field_for(source)
        .ok_or_else(|| CoreError::Internal(format!("no stack field for {}", key.as_str())))?;
    let expr = match require_column(source, field)? {
        Column::Scalar(col) => format!("COALESCE(NULLIF({col}, ''), '{UNKNOWN_STACK}')"),
        column @ (Column::Array(_) | Column::JsonArray(_)) => format!(
            "COALESCE((SELECT string_agg(v, ',' ORDER BY v COLLATE \"C\") \
             FROM {} v WHERE v <> ''), '{UNKNOWN_STACK}')",
            elements(column).unwrap_or_default()
        ),
        Column::Flag(_) => return Err(flag_misuse(field)),
    };
    Ok(expr)
}

/// `ORDER BY` expression for a whitelisted drill-down column.
pub fn sort_expr(source: EventSource, column: &str) -> Result<&'static str, CoreError> {
    let expr = match (source, column) {
        (EventSource::PullRequest, "pr_created_at") => "r.pr_created_at",
        (EventSource::PullRequest, "pr_updated_at") => "r.pr_updated_at",
        (EventSource::PullRequest, "pr_merged_at") => "r.pr_merged_at",
        (EventSource::PullRequest, "pr_closed_at") => "r.pr_closed_at",
        (EventSource::PullRequest, "title") => "r.title COLLATE \"C\"",
        (EventSource::PullRequest, "project") => "r.project COLLATE \"C\"",
        (EventSource::PullRequest, "creator") => "r.creator COLLATE \"C\"",
        (EventSource::PullRequest, "lines_added") => "r.lines_added",
        (EventSource::PullRequest, "lines_deleted") => "r.lines_deleted",
        (EventSource::PullRequest, "lines_changed") => "(r.lines_added + r.lines_deleted)",
        (EventSource::PullRequest, "files_ct") => "r.files_ct",
        (EventSource::Commit, "created_at") => "r.created_at",
        (EventSource::Commit, "committed_at") => "r.committed_at",
        (EventSource::Commit, "commit_pushed_at") => "r.commit_pushed_at",
        (EventSource::Issue, "issue_created_at") => "r.issue_created_at",
        (EventSource::Issue, "issue_updated_at") => "r.issue_updated_at",
        (EventSource::Issue, "issue_resolved_at") => "r.issue_resolved_at",
        (EventSource::Issue, "released_in") => "r.released_in",
        (EventSource::Issue, "key") => "r.key COLLATE \"C\"",
        (EventSource::Issue, "priority") => "r.priority COLLATE \"C\"",
        (EventSource::JobRun, "start_time") => "r.start_time",
        (EventSource::JobRun, "end_time") => "r.end_time",
        (EventSource::JobRun, "duration") => "r.duration_secs",
        (EventSource::JobRun, "job_name") => "r.job_name COLLATE \"C\"",
        (EventSource::JobRun, "status") => "r.status COLLATE \"C\"",
        (EventSource::JobRun, "job_run_number") => "r.job_run_number",
        _ => {
            return Err(CoreError::Internal(format!(
                "column {column} is not sortable for {}",
                source.as_str()
            )))
        }
    };
    Ok(expr)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// `(day, stack, count)` rows grouped by period start and stack label.
pub fn count_query(
    predicate: &CompiledPredicate,
    granularity: Granularity,
    stack_by: Option<StackKey>,
) -> Result<QueryBuilder<'static, Postgres>, CoreError> {
    let ts = timestamp_column(predicate.timestamp_field);
    let stack = match stack_by {
        Some(key) => stack_expr(predicate.source, key)?,
        None => "NULL::TEXT".to_string(),
    };
    let mut qb = QueryBuilder::new(format!(
        "SELECT date_trunc('{}', {ts} AT TIME ZONE 'UTC')::DATE AS day, \
         {stack} AS stack, COUNT(*)::BIGINT AS count \
         FROM {} r",
        granularity.as_str(),
        table(predicate.source)
    ));
    push_where(&mut qb, predicate)?;
    qb.push(" GROUP BY 1, 2 ORDER BY 1, 2");
    Ok(qb)
}

/// Number of rows matching a predicate.
pub fn total_query(predicate: &CompiledPredicate) -> Result<QueryBuilder<'static, Postgres>, CoreError> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT COUNT(*)::BIGINT FROM {} r",
        table(predicate.source)
    ));
    push_where(&mut qb, predicate)?;
    Ok(qb)
}

/// One sorted page of rows; nulls sort last and ties break on id.
pub fn list_query(
    predicate: &CompiledPredicate,
    columns: &str,
    sort: ResolvedSort,
    limit: i64,
    offset: i64,
) -> Result<QueryBuilder<'static, Postgres>, CoreError> {
    let order = sort_expr(predicate.source, sort.column)?;
    let direction = if sort.descending { "DESC" } else { "ASC" };
    let mut qb = QueryBuilder::new(format!(
        "SELECT {columns} FROM {} r",
        table(predicate.source)
    ));
    push_where(&mut qb, predicate)?;
    qb.push(format!(" ORDER BY {order} {direction} NULLS LAST, r.id ASC LIMIT "))
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    Ok(qb)
}
