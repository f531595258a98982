//! Drill-down paging and sort resolution.
//!
//! Drill-down lists the records behind an aggregate using the very same
//! compiled predicate, so its `total_count` equals the aggregate total.

use serde::{Deserialize, Serialize};

use crate::event::EventRecord;
use crate::profile::{CalculationField, EventSource};

// ---------------------------------------------------------------------------
// Pagination defaults
// ---------------------------------------------------------------------------

/// Default number of records per drill-down page.
pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Maximum number of records per drill-down page.
pub const MAX_PAGE_SIZE: i64 = 1000;

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

const PR_SORT_COLUMNS: &[&str] = &[
    "pr_updated_at",
    "pr_merged_at",
    "pr_created_at",
    "pr_closed_at",
    "title",
    "project",
    "creator",
    "lines_added",
    "lines_deleted",
    "lines_changed",
    "files_ct",
];

const COMMIT_SORT_COLUMNS: &[&str] = &["created_at", "committed_at", "commit_pushed_at"];

const ISSUE_SORT_COLUMNS: &[&str] = &[
    "issue_created_at",
    "issue_updated_at",
    "issue_resolved_at",
    "released_in",
    "key",
    "priority",
];

const JOB_RUN_SORT_COLUMNS: &[&str] = &[
    "start_time",
    "end_time",
    "duration",
    "job_name",
    "status",
    "job_run_number",
];

/// Columns a drill-down may be ordered by.
pub fn sortable_columns(source: EventSource) -> &'static [&'static str] {
    match source {
        EventSource::PullRequest => PR_SORT_COLUMNS,
        EventSource::Commit => COMMIT_SORT_COLUMNS,
        EventSource::Issue => ISSUE_SORT_COLUMNS,
        EventSource::JobRun => JOB_RUN_SORT_COLUMNS,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Requested ordering. Unknown columns fall back to the calculation field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Whitelisted column and direction a source will actually order by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSort {
    pub column: &'static str,
    pub descending: bool,
}

/// Resolve a requested sort against the source whitelist.
///
/// The default is the calculation field, ascending.
pub fn resolve_sort(
    source: EventSource,
    calculation_field: CalculationField,
    requested: Option<&SortSpec>,
) -> ResolvedSort {
    let columns = sortable_columns(source);
    if let Some(sort) = requested {
        if let Some(column) = columns.iter().copied().find(|c| *c == sort.field) {
            return ResolvedSort {
                column,
                descending: sort.direction == SortDirection::Desc,
            };
        }
        tracing::debug!(field = %sort.field, "Ignoring non-sortable drill-down column");
    }
    ResolvedSort {
        column: columns
            .iter()
            .find(|c| **c == calculation_field.as_str())
            .copied()
            .unwrap_or(columns[0]),
        descending: false,
    }
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

/// Drill-down page request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrillDownRequest {
    #[serde(default)]
    pub sort: Option<SortSpec>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

impl DrillDownRequest {
    /// Zero-based page number.
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(0).max(0)
    }

    pub fn page_size(&self) -> i64 {
        clamp_page_size(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        self.page().saturating_mul(self.page_size())
    }
}

/// Clamp a requested page size to `[1, MAX_PAGE_SIZE]`, defaulting to `DEFAULT_PAGE_SIZE`.
pub fn clamp_page_size(page_size: Option<i64>) -> i64 {
    page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// One page of matching records; `total_count` covers the whole filtered set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillDownPage {
    pub records: Vec<EventRecord>,
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Sort and page an already-filtered record set in memory.
pub fn paginate(
    mut records: Vec<EventRecord>,
    sort: ResolvedSort,
    request: &DrillDownRequest,
) -> DrillDownPage {
    records.sort_by(|a, b| {
        a.sort_value(sort.column)
            .compare(&b.sort_value(sort.column), sort.descending)
            .then_with(|| a.id().cmp(&b.id()))
    });
    let total_count = records.len() as i64;
    let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
    let page_size = request.page_size();
    let records = records
        .into_iter()
        .skip(offset)
        .take(page_size as usize)
        .collect();
    DrillDownPage {
        records,
        total_count,
        page: request.page(),
        page_size,
    }
}
