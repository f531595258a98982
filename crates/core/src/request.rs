//! Per-call request filter and organisational-unit scope.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bucketing::StackKey;
use crate::profile::{FilterValue, PartialMatch};
use crate::types::{DbId, TimeRange};

/// Ad-hoc filters merged on top of a profile's filter spec.
///
/// Every condition here is AND-ed with the profile, so a request can only
/// narrow the set of events a profile selects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFilter {
    pub time_range: TimeRange,
    #[serde(default)]
    pub integration_ids: Vec<String>,
    #[serde(default)]
    pub job_names: Vec<String>,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub stage_names: Vec<String>,
    #[serde(default)]
    pub step_names: Vec<String>,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterValue>,
    #[serde(default)]
    pub exclude_filters: BTreeMap<String, FilterValue>,
    #[serde(default)]
    pub partial_match_filters: BTreeMap<String, PartialMatch>,
    #[serde(default)]
    pub stack_by: Option<StackKey>,
}

impl RequestFilter {
    pub fn new(time_range: TimeRange) -> Self {
        Self {
            time_range,
            integration_ids: Vec::new(),
            job_names: Vec::new(),
            branches: Vec::new(),
            stage_names: Vec::new(),
            step_names: Vec::new(),
            filters: BTreeMap::new(),
            exclude_filters: BTreeMap::new(),
            partial_match_filters: BTreeMap::new(),
            stack_by: None,
        }
    }
}

/// Organisational-unit scope resolved by the caller.
///
/// Dynamic membership arrives already expanded into user ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OuScope {
    pub ou_ref_id: DbId,
    #[serde(default)]
    pub integration_ids: Vec<String>,
    #[serde(default)]
    pub static_user_ids: Vec<String>,
    #[serde(default)]
    pub dynamic_user_ids: Vec<String>,
}
