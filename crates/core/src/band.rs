//! Band/rating calculation for DORA aggregates.
//!
//! Bands are always derived from the single top-level aggregate of a
//! request, never from individual buckets or stacks.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::TimeRange;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Deployments per day at or above which deployment frequency is ELITE.
pub const DF_ELITE_PER_DAY: f64 = 1.0;

/// Deployments per day at or above which deployment frequency is HIGH (weekly).
pub const DF_HIGH_PER_DAY: f64 = 1.0 / 7.0;

/// Deployments per day at or above which deployment frequency is MEDIUM (monthly).
pub const DF_MEDIUM_PER_DAY: f64 = 1.0 / 30.0;

/// Failure-rate percentage at or below which change failure rate is ELITE.
pub const CFR_ELITE_PCT: f64 = 15.0;

/// Failure-rate percentage at or below which change failure rate is HIGH.
pub const CFR_HIGH_PCT: f64 = 30.0;

/// Failure-rate percentage at or below which change failure rate is MEDIUM.
pub const CFR_MEDIUM_PCT: f64 = 45.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Qualitative performance tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Band {
    Low,
    Medium,
    High,
    Elite,
}

/// Whether a larger metric value is a better outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// Cut-off values for ELITE, HIGH and MEDIUM; anything else is LOW.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandThresholds {
    pub elite: f64,
    pub high: f64,
    pub medium: f64,
}

impl BandThresholds {
    pub fn default_deployment_frequency() -> Self {
        Self {
            elite: DF_ELITE_PER_DAY,
            high: DF_HIGH_PER_DAY,
            medium: DF_MEDIUM_PER_DAY,
        }
    }

    pub fn default_change_failure_rate() -> Self {
        Self {
            elite: CFR_ELITE_PCT,
            high: CFR_HIGH_PCT,
            medium: CFR_MEDIUM_PCT,
        }
    }
}

/// Banding outcome reported alongside a time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandResult {
    pub band: Option<Band>,
    /// Failed/total as a percentage; `None` in absolute mode or without deployments.
    pub failure_rate: Option<f64>,
    pub total_deployment: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_failed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_per_day: Option<f64>,
    pub is_absolute: bool,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Thresholds must be finite, non-negative, and ordered for their direction.
pub fn validate_thresholds(
    thresholds: &BandThresholds,
    direction: Direction,
    name: &str,
) -> Result<(), CoreError> {
    let BandThresholds { elite, high, medium } = *thresholds;
    for (label, value) in [("elite", elite), ("high", high), ("medium", medium)] {
        if !value.is_finite() || value < 0.0 {
            return Err(CoreError::Validation(format!(
                "{name}.{label} must be a non-negative number, got {value}"
            )));
        }
    }
    let ordered = match direction {
        Direction::HigherIsBetter => elite >= high && high >= medium,
        Direction::LowerIsBetter => elite <= high && high <= medium,
    };
    if !ordered {
        return Err(CoreError::Validation(format!(
            "{name} must be ordered elite, high, medium for this metric"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rating
// ---------------------------------------------------------------------------

/// Map a value onto a band.
pub fn rate(value: f64, thresholds: &BandThresholds, direction: Direction) -> Band {
    let reaches = |limit: f64| match direction {
        Direction::HigherIsBetter => value >= limit,
        Direction::LowerIsBetter => value <= limit,
    };
    if reaches(thresholds.elite) {
        Band::Elite
    } else if reaches(thresholds.high) {
        Band::High
    } else if reaches(thresholds.medium) {
        Band::Medium
    } else {
        Band::Low
    }
}

/// Deployment frequency: per-day average over the whole range.
///
/// In absolute mode the band comes from count thresholds over the raw total,
/// or is `None` when none are configured.
pub fn rate_deployment_frequency(
    total: i64,
    range: &TimeRange,
    thresholds: Option<&BandThresholds>,
    absolute_thresholds: Option<&BandThresholds>,
    is_absolute: bool,
) -> BandResult {
    let per_day = total as f64 / range.days() as f64;
    let band = if is_absolute {
        absolute_thresholds.map(|t| rate(total as f64, t, Direction::HigherIsBetter))
    } else {
        let defaults = BandThresholds::default_deployment_frequency();
        Some(rate(
            per_day,
            thresholds.unwrap_or(&defaults),
            Direction::HigherIsBetter,
        ))
    };

    BandResult {
        band,
        failure_rate: None,
        total_deployment: total,
        total_failed: None,
        count_per_day: Some(per_day),
        is_absolute,
    }
}

/// Change failure rate: `failed * 100 / total`.
///
/// With no deployments there is no rate and no band. In absolute mode the
/// total is not consulted: `total_deployment` reports the failed count and
/// the band comes from count thresholds over it when configured.
pub fn rate_change_failure_rate(
    failed: i64,
    total: i64,
    thresholds: Option<&BandThresholds>,
    absolute_thresholds: Option<&BandThresholds>,
    is_absolute: bool,
) -> BandResult {
    if is_absolute {
        return BandResult {
            band: absolute_thresholds.map(|t| rate(failed as f64, t, Direction::LowerIsBetter)),
            failure_rate: None,
            total_deployment: failed,
            total_failed: Some(failed),
            count_per_day: None,
            is_absolute,
        };
    }

    if total <= 0 {
        return BandResult {
            band: None,
            failure_rate: None,
            total_deployment: 0,
            total_failed: Some(failed),
            count_per_day: None,
            is_absolute,
        };
    }

    let failure_rate = failed as f64 * 100.0 / total as f64;
    let defaults = BandThresholds::default_change_failure_rate();
    BandResult {
        band: Some(rate(
            failure_rate,
            thresholds.unwrap_or(&defaults),
            Direction::LowerIsBetter,
        )),
        failure_rate: Some(failure_rate),
        total_deployment: total,
        total_failed: Some(failed),
        count_per_day: None,
        is_absolute,
    }
}
