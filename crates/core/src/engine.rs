//! DORA engine: compile once, aggregate, band, drill down.
//!
//! Every call builds one [`CompiledPredicate`] per filter spec and hands the
//! same `Arc` to both the aggregation and the drill-down path, so the two
//! always see identical conditions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::band::{rate_change_failure_rate, rate_deployment_frequency, BandResult};
use crate::bucketing::{build_time_series, Granularity, StackKey, TimeSeries};
use crate::criteria;
use crate::drilldown::{DrillDownPage, DrillDownRequest};
use crate::error::CoreError;
use crate::filter::{self, CompiledPredicate};
use crate::profile::{Metric, SpecRole, VelocityProfile};
use crate::request::{OuScope, RequestFilter};
use crate::source::SourceRegistry;

/// Time series plus banding for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoraResponse {
    pub time_series: TimeSeries,
    pub stats: BandResult,
}

/// Build the predicate for one of a metric's filter specs.
///
/// Resolves the route/criteria rule first so unsupported pairings fail
/// before any filter is compiled, then conjoins the rule's conditions.
pub fn build_predicate(
    metric: Metric,
    role: SpecRole,
    profile: &VelocityProfile,
    request: &RequestFilter,
    ou: Option<&OuScope>,
) -> Result<Arc<CompiledPredicate>, CoreError> {
    let config = profile.metric_config(metric)?;
    let spec = config.spec(role).ok_or_else(|| {
        CoreError::Validation(format!(
            "profile {} has no failed filter for {}",
            profile.id,
            metric.as_str()
        ))
    })?;

    let resolved = criteria::resolve(metric, spec)?;
    let predicate = filter::compile(spec, &config.integration_ids, request, ou)?
        .conjoin(resolved.conditions());

    Ok(Arc::new(predicate))
}

/// Stateless engine over a registry of source adapters.
#[derive(Clone)]
pub struct DoraEngine {
    sources: SourceRegistry,
}

impl DoraEngine {
    pub fn new(sources: SourceRegistry) -> Self {
        Self { sources }
    }

    /// Dense day/week/month series for a predicate, from one per-day grouped pass.
    pub async fn aggregate(
        &self,
        predicate: &CompiledPredicate,
        stack_by: Option<StackKey>,
    ) -> Result<TimeSeries, CoreError> {
        if let Some(key) = stack_by {
            key.validate_for(predicate.source)?;
        }
        let adapter = self.sources.get(predicate.source)?;
        let rows = adapter.count(predicate, Granularity::Day, stack_by).await?;
        Ok(build_time_series(
            &predicate.time_range,
            rows,
            stack_by.is_some(),
        ))
    }

    /// Page of records matching a predicate.
    pub async fn list(
        &self,
        predicate: &CompiledPredicate,
        request: &DrillDownRequest,
    ) -> Result<DrillDownPage, CoreError> {
        self.sources.get(predicate.source)?.list(predicate, request).await
    }

    pub async fn deployment_frequency(
        &self,
        profile: &VelocityProfile,
        request: &RequestFilter,
        ou: Option<&OuScope>,
    ) -> Result<DoraResponse, CoreError> {
        let metric = Metric::DeploymentFrequency;
        let predicate = build_predicate(metric, SpecRole::Total, profile, request, ou)?;
        self.deployment_frequency_with(profile, &predicate, request.stack_by)
            .await
    }

    async fn deployment_frequency_with(
        &self,
        profile: &VelocityProfile,
        predicate: &CompiledPredicate,
        stack_by: Option<StackKey>,
    ) -> Result<DoraResponse, CoreError> {
        let config = profile.metric_config(Metric::DeploymentFrequency)?;
        let time_series = self.aggregate(predicate, stack_by).await?;
        let stats = rate_deployment_frequency(
            time_series.total(),
            &predicate.time_range,
            config.thresholds.as_ref(),
            config.absolute_thresholds.as_ref(),
            config.is_absolute,
        );
        tracing::info!(
            profile_id = profile.id,
            total = stats.total_deployment,
            band = ?stats.band,
            "Computed deployment frequency"
        );
        Ok(DoraResponse { time_series, stats })
    }

    /// Change failure rate. The series shows failed deployments; the total
    /// spec is only aggregated when the profile is not in absolute mode.
    pub async fn change_failure_rate(
        &self,
        profile: &VelocityProfile,
        request: &RequestFilter,
        ou: Option<&OuScope>,
    ) -> Result<DoraResponse, CoreError> {
        let metric = Metric::ChangeFailureRate;
        let failed = build_predicate(metric, SpecRole::Failed, profile, request, ou)?;
        self.change_failure_rate_with(profile, &failed, request, ou)
            .await
    }

    async fn change_failure_rate_with(
        &self,
        profile: &VelocityProfile,
        failed: &CompiledPredicate,
        request: &RequestFilter,
        ou: Option<&OuScope>,
    ) -> Result<DoraResponse, CoreError> {
        let metric = Metric::ChangeFailureRate;
        let config = profile.metric_config(metric)?;

        let (time_series, total) = if config.is_absolute {
            (self.aggregate(failed, request.stack_by).await?, 0)
        } else {
            let total = build_predicate(metric, SpecRole::Total, profile, request, ou)?;
            let (series, totals) = tokio::try_join!(
                self.aggregate(failed, request.stack_by),
                self.aggregate(&total, None),
            )?;
            (series, totals.total())
        };

        let stats = rate_change_failure_rate(
            time_series.total(),
            total,
            config.thresholds.as_ref(),
            config.absolute_thresholds.as_ref(),
            config.is_absolute,
        );
        tracing::info!(
            profile_id = profile.id,
            failed = time_series.total(),
            total,
            band = ?stats.band,
            "Computed change failure rate"
        );
        Ok(DoraResponse { time_series, stats })
    }

    /// Drill-down for one of a metric's filter specs.
    pub async fn drill_down(
        &self,
        metric: Metric,
        role: SpecRole,
        profile: &VelocityProfile,
        request: &RequestFilter,
        ou: Option<&OuScope>,
        page: &DrillDownRequest,
    ) -> Result<DrillDownPage, CoreError> {
        let predicate = build_predicate(metric, role, profile, request, ou)?;
        self.list(&predicate, page).await
    }

    /// Aggregate and drill down concurrently over one shared predicate.
    ///
    /// For change failure rate the drill-down lists the failed deployments,
    /// which is the set the returned series counts.
    pub async fn report_with_drill_down(
        &self,
        metric: Metric,
        profile: &VelocityProfile,
        request: &RequestFilter,
        ou: Option<&OuScope>,
        page: &DrillDownRequest,
    ) -> Result<(DoraResponse, DrillDownPage), CoreError> {
        match metric {
            Metric::DeploymentFrequency => {
                let predicate = build_predicate(metric, SpecRole::Total, profile, request, ou)?;
                let (report, listing) = tokio::join!(
                    self.deployment_frequency_with(profile, &predicate, request.stack_by),
                    self.list(&predicate, page),
                );
                Ok((report?, listing?))
            }
            Metric::ChangeFailureRate => {
                let predicate = build_predicate(metric, SpecRole::Failed, profile, request, ou)?;
                let (report, listing) = tokio::join!(
                    self.change_failure_rate_with(profile, &predicate, request, ou),
                    self.list(&predicate, page),
                );
                Ok((report?, listing?))
            }
            Metric::LeadTimeForChange | Metric::MeanTimeToRestore => {
                // Surfaces the resolver's error for the configured spec.
                build_predicate(metric, SpecRole::Total, profile, request, ou)?;
                Err(CoreError::UnsupportedCriteria(format!(
                    "{} has no deployment report",
                    metric.as_str()
                )))
            }
        }
    }
}
