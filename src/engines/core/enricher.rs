// Row Enricher: concurrently populates skeleton rows with cost, drift, and
// recommendations, bounded by a semaphore of 10 permits.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{debug, warn};

use crate::engines::core::forecast::calculate_drift;
use crate::engines::core::plugin::{with_deadline, Plugin};
use crate::engines::shared::models::{
    ActualCostData, DateRange, OverviewRow, OverviewRowError, ProjectedCostData, ResourceStatus,
};

#[derive(Debug, Clone)]
pub struct EnrichProgress {
    pub row_index: usize,
    pub urn: String,
}

pub struct EnrichOptions {
    pub per_resource_timeout_ms: u64,
    pub day_of_month: u32,
    pub days_in_month: u32,
    pub actual_period: DateRange,
    pub concurrency_limit: usize,
}

/// Concurrently enriches every row. Cancellation is checked before each
/// suspension point; a pre-signaled cancellation leaves every row untouched.
/// The progress channel, when given, is closed exactly once by this function
/// after every worker has completed — never by a detached task.
pub async fn enrich_rows(
    rows: Vec<OverviewRow>,
    plugins: Vec<Arc<dyn Plugin>>,
    options: Arc<EnrichOptions>,
    mut cancel: watch::Receiver<bool>,
    progress: Option<mpsc::UnboundedSender<EnrichProgress>>,
) -> Vec<OverviewRow> {
    let semaphore = Arc::new(Semaphore::new(options.concurrency_limit.max(1)));
    let mut handles = Vec::with_capacity(rows.len());

    for (index, row) in rows.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let plugins = plugins.clone();
        let options = options.clone();
        let mut cancel = cancel.clone();
        let progress = progress.clone();

        handles.push(tokio::spawn(async move {
            let permit = tokio::select! {
                permit = semaphore.acquire_owned() => permit.ok(),
                _ = cancel.changed() => None,
            };
            let Some(_permit) = permit else {
                return row;
            };
            if *cancel.borrow() {
                return row;
            }

            let enriched = enrich_one(row, &plugins, &options).await;

            if let Some(sender) = &progress {
                let _ = sender.send(EnrichProgress { row_index: index, urn: enriched.urn.clone() });
            }
            enriched
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(row) => results.push(row),
            Err(e) => warn!(error = %e, "enrichment task panicked"),
        }
    }
    drop(progress);
    results
}

async fn enrich_one(mut row: OverviewRow, plugins: &[Arc<dyn Plugin>], options: &EnrichOptions) -> OverviewRow {
    let descriptor = row.descriptor();
    if let Err(e) = descriptor.validate() {
        row.error = Some(OverviewRowError::new(e.to_string()));
        return row;
    }

    let mut actual: Option<ActualCostData> = None;
    if !matches!(row.status, ResourceStatus::Creating) {
        for plugin in plugins {
            let call = with_deadline(plugin.name(), options.per_resource_timeout_ms, plugin.get_actual_cost(&[descriptor.clone()], options.actual_period));
            match call.await {
                Ok(results) => {
                    if let Some(r) = results.into_iter().next() {
                        actual = Some(ActualCostData {
                            mtd_cost: r.total_cost,
                            currency: r.currency,
                            period: options.actual_period,
                            breakdown: r.breakdown,
                        });
                        break;
                    }
                }
                Err(e) => {
                    debug!(plugin = plugin.name(), error = %e, "actual cost call failed");
                    row.error = Some(OverviewRowError::new(e.to_string()));
                }
            }
        }
    }

    let mut projected: Option<ProjectedCostData> = None;
    for plugin in plugins {
        let call = with_deadline(plugin.name(), options.per_resource_timeout_ms, plugin.get_projected_cost(&[descriptor.clone()]));
        match call.await {
            Ok(results) => {
                if let Some(r) = results.into_iter().next() {
                    projected = Some(ProjectedCostData { monthly_cost: r.monthly, currency: r.currency, breakdown: r.breakdown });
                    break;
                }
            }
            Err(e) => {
                debug!(plugin = plugin.name(), error = %e, "projected cost call failed");
                // Actual-cost failures win if both are set (checked after this loop).
                if row.error.is_none() {
                    row.error = Some(OverviewRowError::new(e.to_string()));
                }
            }
        }
    }

    for plugin in plugins {
        let call = with_deadline(plugin.name(), options.per_resource_timeout_ms, plugin.get_recommendations(&[descriptor.clone()], &[]));
        if let Ok(recs) = call.await {
            if !recs.is_empty() {
                row.recommendations = recs;
                break;
            }
        }
    }

    if let (Some(a), Some(p)) = (&actual, &projected) {
        if let Ok(Some(drift)) = calculate_drift(a.mtd_cost, p.monthly_cost, options.day_of_month, options.days_in_month, options.actual_period) {
            row.cost_drift = Some(drift);
        }
    }

    row.actual_cost = actual;
    row.projected_cost = projected;
    row
}

/// The day-of-month / days-in-month pair derived from a reference instant,
/// used as the "now" for drift calculation (the query's `date_range.end`).
pub fn calendar_fields(reference: chrono::DateTime<Utc>) -> (u32, u32) {
    let day = reference.day();
    let year = reference.year();
    let month = reference.month();
    let days_in_month = days_in_month(year, month);
    (day, days_in_month)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let first_of_next = chrono::NaiveDate::from_ymd_opt(next_year, next_month, 1).unwrap();
    let first_of_this = chrono::NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    (first_of_next - first_of_this).num_days() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::core::plugin::UsageProfile;
    use crate::engines::shared::error_model::Result;
    use crate::engines::shared::models::{Budget, CostResult, CostResultBuilder, Recommendation, ResourceDescriptor};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;

    struct FixturePlugin;

    #[async_trait]
    impl Plugin for FixturePlugin {
        fn name(&self) -> &str {
            "fixture"
        }
        async fn get_projected_cost(&self, descriptors: &[ResourceDescriptor]) -> Result<Vec<CostResult>> {
            Ok(descriptors
                .iter()
                .map(|d| CostResultBuilder::new(d.resource_type.clone(), d.id.clone()).adapter("fixture").monthly(300.0).build())
                .collect())
        }
        async fn get_actual_cost(&self, descriptors: &[ResourceDescriptor], _period: DateRange) -> Result<Vec<CostResult>> {
            Ok(descriptors
                .iter()
                .map(|d| CostResultBuilder::new(d.resource_type.clone(), d.id.clone()).adapter("fixture").monthly(100.0).build())
                .collect())
        }
        async fn get_recommendations(&self, _d: &[ResourceDescriptor], _e: &[String]) -> Result<Vec<Recommendation>> {
            Ok(vec![])
        }
        async fn get_budgets(&self) -> Result<Vec<Budget>> {
            Ok(vec![])
        }
        async fn estimate_cost(
            &self,
            _d: &ResourceDescriptor,
            _o: &HashMap<String, String>,
            _u: &UsageProfile,
        ) -> Result<CostResult> {
            unimplemented!()
        }
    }

    fn options() -> Arc<EnrichOptions> {
        let end = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Arc::new(EnrichOptions {
            per_resource_timeout_ms: 5000,
            day_of_month: 15,
            days_in_month: 30,
            actual_period: DateRange::new(start, end).unwrap(),
            concurrency_limit: crate::engines::shared::models::OVERVIEW_CONCURRENCY_LIMIT,
        })
    }

    #[tokio::test]
    async fn enriches_active_row_with_cost_and_drift() {
        let row = OverviewRow::skeleton("urn:1", "aws:ec2:instance", ResourceStatus::Active);
        let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(FixturePlugin)];
        let (_tx, rx) = watch::channel(false);
        let results = enrich_rows(vec![row], plugins, options(), rx, None).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].actual_cost.is_some());
        assert!(results[0].projected_cost.is_some());
    }

    #[tokio::test]
    async fn creating_rows_skip_actual_cost_fetch() {
        let row = OverviewRow::skeleton("urn:new", "aws:ec2:instance", ResourceStatus::Creating);
        let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(FixturePlugin)];
        let (_tx, rx) = watch::channel(false);
        let results = enrich_rows(vec![row], plugins, options(), rx, None).await;
        assert!(results[0].actual_cost.is_none());
        assert!(results[0].projected_cost.is_some());
    }

    #[tokio::test]
    async fn pre_signaled_cancellation_leaves_rows_untouched() {
        let row = OverviewRow::skeleton("urn:1", "aws:ec2:instance", ResourceStatus::Active);
        let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(FixturePlugin)];
        let (_tx, rx) = watch::channel(true);
        let results = enrich_rows(vec![row], plugins, options(), rx, None).await;
        assert!(results[0].actual_cost.is_none());
        assert!(results[0].projected_cost.is_none());
    }

    #[tokio::test]
    async fn zero_concurrency_limit_clamps_to_one_and_still_completes() {
        let rows = vec![
            OverviewRow::skeleton("urn:1", "aws:ec2:instance", ResourceStatus::Active),
            OverviewRow::skeleton("urn:2", "aws:ec2:instance", ResourceStatus::Active),
        ];
        let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(FixturePlugin)];
        let (_tx, rx) = watch::channel(false);
        let end = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let opts = Arc::new(EnrichOptions {
            per_resource_timeout_ms: 5000,
            day_of_month: 15,
            days_in_month: 30,
            actual_period: DateRange::new(start, end).unwrap(),
            concurrency_limit: 0,
        });
        let results = enrich_rows(rows, plugins, opts, rx, None).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.actual_cost.is_some()));
    }

    #[test]
    fn days_in_month_handles_december_wraparound() {
        assert_eq!(days_in_month(2026, 12), 31);
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2025, 2), 28);
    }
}
