//! Aggregate audit
//!
//! Cross-checks the sums of exported rows against one dimension-less query
//! over the same window. Per metric:
//!
//! ```text
//! relative_difference = (detail - aggregate) / aggregate
//! ```
//!
//! With a zero aggregate the difference is `0` when detail is also zero and
//! undefined (`null`) otherwise.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use crate::builder::{AUDIT_METRICS, ReportQuery};
use crate::error::Result;
use crate::provider::ReportProvider;
use crate::row::{NormalizedRow, normalize};
use crate::window::DateWindow;

/// Relative differences above this are logged as warnings
const DRIFT_WARN_THRESHOLD: f64 = 0.01;

/// Running per-metric sums over emitted rows
#[derive(Debug, Clone, PartialEq)]
pub struct RunningTotals {
    sums: Vec<(&'static str, f64)>,
    rows: u64,
}

impl RunningTotals {
    /// Zeroed totals for `metrics`
    pub fn new(metrics: &[&'static str]) -> Self {
        Self {
            sums: metrics.iter().map(|m| (*m, 0.0)).collect(),
            rows: 0,
        }
    }

    /// Zeroed totals for the audited metrics
    pub fn audited() -> Self {
        Self::new(AUDIT_METRICS)
    }

    /// Add one emitted row; missing values count as zero
    pub fn add(&mut self, row: &NormalizedRow) {
        for (name, sum) in &mut self.sums {
            if let Some(value) = row.get(*name) {
                *sum += value.sum_value();
            }
        }
        self.rows += 1;
    }

    /// Sum for one metric
    pub fn get(&self, metric: &str) -> Option<f64> {
        self.sums.iter().find(|(n, _)| *n == metric).map(|(_, v)| *v)
    }

    /// Rows added so far
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        self.sums.iter().copied().collect()
    }
}

/// Reconciliation between row sums and the aggregate query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    pub detail_totals: BTreeMap<&'static str, f64>,
    pub aggregate_totals: BTreeMap<&'static str, f64>,
    /// `None` (serialized `null`) when undefined
    pub relative_difference: BTreeMap<&'static str, Option<f64>>,
}

impl AuditReport {
    /// Build a report from already-known aggregate values
    pub fn compare(detail: &RunningTotals, aggregate: &BTreeMap<&'static str, f64>) -> Self {
        let detail_totals = detail.to_map();
        let relative_difference = detail_totals
            .iter()
            .map(|(name, d)| {
                let a = aggregate.get(name).copied().unwrap_or(0.0);
                (*name, relative_difference(*d, a))
            })
            .collect();

        Self {
            detail_totals,
            aggregate_totals: aggregate.clone(),
            relative_difference,
        }
    }

    /// Largest defined absolute difference
    pub fn max_drift(&self) -> Option<f64> {
        self.relative_difference
            .values()
            .flatten()
            .map(|d| d.abs())
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))))
    }

    /// Metrics whose difference is undefined (zero aggregate, nonzero detail)
    pub fn undefined_metrics(&self) -> Vec<&'static str> {
        self.relative_difference
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| *k)
            .collect()
    }
}

/// `(detail - aggregate) / aggregate`, with the zero-aggregate rule
pub fn relative_difference(detail: f64, aggregate: f64) -> Option<f64> {
    if aggregate == 0.0 {
        if detail == 0.0 { Some(0.0) } else { None }
    } else {
        Some((detail - aggregate) / aggregate)
    }
}

/// Fetch aggregates for `window` and compare them with `detail`
///
/// Issues exactly one provider call. An empty response counts as all-zero
/// aggregates.
pub async fn audit(
    provider: &dyn ReportProvider,
    window: DateWindow,
    detail: &RunningTotals,
) -> Result<AuditReport> {
    let query = ReportQuery::aggregate(window);
    let page = provider.run_report(&query).await?;

    let aggregate: BTreeMap<&'static str, f64> = match page.rows.first() {
        Some(row) => {
            let decoded = normalize(row, &[], &query.metrics);
            query
                .metrics
                .iter()
                .map(|m| (*m, decoded.get(m).map(|v| v.sum_value()).unwrap_or(0.0)))
                .collect()
        }
        None => query.metrics.iter().map(|m| (*m, 0.0)).collect(),
    };

    let report = AuditReport::compare(detail, &aggregate);

    let undefined = report.undefined_metrics();
    match report.max_drift() {
        Some(drift) if drift > DRIFT_WARN_THRESHOLD => warn!(
            window = %window,
            provider = provider.name(),
            max_drift = drift,
            ?undefined,
            "audit: row sums diverge from aggregate"
        ),
        drift => info!(
            window = %window,
            provider = provider.name(),
            max_drift = ?drift,
            ?undefined,
            "audit complete"
        ),
    }

    Ok(report)
}
