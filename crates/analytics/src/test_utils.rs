//! Test utilities: an in-memory report provider
//!
//! [`FakeProvider`] serves a fixed dataset through the real
//! [`ReportProvider`] contract (offset, limit, date filtering, reported
//! totals, aggregate queries) so that engine and router tests exercise the
//! actual pagination code instead of mocking it.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::builder::{DETAIL_DIMENSIONS, DETAIL_METRICS, ReportQuery};
use crate::error::ProviderError;
use crate::provider::{PageResult, RawRow, ReportProvider};

/// How the fake reports `rowCount`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedTotal {
    /// Number of rows matching the window
    Actual,
    /// Always this value
    Fixed(u64),
    /// Never reported
    Absent,
}

/// Scripted in-memory provider
pub struct FakeProvider {
    rows: Vec<RawRow>,
    reported_total: ReportedTotal,
    endless: bool,
    aggregate: Option<Vec<String>>,
    fail_on_call: Option<usize>,
    calls: Mutex<Vec<ReportQuery>>,
}

impl FakeProvider {
    /// Serve `rows`, filtered by the date in the first dimension
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self {
            rows,
            reported_total: ReportedTotal::Actual,
            endless: false,
            aggregate: None,
            fail_on_call: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Provider that always answers with full pages and no total
    pub fn endless() -> Self {
        Self {
            endless: true,
            reported_total: ReportedTotal::Absent,
            ..Self::new(Vec::new())
        }
    }

    pub fn with_reported_total(mut self, total: ReportedTotal) -> Self {
        self.reported_total = total;
        self
    }

    /// Override the aggregate row (positional, audit metric order)
    ///
    /// An empty vector makes the aggregate query return no rows.
    pub fn with_aggregate(mut self, values: &[&str]) -> Self {
        self.aggregate = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    /// Fail the n-th call (1-based) with an upstream error
    pub fn failing_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    /// Every query received, in order
    pub fn calls(&self) -> Vec<ReportQuery> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Detail (dimensioned) queries received
    pub fn detail_calls(&self) -> Vec<ReportQuery> {
        self.calls()
            .into_iter()
            .filter(|q| !q.dimensions.is_empty())
            .collect()
    }

    /// Aggregate (dimension-less) queries received
    pub fn aggregate_calls(&self) -> Vec<ReportQuery> {
        self.calls()
            .into_iter()
            .filter(|q| q.dimensions.is_empty())
            .collect()
    }

    fn matching(&self, query: &ReportQuery) -> Vec<&RawRow> {
        self.rows
            .iter()
            .filter(|row| {
                row.dimension_values
                    .first()
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                    .is_some_and(|d| d >= query.window.start && d <= query.window.end)
            })
            .collect()
    }

    fn total(&self, actual: usize) -> Option<u64> {
        match self.reported_total {
            ReportedTotal::Actual => Some(actual as u64),
            ReportedTotal::Fixed(n) => Some(n),
            ReportedTotal::Absent => None,
        }
    }

    fn aggregate_page(&self, query: &ReportQuery) -> PageResult {
        let values = match &self.aggregate {
            Some(values) if values.is_empty() => {
                return PageResult {
                    rows: Vec::new(),
                    reported_total: Some(0),
                };
            }
            Some(values) => values.clone(),
            None => {
                let matching = self.matching(query);
                query
                    .metrics
                    .iter()
                    .map(|metric| {
                        let Some(pos) = DETAIL_METRICS.iter().position(|m| m == metric) else {
                            return "0".to_string();
                        };
                        let sum: f64 = matching
                            .iter()
                            .filter_map(|r| r.metric_values.get(pos))
                            .filter_map(|v| v.parse::<f64>().ok())
                            .sum();
                        sum.to_string()
                    })
                    .collect()
            }
        };

        PageResult {
            rows: vec![RawRow::new(Vec::new(), values)],
            reported_total: Some(1),
        }
    }
}

#[async_trait]
impl ReportProvider for FakeProvider {
    async fn run_report(&self, query: &ReportQuery) -> Result<PageResult, ProviderError> {
        let call = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| ProviderError::Http("fake provider poisoned".to_string()))?;
            calls.push(query.clone());
            calls.len()
        };

        if self.fail_on_call == Some(call) {
            return Err(ProviderError::Status {
                status: 503,
                message: format!("scripted failure on call {}", call),
            });
        }

        if query.dimensions.is_empty() {
            return Ok(self.aggregate_page(query));
        }

        if self.endless {
            let rows = (0..query.page_size as u64)
                .map(|i| {
                    let path = format!("/p/{}", query.offset + i);
                    sample_row(query.window.start, &path, 1)
                })
                .collect();
            return Ok(PageResult {
                rows,
                reported_total: self.total(0),
            });
        }

        let matching = self.matching(query);
        let rows = matching
            .iter()
            .skip(query.offset as usize)
            .take(query.page_size as usize)
            .map(|r| (*r).clone())
            .collect();

        Ok(PageResult {
            rows,
            reported_total: self.total(matching.len()),
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// A detail row for `date` and `path` with every metric set to `sessions`
///
/// Dimension values follow [`DETAIL_DIMENSIONS`], metric values follow
/// [`DETAIL_METRICS`].
pub fn sample_row(date: NaiveDate, path: &str, sessions: u64) -> RawRow {
    let mut dims: Vec<String> = DETAIL_DIMENSIONS.iter().map(|_| String::new()).collect();
    dims[0] = date.format("%Y-%m-%d").to_string();
    dims[1] = "US".to_string();
    dims[4] = path.to_string();

    let mets = DETAIL_METRICS.iter().map(|_| sessions.to_string()).collect();
    RawRow::new(dims, mets)
}

/// `per_day` rows for every day in `[start, end]`, one session each
pub fn daily_rows(start: NaiveDate, end: NaiveDate, per_day: usize) -> Vec<RawRow> {
    start
        .iter_days()
        .take_while(|d| *d <= end)
        .flat_map(|d| (0..per_day).map(move |i| sample_row(d, &format!("/page/{}", i), 1)))
        .collect()
}
