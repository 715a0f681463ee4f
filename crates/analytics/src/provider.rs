//! Report provider trait
//!
//! The engine talks to the reporting backend only through [`ReportProvider`].
//! The GA4 Data API client lives in `dash-connectors`; tests use scripted
//! in-memory providers.

use async_trait::async_trait;

use crate::builder::ReportQuery;
use crate::error::ProviderError;

/// One result row as returned by the provider
///
/// Values are positionally aligned with the query's dimension and metric
/// lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub dimension_values: Vec<String>,
    pub metric_values: Vec<String>,
}

impl RawRow {
    pub fn new(dimension_values: Vec<String>, metric_values: Vec<String>) -> Self {
        Self {
            dimension_values,
            metric_values,
        }
    }
}

/// One page of a report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResult {
    pub rows: Vec<RawRow>,
    /// Total rows for the whole window, repeated on every page
    pub reported_total: Option<u64>,
}

/// Backend able to execute report queries
#[async_trait]
pub trait ReportProvider: Send + Sync {
    /// Execute one page of a report
    ///
    /// Honors `query.offset` and `query.page_size`. A dimension-less query
    /// returns at most one aggregate row.
    async fn run_report(&self, query: &ReportQuery) -> Result<PageResult, ProviderError>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
