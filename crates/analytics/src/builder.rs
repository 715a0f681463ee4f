//! Report query construction
//!
//! The dimension and metric lists are system constants, never taken from the
//! request. Rows come back as positional arrays, so decoding is only sound if
//! the names used to build the query are the names used to read the rows.

use serde::Serialize;

use crate::error::{AnalyticsError, Result};
use crate::window::DateWindow;

/// Largest page the provider accepts per call
pub const MAX_PAGE_SIZE: u32 = 100_000;

/// Breakdown dimensions for detail exports
pub const DETAIL_DIMENSIONS: &[&str] = &[
    "date",
    "country",
    "city",
    "deviceCategory",
    "pagePath",
    "sessionSource",
    "sessionMedium",
    "sessionCampaignName",
];

/// Metrics for detail exports
pub const DETAIL_METRICS: &[&str] = &[
    "activeUsers",
    "newUsers",
    "sessions",
    "screenPageViews",
    "engagementRate",
    "bounceRate",
    "averageSessionDuration",
    "conversions",
    "totalRevenue",
];

/// Summable metrics cross-checked against the aggregate query
pub const AUDIT_METRICS: &[&str] = &[
    "sessions",
    "activeUsers",
    "screenPageViews",
    "conversions",
    "totalRevenue",
];

/// A report request for one contiguous window
///
/// Only `offset` changes after construction; the paginator advances it as
/// pages arrive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportQuery {
    pub window: DateWindow,
    pub dimensions: Vec<&'static str>,
    pub metrics: Vec<&'static str>,
    /// Dimension names giving a total order over all rows
    pub sort_keys: Vec<&'static str>,
    pub page_size: u32,
    pub offset: u64,
}

impl ReportQuery {
    /// Detail query over the fixed dimension and metric sets
    ///
    /// Sorted on the full dimension tuple so that offsets address the same
    /// rows from one page fetch to the next.
    pub fn detail(window: DateWindow, page_size: u32) -> Result<Self> {
        QueryBuilder::new(window)
            .dimensions(DETAIL_DIMENSIONS)
            .metrics(DETAIL_METRICS)
            .sort_by_dimensions()
            .page_size(page_size)
            .build()
    }

    /// Dimension-less query returning one aggregate row for the audit metrics
    pub fn aggregate(window: DateWindow) -> Self {
        Self {
            window,
            dimensions: Vec::new(),
            metrics: AUDIT_METRICS.to_vec(),
            sort_keys: Vec::new(),
            page_size: 1,
            offset: 0,
        }
    }

    /// Advance past a batch that was just consumed
    pub fn advance(&mut self, batch_len: usize) {
        self.offset += batch_len as u64;
    }

    /// Copy of this query targeting another window, offset reset to zero
    pub fn for_window(&self, window: DateWindow) -> Self {
        Self {
            window,
            offset: 0,
            ..self.clone()
        }
    }
}

/// Builder for [`ReportQuery`]
pub struct QueryBuilder {
    window: DateWindow,
    dimensions: Vec<&'static str>,
    metrics: Vec<&'static str>,
    sort_keys: Vec<&'static str>,
    page_size: u32,
}

impl QueryBuilder {
    /// Start a query over a window
    pub fn new(window: DateWindow) -> Self {
        Self {
            window,
            dimensions: Vec::new(),
            metrics: Vec::new(),
            sort_keys: Vec::new(),
            page_size: MAX_PAGE_SIZE,
        }
    }

    /// Set breakdown dimensions
    pub fn dimensions(mut self, names: &[&'static str]) -> Self {
        self.dimensions = names.to_vec();
        self
    }

    /// Set metrics
    pub fn metrics(mut self, names: &[&'static str]) -> Self {
        self.metrics = names.to_vec();
        self
    }

    /// Sort on every dimension, in declaration order
    pub fn sort_by_dimensions(mut self) -> Self {
        self.sort_keys = self.dimensions.clone();
        self
    }

    /// Rows per page
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<ReportQuery> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(AnalyticsError::InvalidPageSize {
                size: self.page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        if self.metrics.is_empty() {
            return Err(AnalyticsError::InvalidQuery(
                "at least one metric is required".to_string(),
            ));
        }

        Ok(ReportQuery {
            window: self.window,
            dimensions: self.dimensions,
            metrics: self.metrics,
            sort_keys: self.sort_keys,
            page_size: self.page_size,
            offset: 0,
        })
    }
}
