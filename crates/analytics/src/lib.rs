//! Dash Analytics export engine
//!
//! Paginated report exports with an aggregate audit.
//!
//! # Overview
//!
//! - **Window**: date ranges, clamping to `[floor, yesterday]`, month split
//! - **Query Builder**: fixed dimension and metric sets, stable sort order
//! - **Paginator**: offset pagination with exhaustion, total and page-cap stops
//! - **Row Normalizer**: positional decoding, numeric metrics with `null` for
//!   unparseable values
//! - **Auditor**: one dimension-less query cross-checking the row sums
//! - **Emitters**: buffered results or an incrementally streamed JSON body
//!
//! The reporting backend is abstracted behind [`ReportProvider`].
//!
//! # Usage
//!
//! ```ignore
//! use dash_analytics::{DateWindow, ExportPlan, Exporter};
//!
//! let window = DateWindow::clamped("2024-01-15", "2024-03-10", floor, today)?;
//! let exporter = Exporter::new(provider);
//!
//! // Whole range as one window
//! let result = exporter.buffered(&ExportPlan::single(window)).await?;
//!
//! // One window per month, streamed
//! let stream = exporter.stream(ExportPlan::monthly(window)).await?;
//! ```

pub mod audit;
pub mod builder;
pub mod emit;
pub mod error;
pub mod export;
pub mod paginate;
pub mod provider;
pub mod row;
pub mod window;

/// In-memory provider for engine and router tests
pub mod test_utils;

#[cfg(test)]
mod builder_test;
#[cfg(test)]
mod export_test;

// Re-exports for convenience
pub use audit::{AuditReport, RunningTotals, relative_difference};
pub use builder::{
    AUDIT_METRICS, DETAIL_DIMENSIONS, DETAIL_METRICS, MAX_PAGE_SIZE, QueryBuilder, ReportQuery,
};
pub use emit::{BufferedSink, RowSink, STREAM_CHANNEL_CAPACITY, StreamingSink};
pub use error::{AnalyticsError, ProviderError, Result};
pub use export::{
    DEFAULT_MONTHLY_PAGE_SIZE, DEFAULT_PAGE_SIZE, ExportPlan, ExportResult, ExportStream,
    ExportSummary, Exporter, SplitMode,
};
pub use paginate::{DEFAULT_BACKOFF, DEFAULT_MAX_PAGES, Paginator, StopReason, WindowOutcome};
pub use provider::{PageResult, RawRow, ReportProvider};
pub use row::{FieldValue, NormalizedRow, normalize};
pub use window::{DateWindow, parse_date};
