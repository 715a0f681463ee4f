//! Export orchestration
//!
//! [`Exporter`] runs a plan end to end: build the detail query, paginate each
//! window (the whole range, or one window per calendar month), normalize and
//! emit every page, keep running sums, then audit against the aggregate query
//! and close the sink with the summary.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::audit::{AuditReport, RunningTotals, audit};
use crate::builder::ReportQuery;
use crate::emit::{BufferedSink, RowSink, StreamingSink};
use crate::error::{AnalyticsError, Result};
use crate::paginate::{DEFAULT_BACKOFF, DEFAULT_MAX_PAGES, Paginator, WindowOutcome};
use crate::provider::ReportProvider;
use crate::row::{NormalizedRow, normalize_batch};
use crate::window::DateWindow;

/// Default rows per page for single-window exports
pub const DEFAULT_PAGE_SIZE: u32 = 10_000;

/// Default rows per page for month-split exports
pub const DEFAULT_MONTHLY_PAGE_SIZE: u32 = 25_000;

/// How the range is divided before paginating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitMode {
    /// Paginate the whole range as one window
    Single,
    /// One window per calendar month, each with its own page cap
    Monthly,
}

/// Parameters of one export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPlan {
    pub window: DateWindow,
    pub split: SplitMode,
    pub page_size: u32,
    /// Page cap per window
    pub max_pages: u32,
    pub backoff: Duration,
}

impl ExportPlan {
    /// Single-window plan with default paging
    pub fn single(window: DateWindow) -> Self {
        Self {
            window,
            split: SplitMode::Single,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Month-split plan with default paging
    pub fn monthly(window: DateWindow) -> Self {
        Self {
            split: SplitMode::Monthly,
            page_size: DEFAULT_MONTHLY_PAGE_SIZE,
            ..Self::single(window)
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Windows to paginate, in chronological order
    pub fn windows(&self) -> Vec<DateWindow> {
        match self.split {
            SplitMode::Single => vec![self.window],
            SplitMode::Monthly => self.window.split_by_month(),
        }
    }
}

/// Counts and flags describing a finished (or failed) export
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    /// Rows emitted
    pub row_count: u64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Pages with rows, summed over all windows
    pub pages: u32,
    pub truncated: bool,
    /// Sum of provider-reported totals across windows
    pub reported_row_count: Option<u64>,
    /// `None` when the export failed before auditing
    pub audit: Option<AuditReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Buffered export body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportResult {
    pub rows: Vec<NormalizedRow>,
    #[serde(flatten)]
    pub summary: ExportSummary,
}

/// A streaming export whose first chunk has already been produced
#[derive(Debug)]
pub struct ExportStream {
    first: Bytes,
    rest: mpsc::Receiver<Bytes>,
}

impl ExportStream {
    /// First chunk and the receiver for the remaining ones
    pub fn into_parts(self) -> (Bytes, mpsc::Receiver<Bytes>) {
        (self.first, self.rest)
    }
}

#[derive(Debug, Default)]
struct Progress {
    pages: u32,
    truncated: bool,
    reported_total: Option<u64>,
}

impl Progress {
    fn absorb(&mut self, outcome: WindowOutcome) {
        self.pages += outcome.pages;
        self.truncated |= outcome.truncated();
        self.reported_total = match (self.reported_total, outcome.reported_total) {
            (Some(a), Some(b)) => Some(a + b),
            (a, b) => a.or(b),
        };
    }
}

/// Runs export plans against a provider
#[derive(Clone)]
pub struct Exporter {
    provider: Arc<dyn ReportProvider>,
}

impl Exporter {
    pub fn new(provider: Arc<dyn ReportProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &dyn ReportProvider {
        self.provider.as_ref()
    }

    /// Run `plan`, writing rows into `sink`
    ///
    /// Invalid plans fail before any provider call. Any provider failure
    /// aborts the whole export; the sink is given a chance to close its
    /// output before the error is returned.
    pub async fn run(&self, plan: &ExportPlan, sink: &mut dyn RowSink) -> Result<ExportSummary> {
        let base = ReportQuery::detail(plan.window, plan.page_size)?;
        let windows = plan.windows();

        info!(
            start = %plan.window.start,
            end = %plan.window.end,
            split = ?plan.split,
            windows = windows.len(),
            page_size = plan.page_size,
            max_pages = plan.max_pages,
            provider = self.provider.name(),
            "export started"
        );

        let mut totals = RunningTotals::audited();
        let mut progress = Progress::default();

        for window in windows {
            let mut paginator = Paginator::new(
                self.provider.as_ref(),
                base.for_window(window),
                plan.max_pages,
            )
            .with_backoff(plan.backoff);

            loop {
                let batch = match paginator.next_page().await {
                    Ok(Some(batch)) => batch,
                    Ok(None) => break,
                    Err(e) => {
                        progress.pages += paginator.pages();
                        return Err(self.fail(plan, sink, &totals, &progress, e).await);
                    }
                };

                let rows = normalize_batch(&batch, &base.dimensions, &base.metrics);
                sink.write_rows(&rows).await?;
                for row in &rows {
                    totals.add(row);
                }
            }

            if let Some(outcome) = paginator.outcome() {
                progress.absorb(outcome);
            }
        }

        let report = match audit(self.provider.as_ref(), plan.window, &totals).await {
            Ok(report) => report,
            Err(e) => return Err(self.fail(plan, sink, &totals, &progress, e).await),
        };

        let summary = ExportSummary {
            row_count: totals.rows(),
            start: plan.window.start,
            end: plan.window.end,
            pages: progress.pages,
            truncated: progress.truncated,
            reported_row_count: progress.reported_total,
            audit: Some(report),
            error: None,
        };

        sink.finish(&summary).await?;

        info!(
            start = %summary.start,
            end = %summary.end,
            rows = summary.row_count,
            pages = summary.pages,
            truncated = summary.truncated,
            "export finished"
        );

        Ok(summary)
    }

    /// Run `plan` and collect everything in memory
    pub async fn buffered(&self, plan: &ExportPlan) -> Result<ExportResult> {
        let mut sink = BufferedSink::new();
        self.run(plan, &mut sink).await?;
        sink.into_result()
            .ok_or_else(|| AnalyticsError::Task("export finished without a summary".to_string()))
    }

    /// Run `plan` on a background task feeding a bounded channel
    pub fn spawn_stream(
        &self,
        plan: ExportPlan,
    ) -> (mpsc::Receiver<Bytes>, JoinHandle<Result<ExportSummary>>) {
        let (mut sink, rx) = StreamingSink::channel();
        let exporter = self.clone();
        let handle = tokio::spawn(async move { exporter.run(&plan, &mut sink).await });
        (rx, handle)
    }

    /// Start a streaming export and wait for its first chunk
    ///
    /// The first chunk is only produced after the first page (or the whole
    /// export, when it has no rows) succeeded, so early failures come back
    /// here as errors instead of as a broken body.
    pub async fn stream(&self, plan: ExportPlan) -> Result<ExportStream> {
        let (mut rx, handle) = self.spawn_stream(plan);

        if let Some(first) = rx.recv().await {
            return Ok(ExportStream { first, rest: rx });
        }

        match handle.await {
            Ok(Err(e)) => Err(e),
            Ok(Ok(_)) => Err(AnalyticsError::Task(
                "export finished without output".to_string(),
            )),
            Err(e) => Err(AnalyticsError::Task(e.to_string())),
        }
    }

    async fn fail(
        &self,
        plan: &ExportPlan,
        sink: &mut dyn RowSink,
        totals: &RunningTotals,
        progress: &Progress,
        cause: AnalyticsError,
    ) -> AnalyticsError {
        error!(
            start = %plan.window.start,
            end = %plan.window.end,
            rows = totals.rows(),
            pages = progress.pages,
            provider = self.provider.name(),
            error = %cause,
            "export failed"
        );

        let partial = ExportSummary {
            row_count: totals.rows(),
            start: plan.window.start,
            end: plan.window.end,
            pages: progress.pages,
            truncated: true,
            reported_row_count: progress.reported_total,
            audit: None,
            error: Some(cause.to_string()),
        };

        if let Err(e) = sink.abort(&partial).await {
            info!(error = %e, "could not close output after failure");
        }

        cause
    }
}
