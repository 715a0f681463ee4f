//! Offset pagination over a single window
//!
//! [`Paginator`] is pull-based: callers loop on [`Paginator::next_page`] until
//! it yields `None`, emitting each batch as it arrives. Stop conditions, in
//! order of precedence:
//!
//! 1. an empty batch (exhausted)
//! 2. offset reached the total reported on the first page (complete)
//! 3. page counter reached `max_pages` (truncated)
//!
//! Provider failures are not retried.

use std::time::Duration;

use tracing::{debug, warn};

use crate::builder::ReportQuery;
use crate::error::Result;
use crate::provider::{RawRow, ReportProvider};

/// Default pause between consecutive page requests
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(150);

/// Default safety cap on pages per window
pub const DEFAULT_MAX_PAGES: u32 = 200;

/// Why pagination stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Provider returned an empty batch
    Exhausted,
    /// Offset reached the reported total
    Complete,
    /// Page cap reached before the data ran out
    PageCap,
}

/// Outcome of paginating one window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOutcome {
    /// Pages that carried rows
    pub pages: u32,
    /// Rows retrieved
    pub rows: u64,
    /// Total reported on the first page
    pub reported_total: Option<u64>,
    pub stop: StopReason,
}

impl WindowOutcome {
    /// Cap hit, or fewer rows than the provider said it had
    pub fn truncated(&self) -> bool {
        self.stop == StopReason::PageCap || self.reported_total.is_some_and(|t| self.rows < t)
    }
}

/// Drives one [`ReportQuery`] to completion
pub struct Paginator<'a> {
    provider: &'a dyn ReportProvider,
    query: ReportQuery,
    max_pages: u32,
    backoff: Duration,
    pages: u32,
    calls: u32,
    expected_total: Option<u64>,
    stop: Option<StopReason>,
}

impl<'a> Paginator<'a> {
    /// Start paginating `query` from its current offset
    pub fn new(provider: &'a dyn ReportProvider, query: ReportQuery, max_pages: u32) -> Self {
        Self {
            provider,
            query,
            max_pages: max_pages.max(1),
            backoff: DEFAULT_BACKOFF,
            pages: 0,
            calls: 0,
            expected_total: None,
            stop: None,
        }
    }

    /// Pause between calls; zero disables
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Fetch the next batch, or `None` once pagination has stopped
    ///
    /// The backoff sleep happens before every call except the first, so no
    /// time is spent after the final page.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RawRow>>> {
        if self.stop.is_some() {
            return Ok(None);
        }

        if self.calls > 0 && !self.backoff.is_zero() {
            tokio::time::sleep(self.backoff).await;
        }

        let page = self.provider.run_report(&self.query).await?;
        self.calls += 1;

        if self.calls == 1 {
            self.expected_total = page.reported_total;
        }

        if page.rows.is_empty() {
            debug!(
                window = %self.query.window,
                offset = self.query.offset,
                "empty batch, window exhausted"
            );
            self.stop = Some(StopReason::Exhausted);
            return Ok(None);
        }

        self.pages += 1;
        self.query.advance(page.rows.len());

        debug!(
            window = %self.query.window,
            page = self.pages,
            batch = page.rows.len(),
            offset = self.query.offset,
            expected = ?self.expected_total,
            "page fetched"
        );

        if self.expected_total.is_some_and(|total| self.query.offset >= total) {
            self.stop = Some(StopReason::Complete);
        } else if self.pages >= self.max_pages {
            warn!(
                window = %self.query.window,
                max_pages = self.max_pages,
                offset = self.query.offset,
                expected = ?self.expected_total,
                "page cap reached, export may be truncated"
            );
            self.stop = Some(StopReason::PageCap);
        }

        Ok(Some(page.rows))
    }

    /// The query being paginated; `offset` equals rows retrieved so far
    pub fn query(&self) -> &ReportQuery {
        &self.query
    }

    /// Pages with rows fetched so far
    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Provider calls made so far, including a final empty one
    pub fn calls(&self) -> u32 {
        self.calls
    }

    pub fn expected_total(&self) -> Option<u64> {
        self.expected_total
    }

    /// Outcome once stopped, `None` while pages remain
    pub fn outcome(&self) -> Option<WindowOutcome> {
        self.stop.map(|stop| WindowOutcome {
            pages: self.pages,
            rows: self.query.offset,
            reported_total: self.expected_total,
            stop,
        })
    }
}
