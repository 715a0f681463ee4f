//! Date windows
//!
//! A [`DateWindow`] is a closed calendar range `[start, end]`. Requested ranges
//! are clamped to a configured floor date and to yesterday (the current day is
//! still being collected and would export partial numbers).

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::error::{AnalyticsError, Result};

/// Closed date range, `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    /// First day (inclusive)
    pub start: NaiveDate,
    /// Last day (inclusive)
    pub end: NaiveDate,
}

impl DateWindow {
    /// Create a window, rejecting `start > end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(AnalyticsError::InvalidWindow(format!(
                "{} > {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse both ends from `YYYY-MM-DD` strings and clamp the result
    ///
    /// The clamp happens before the ordering check, so a request that lies
    /// entirely outside `[floor, today - 1]` is rejected as an empty range.
    pub fn clamped(start: &str, end: &str, floor: NaiveDate, today: NaiveDate) -> Result<Self> {
        let start = parse_date(start)?;
        let end = parse_date(end)?;
        Self::clamp(start, end, floor, today)
    }

    /// Clamp a requested range to `[floor, today - 1]`
    pub fn clamp(
        start: NaiveDate,
        end: NaiveDate,
        floor: NaiveDate,
        today: NaiveDate,
    ) -> Result<Self> {
        let yesterday = today - Duration::days(1);
        let start = start.max(floor);
        let end = end.min(yesterday);

        if start > end {
            return Err(AnalyticsError::InvalidWindow(format!(
                "empty after clamp: {} > {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Number of calendar days in the window (both ends included)
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Split into one window per calendar month touched by the range
    ///
    /// First and last windows are clipped to the range, so they may be partial
    /// months. Windows come back in chronological order.
    pub fn split_by_month(&self) -> Vec<DateWindow> {
        let mut windows = Vec::new();
        let mut cursor = Some(self.start);

        while let Some(month_start) = cursor {
            if month_start > self.end {
                break;
            }
            let next = first_of_next_month(month_start);
            let month_end = next
                .map(|d| d - Duration::days(1))
                .unwrap_or(NaiveDate::MAX)
                .min(self.end);

            windows.push(DateWindow {
                start: month_start,
                end: month_end,
            });
            cursor = next;
        }

        windows
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| AnalyticsError::InvalidDate(s.to_string()))
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = (date.year(), date.month());
    if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
}
