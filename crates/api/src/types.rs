//! API request types
//!
//! Query parameters for the export endpoints and their translation into an
//! [`ExportPlan`].

use std::time::Duration;

use dash_analytics::{DateWindow, ExportPlan, SplitMode};
use dash_config::{ExportConfig, MAX_BACKOFF_MS, MAX_PAGE_SIZE, MAX_PAGES_LIMIT};
use serde::Deserialize;

use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Query parameters shared by the single-window and monthly exports
///
/// Missing numeric parameters fall back to [`ExportConfig`]; the monthly
/// export uses `monthly_page_size` instead of `page_size`.
#[derive(Debug, Default, Deserialize)]
pub struct ExportParams {
    /// First day, `YYYY-MM-DD`
    pub start: String,

    /// Last day, `YYYY-MM-DD`
    pub end: String,

    /// Rows per provider page (1..=100000)
    pub page_size: Option<u32>,

    /// Page cap per window (1..=2000)
    pub max_pages: Option<u32>,

    /// Sleep between page requests in milliseconds (0..=2000)
    pub sleep_ms: Option<u64>,
}

impl ExportParams {
    /// Validate bounds, clamp dates and build the plan
    pub fn to_plan(&self, state: &AppState, split: SplitMode) -> Result<ExportPlan> {
        let defaults = &state.export;
        let page_size = self.page_size.unwrap_or(match split {
            SplitMode::Single => defaults.page_size,
            SplitMode::Monthly => defaults.monthly_page_size,
        });
        let max_pages = self.max_pages.unwrap_or(defaults.max_pages);
        let sleep_ms = self.sleep_ms.unwrap_or(defaults.backoff_ms);

        check_bounds("page_size", page_size.into(), 1, MAX_PAGE_SIZE.into())?;
        check_bounds("max_pages", max_pages.into(), 1, MAX_PAGES_LIMIT.into())?;
        check_bounds("sleep_ms", sleep_ms, 0, MAX_BACKOFF_MS)?;

        let window = self.window(defaults, state.today())?;
        let plan = match split {
            SplitMode::Single => ExportPlan::single(window),
            SplitMode::Monthly => ExportPlan::monthly(window),
        };

        Ok(plan
            .with_page_size(page_size)
            .with_max_pages(max_pages)
            .with_backoff(Duration::from_millis(sleep_ms)))
    }

    fn window(&self, defaults: &ExportConfig, today: chrono::NaiveDate) -> Result<DateWindow> {
        Ok(DateWindow::clamped(
            &self.start,
            &self.end,
            defaults.floor_date,
            today,
        )?)
    }
}

fn check_bounds(field: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if value < min || value > max {
        return Err(ApiError::validation(
            field,
            format!("must be between {} and {}, got {}", min, max, value),
        ));
    }
    Ok(())
}
