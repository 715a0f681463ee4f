//! Export engine defaults

use chrono::NaiveDate;
use serde::Deserialize;

/// Largest page size a request may ask for
pub const MAX_PAGE_SIZE: u32 = 100_000;

/// Largest page cap a request may ask for
pub const MAX_PAGES_LIMIT: u32 = 2_000;

/// Longest inter-page sleep a request may ask for
pub const MAX_BACKOFF_MS: u64 = 2_000;

/// Export defaults applied when a request leaves a parameter out
///
/// # Example
///
/// ```toml
/// [export]
/// floor_date = "2024-01-01"
/// page_size = 10000
/// max_pages = 200
/// monthly_page_size = 25000
/// backoff_ms = 150
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Earliest date any export may cover
    pub floor_date: NaiveDate,

    /// Rows per page for single-window exports
    pub page_size: u32,

    /// Page cap per window
    pub max_pages: u32,

    /// Rows per page for month-split exports
    pub monthly_page_size: u32,

    /// Sleep between page requests, in milliseconds
    pub backoff_ms: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            floor_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN),
            page_size: 10_000,
            max_pages: 200,
            monthly_page_size: 25_000,
            backoff_ms: 150,
        }
    }
}
