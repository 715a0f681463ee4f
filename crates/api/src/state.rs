//! Application state
//!
//! Shared state for API handlers: the export engine, request defaults and the
//! clock used to resolve "yesterday".

use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveDate};
use dash_analytics::{Exporter, ReportProvider};
use dash_config::ExportConfig;

/// Source of the current date
pub type Today = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Export engine bound to the configured provider
    pub exporter: Exporter,
    /// Defaults and floor date for export requests
    pub export: ExportConfig,
    /// Current date; exports never include it
    pub today: Today,
    /// Server start time for uptime reporting
    pub started: Instant,
}

impl AppState {
    /// Create state around `provider`, using the local calendar date
    pub fn new(provider: Arc<dyn ReportProvider>, export: ExportConfig) -> Self {
        Self {
            exporter: Exporter::new(provider),
            export,
            today: Arc::new(|| Local::now().date_naive()),
            started: Instant::now(),
        }
    }

    /// Pin the current date
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Arc::new(move || today);
        self
    }

    /// Current date according to the configured clock
    pub fn today(&self) -> NaiveDate {
        (self.today)()
    }
}
