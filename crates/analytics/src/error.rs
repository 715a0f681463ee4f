//! Export engine error types

use thiserror::Error;

/// Errors returned by a [`ReportProvider`](crate::provider::ReportProvider)
///
/// Providers translate their transport-specific failures into this type so the
/// engine stays independent of any particular HTTP client.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Credentials missing, unreadable or rejected before any query ran
    #[error("credentials error: {0}")]
    Credentials(String),

    /// Transport failure (connect, timeout, TLS)
    #[error("request failed: {0}")]
    Http(String),

    /// Provider answered with a non-success status
    #[error("provider returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body could not be decoded
    #[error("invalid provider response: {0}")]
    Decode(String),
}

/// Export engine errors
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Date string is not `YYYY-MM-DD`
    #[error("invalid date format: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),

    /// Window is empty or inverted
    #[error("invalid range: {0}")]
    InvalidWindow(String),

    /// Page size outside the provider's accepted bounds
    #[error("invalid page size {size}: must be between 1 and {max}")]
    InvalidPageSize { size: u32, max: u32 },

    /// Query shape rejected before execution
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Provider call failed; the export is aborted
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Row or trailer could not be encoded
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Output consumer went away before the export finished
    #[error("export cancelled: output closed")]
    Cancelled,

    /// Background export task panicked or was aborted
    #[error("export task failed: {0}")]
    Task(String),
}

impl AnalyticsError {
    /// True when the failure happened before any upstream call
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidDate(_)
                | Self::InvalidWindow(_)
                | Self::InvalidPageSize { .. }
                | Self::InvalidQuery(_)
        )
    }
}

/// Result type for export operations
pub type Result<T> = std::result::Result<T, AnalyticsError>;
