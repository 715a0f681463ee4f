//! API error types
//!
//! Provides structured error responses for the HTTP API.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dash_analytics::{AnalyticsError, ProviderError};
use serde::Serialize;
use thiserror::Error;

/// API errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request (missing or unparseable parameters, bad dates)
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Range is inverted or empty once clamped
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    /// Parameter outside its accepted bounds
    #[error("validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Provider credentials missing or unusable
    #[error("credentials error: {0}")]
    Credentials(String),

    /// Provider query failed
    #[error("upstream query failed: {0}")]
    Upstream(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidDateRange(_) => StatusCode::BAD_REQUEST,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Credentials(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::InvalidDateRange(_) => "INVALID_DATE_RANGE",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Credentials(_) => "CREDENTIALS_ERROR",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a validation error
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::InvalidDate(_) => Self::BadRequest(err.to_string()),
            AnalyticsError::InvalidWindow(msg) => Self::InvalidDateRange(msg),
            AnalyticsError::InvalidPageSize { size, max } => Self::validation(
                "page_size",
                format!("{} is outside 1..={}", size, max),
            ),
            AnalyticsError::InvalidQuery(msg) => Self::BadRequest(msg),
            AnalyticsError::Provider(ProviderError::Credentials(msg)) => Self::Credentials(msg),
            AnalyticsError::Provider(e) => Self::Upstream(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message (human-readable)
    pub error: String,
    /// Error code (machine-readable)
    pub code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.code(),
        };

        tracing::warn!(
            error_code = body.code,
            error_message = %body.error,
            status = %status,
            "API error"
        );

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::validation("page_size", "too big").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Credentials("missing".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Upstream("503".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_analytics_error_mapping() {
        let err: ApiError = AnalyticsError::InvalidDate("2024-13-01".into()).into();
        assert_eq!(err.code(), "BAD_REQUEST");

        let err: ApiError = AnalyticsError::InvalidWindow("empty".into()).into();
        assert_eq!(err.code(), "INVALID_DATE_RANGE");

        let err: ApiError = AnalyticsError::InvalidPageSize { size: 0, max: 100_000 }.into();
        assert!(matches!(err, ApiError::Validation { ref field, .. } if field == "page_size"));

        let err: ApiError =
            AnalyticsError::Provider(ProviderError::Credentials("no such file".into())).into();
        assert_eq!(err.code(), "CREDENTIALS_ERROR");
        assert!(err.to_string().contains("no such file"));

        let err: ApiError = AnalyticsError::Provider(ProviderError::Status {
            status: 503,
            message: "backend unavailable".into(),
        })
        .into();
        assert_eq!(err.code(), "UPSTREAM_ERROR");
        assert!(err.to_string().contains("503"));

        let err: ApiError = AnalyticsError::Cancelled.into();
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }
}
