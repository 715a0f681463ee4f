//! Error types for connectors

use dash_analytics::ProviderError;
use thiserror::Error;

/// Errors that can occur during connector operations
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Failed to initialize connector (e.g., HTTP client creation failed)
    #[error("failed to initialize connector: {0}")]
    Init(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Credentials file missing, unreadable or malformed
    #[error("credentials error: {0}")]
    Credentials(String),

    /// Access token could not be obtained
    #[error("token exchange failed: {0}")]
    Token(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// API rate limited
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// API answered with an error status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

impl From<ConnectorError> for ProviderError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Credentials(msg) => ProviderError::Credentials(msg),
            ConnectorError::Init(msg) => ProviderError::Credentials(msg),
            ConnectorError::Http(e) => ProviderError::Http(e.to_string()),
            ConnectorError::Json(e) => ProviderError::Decode(e.to_string()),
            ConnectorError::Token(msg) => ProviderError::Credentials(msg),
            ConnectorError::AuthFailed(msg) => ProviderError::Status {
                status: 401,
                message: msg,
            },
            ConnectorError::RateLimited { retry_after_secs } => ProviderError::Status {
                status: 429,
                message: format!("rate limited, retry after {} seconds", retry_after_secs),
            },
            ConnectorError::Api { status, message } => ProviderError::Status { status, message },
        }
    }
}
