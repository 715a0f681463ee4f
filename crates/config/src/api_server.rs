//! API server configuration

use serde::Deserialize;

/// API server configuration
///
/// # Example
///
/// ```toml
/// [api_server]
/// host = "0.0.0.0"                    # default, HOST
/// port = 8000                         # default, PORT
/// cors_allow_origins = ["*"]          # default, CORS_ALLOW_ORIGINS
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiServerConfig {
    /// Host to bind to
    /// Default: "0.0.0.0"
    pub host: String,

    /// Port to listen on
    /// Default: 8000
    pub port: u16,

    /// Origins allowed by CORS; `*` allows any
    /// Default: ["*"]
    pub cors_allow_origins: Vec<String>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_allow_origins: vec!["*".to_string()],
        }
    }
}

impl ApiServerConfig {
    /// `host:port` for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True when any origin is allowed
    pub fn allows_any_origin(&self) -> bool {
        self.cors_allow_origins.is_empty() || self.cors_allow_origins.iter().any(|o| o == "*")
    }
}

/// Split a comma separated origin list, dropping blanks
pub fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
