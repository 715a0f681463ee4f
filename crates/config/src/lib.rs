//! Dash Configuration
//!
//! TOML-based configuration loading with sensible defaults, followed by
//! environment overrides. Minimal config should just work: with no file at
//! all the service listens on `0.0.0.0:8000` and reads the GA4 key from
//! `/etc/secrets/ga4-credentials.json`.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use dash_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[ga4]\nproperty_id = \"123456\"").unwrap();
//! assert_eq!(config.ga4.property_id, "123456");
//! ```
//!
//! # Environment
//!
//! | Variable | Field |
//! |----------|-------|
//! | `LOG_LEVEL` | `log.level` |
//! | `HOST` / `PORT` | `api_server.host` / `api_server.port` |
//! | `CORS_ALLOW_ORIGINS` | `api_server.cors_allow_origins` (comma separated) |
//! | `GA4_PROPERTY_ID` | `ga4.property_id` |
//! | `GA4_CREDENTIALS_FILE` | `ga4.credentials_file` |
//! | `GA4_ACCESS_TOKEN` | `ga4.access_token` |
//! | `GA4_API_URL` | `ga4.api_url` |

mod api_server;
mod error;
mod export;
mod ga4;
mod logging;
mod validation;

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use api_server::{ApiServerConfig, parse_origins};
pub use error::{ConfigError, Result};
pub use export::{ExportConfig, MAX_BACKOFF_MS, MAX_PAGE_SIZE, MAX_PAGES_LIMIT};
pub use ga4::{DEFAULT_GA4_API_URL, Ga4Section};
pub use logging::{LogConfig, LogFormat, LogLevel};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// HTTP listener and CORS
    pub api_server: ApiServerConfig,

    /// GA4 property and credentials
    pub ga4: Ga4Section,

    /// Export defaults
    pub export: ExportConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or contains invalid TOML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Load the optional file, then apply process environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Same as [`Config::load`] with an injectable variable lookup
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Overwrite fields from environment variables that are set and non-blank
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(level) = var("LOG_LEVEL") {
            self.log.level = level
                .parse()
                .map_err(|e: String| ConfigError::invalid_env("LOG_LEVEL", e))?;
        }
        if let Some(host) = var("HOST") {
            self.api_server.host = host.trim().to_string();
        }
        if let Some(port) = var("PORT") {
            self.api_server.port = port.trim().parse().map_err(|_| {
                ConfigError::invalid_env("PORT", format!("not a port number: {}", port))
            })?;
        }
        if let Some(origins) = var("CORS_ALLOW_ORIGINS") {
            self.api_server.cors_allow_origins = parse_origins(&origins);
        }
        if let Some(property) = var("GA4_PROPERTY_ID") {
            self.ga4.property_id = property.trim().to_string();
        }
        if let Some(file) = var("GA4_CREDENTIALS_FILE") {
            self.ga4.credentials_file = PathBuf::from(file.trim());
        }
        if let Some(token) = var("GA4_ACCESS_TOKEN") {
            self.ga4.access_token = Some(token.trim().to_string());
        }
        if let Some(url) = var("GA4_API_URL") {
            self.ga4.api_url = url.trim().trim_end_matches('/').to_string();
        }
        Ok(())
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
