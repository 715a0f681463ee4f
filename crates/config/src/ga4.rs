//! GA4 connection configuration

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Default GA4 Data API base URL
pub const DEFAULT_GA4_API_URL: &str = "https://analyticsdata.googleapis.com/v1beta";

/// GA4 property and credential settings
///
/// # Example
///
/// ```toml
/// [ga4]
/// property_id = "279889272"                               # GA4_PROPERTY_ID
/// credentials_file = "/etc/secrets/ga4-credentials.json"  # GA4_CREDENTIALS_FILE
/// api_url = "https://analyticsdata.googleapis.com/v1beta"
/// timeout_secs = 60
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Ga4Section {
    /// Numeric GA4 property id
    pub property_id: String,

    /// Service account key file; `~/` is expanded
    pub credentials_file: PathBuf,

    /// Pre-issued bearer token; skips the service account exchange
    /// Default: None, set by `GA4_ACCESS_TOKEN`
    pub access_token: Option<String>,

    /// Data API base URL
    pub api_url: String,

    /// Per-request timeout
    /// Default: 60
    pub timeout_secs: u64,
}

impl Default for Ga4Section {
    fn default() -> Self {
        Self {
            property_id: "279889272".to_string(),
            credentials_file: PathBuf::from("/etc/secrets/ga4-credentials.json"),
            access_token: None,
            api_url: DEFAULT_GA4_API_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

impl Ga4Section {
    /// Credentials path with `~/` resolved against the home directory
    pub fn credentials_path(&self) -> PathBuf {
        expand_tilde(&self.credentials_file)
    }
}

/// Expand ~ to home directory
fn expand_tilde(path: &Path) -> PathBuf {
    path.to_str()
        .and_then(|s| s.strip_prefix("~/"))
        .and_then(|stripped| dirs::home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| path.to_path_buf())
}
