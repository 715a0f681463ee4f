//! Command implementations for the Dash CLI

pub mod export;
pub mod serve;

use std::sync::Arc;

use anyhow::{Context, Result};
use dash_analytics::ReportProvider;
use dash_config::Config;
use dash_connectors::{Ga4Client, Ga4Config};

/// Build the GA4 provider described by `[ga4]`
///
/// The credentials file is only read on the first report call, so a missing
/// key surfaces per request instead of preventing startup.
pub fn ga4_provider(config: &Config) -> Result<Arc<dyn ReportProvider>> {
    let ga4 = &config.ga4;
    let client = Ga4Client::new(Ga4Config {
        property_id: ga4.property_id.clone(),
        credentials_file: ga4.credentials_path(),
        access_token: ga4.access_token.clone(),
        api_url: ga4.api_url.clone(),
        timeout_secs: ga4.timeout_secs,
    })
    .context("failed to create GA4 client")?;

    Ok(Arc::new(client))
}
