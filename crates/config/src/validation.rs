//! Configuration validation
//!
//! Validates config consistency:
//! - GA4 property id is present
//! - Export page sizes and caps are within request limits
//! - The API server has a usable port

use crate::Config;
use crate::error::{ConfigError, Result};
use crate::export::{MAX_BACKOFF_MS, MAX_PAGE_SIZE, MAX_PAGES_LIMIT};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_ga4(config)?;
    validate_export(config)?;
    validate_api_server(config)?;
    Ok(())
}

fn validate_ga4(config: &Config) -> Result<()> {
    let property = config.ga4.property_id.trim();
    if property.is_empty() {
        return Err(ConfigError::invalid_value("ga4", "property_id", "must not be empty"));
    }
    if !property.chars().all(|c| c.is_ascii_digit()) {
        return Err(ConfigError::invalid_value(
            "ga4",
            "property_id",
            format!("'{}' is not numeric", property),
        ));
    }
    if config.ga4.timeout_secs == 0 {
        return Err(ConfigError::invalid_value("ga4", "timeout_secs", "must be positive"));
    }
    Ok(())
}

fn validate_export(config: &Config) -> Result<()> {
    let export = &config.export;
    check_range("page_size", export.page_size, MAX_PAGE_SIZE)?;
    check_range("monthly_page_size", export.monthly_page_size, MAX_PAGE_SIZE)?;
    check_range("max_pages", export.max_pages, MAX_PAGES_LIMIT)?;

    if export.backoff_ms > MAX_BACKOFF_MS {
        return Err(ConfigError::invalid_value(
            "export",
            "backoff_ms",
            format!("must be at most {}", MAX_BACKOFF_MS),
        ));
    }
    Ok(())
}

fn check_range(field: &'static str, value: u32, max: u32) -> Result<()> {
    if value == 0 || value > max {
        return Err(ConfigError::invalid_value(
            "export",
            field,
            format!("must be between 1 and {}, got {}", max, value),
        ));
    }
    Ok(())
}

fn validate_api_server(config: &Config) -> Result<()> {
    if config.api_server.port == 0 {
        return Err(ConfigError::invalid_value("api_server", "port", "must not be 0"));
    }
    if config.api_server.host.trim().is_empty() {
        return Err(ConfigError::invalid_value("api_server", "host", "must not be empty"));
    }
    Ok(())
}
