//! Google Analytics 4 Data API connector
//!
//! Executes `properties/{id}:runReport` for the export engine. One call per
//! page; nothing is retried here, the engine decides what a failure means.

mod credentials;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use dash_analytics::{PageResult, ProviderError, RawRow, ReportProvider, ReportQuery};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConnectorError;

pub use credentials::{
    ANALYTICS_READONLY_SCOPE, AssertionClaims, JWT_BEARER_GRANT, ServiceAccountKey,
    TOKEN_REFRESH_MARGIN, TokenProvider, build_assertion,
};

/// Data API v1beta endpoint
pub const DEFAULT_API_URL: &str = "https://analyticsdata.googleapis.com/v1beta";

/// GA4 connector configuration
#[derive(Debug, Clone)]
pub struct Ga4Config {
    /// Numeric GA4 property id
    pub property_id: String,
    /// Service account key file
    pub credentials_file: PathBuf,
    /// Pre-issued bearer token; skips the service account exchange
    pub access_token: Option<String>,
    /// API base URL (default: https://analyticsdata.googleapis.com/v1beta)
    pub api_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for Ga4Config {
    fn default() -> Self {
        Self {
            property_id: String::new(),
            credentials_file: PathBuf::from("/etc/secrets/ga4-credentials.json"),
            access_token: None,
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

/// GA4 report client
pub struct Ga4Client {
    property_id: String,
    api_url: String,
    client: reqwest::Client,
    tokens: TokenProvider,
}

impl Ga4Client {
    /// Create a client
    ///
    /// Credentials are not touched until the first report call.
    ///
    /// # Errors
    ///
    /// Returns error if the property id is empty or HTTP client creation fails
    pub fn new(config: Ga4Config) -> Result<Self, ConnectorError> {
        if config.property_id.trim().is_empty() {
            return Err(ConnectorError::Init("GA4 property id is empty".into()));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("dash-export/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConnectorError::Init(format!("GA4 HTTP client: {}", e)))?;

        let tokens = match config.access_token {
            Some(token) => TokenProvider::fixed(token, client.clone()),
            None => TokenProvider::service_account(
                config.credentials_file,
                ANALYTICS_READONLY_SCOPE,
                client.clone(),
            ),
        };

        Ok(Self {
            property_id: config.property_id,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            client,
            tokens,
        })
    }

    pub fn property_id(&self) -> &str {
        &self.property_id
    }

    fn report_url(&self) -> String {
        format!("{}/properties/{}:runReport", self.api_url, self.property_id)
    }

    /// Execute one page of a report (single attempt, no retry)
    async fn run_report_once(&self, query: &ReportQuery) -> Result<PageResult, ConnectorError> {
        let token = self.tokens.access_token().await?;
        let request = RunReportRequest::from_query(query);

        let response = self
            .client
            .post(self.report_url())
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(handle_error_status(response).await);
        }

        let body = response.bytes().await?;
        let report: RunReportResponse = serde_json::from_slice(&body)?;
        let page = report.into_page();

        debug!(
            property = %self.property_id,
            window = %query.window,
            offset = query.offset,
            rows = page.rows.len(),
            row_count = ?page.reported_total,
            "runReport"
        );

        Ok(page)
    }
}

#[async_trait]
impl ReportProvider for Ga4Client {
    async fn run_report(&self, query: &ReportQuery) -> Result<PageResult, ProviderError> {
        self.run_report_once(query).await.map_err(ProviderError::from)
    }

    fn name(&self) -> &'static str {
        "ga4"
    }
}

/// Map an error response, preferring Google's own error message
async fn handle_error_status(response: reqwest::Response) -> ConnectorError {
    let status = response.status();
    let retry_after_secs = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);

    let body = response.text().await.unwrap_or_default();
    let message = google_error_message(&body).unwrap_or_else(|| body.trim().to_string());

    match status {
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            ConnectorError::AuthFailed(message)
        }
        reqwest::StatusCode::TOO_MANY_REQUESTS => ConnectorError::RateLimited { retry_after_secs },
        _ => ConnectorError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// `error.message` from a Google API error body
fn google_error_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct Envelope {
        error: Detail,
    }
    #[derive(Deserialize)]
    struct Detail {
        message: String,
    }

    serde_json::from_str::<Envelope>(body)
        .ok()
        .map(|e| e.error.message)
        .filter(|m| !m.is_empty())
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunReportRequest<'a> {
    date_ranges: Vec<DateRange>,
    dimensions: Vec<Named<'a>>,
    metrics: Vec<Named<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    order_bys: Vec<OrderBy<'a>>,
    limit: u32,
    offset: u64,
    keep_empty_rows: bool,
}

impl<'a> RunReportRequest<'a> {
    fn from_query(query: &'a ReportQuery) -> Self {
        Self {
            date_ranges: vec![DateRange {
                start_date: query.window.start.format("%Y-%m-%d").to_string(),
                end_date: query.window.end.format("%Y-%m-%d").to_string(),
            }],
            dimensions: query.dimensions.iter().map(|name| Named { name: *name }).collect(),
            metrics: query.metrics.iter().map(|name| Named { name: *name }).collect(),
            order_bys: query
                .sort_keys
                .iter()
                .map(|name| OrderBy {
                    dimension: DimensionOrderBy {
                        dimension_name: *name,
                    },
                })
                .collect(),
            limit: query.page_size,
            offset: query.offset,
            keep_empty_rows: false,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DateRange {
    start_date: String,
    end_date: String,
}

#[derive(Debug, Serialize)]
struct Named<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct OrderBy<'a> {
    dimension: DimensionOrderBy<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DimensionOrderBy<'a> {
    dimension_name: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RunReportResponse {
    rows: Vec<ReportRow>,
    row_count: Option<u64>,
}

impl RunReportResponse {
    fn into_page(self) -> PageResult {
        PageResult {
            rows: self
                .rows
                .into_iter()
                .map(|row| {
                    RawRow::new(
                        row.dimension_values.into_iter().map(|v| v.value).collect(),
                        row.metric_values.into_iter().map(|v| v.value).collect(),
                    )
                })
                .collect(),
            reported_total: self.row_count,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ReportRow {
    dimension_values: Vec<CellValue>,
    metric_values: Vec<CellValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CellValue {
    value: String,
}
