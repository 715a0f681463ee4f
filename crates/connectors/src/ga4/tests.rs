//! Tests for the GA4 connector

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use chrono::{NaiveDate, Utc};
use dash_analytics::{DateWindow, ProviderError, ReportProvider, ReportQuery};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::{Value, json};

use crate::error::ConnectorError;
use crate::ga4::{
    ANALYTICS_READONLY_SCOPE, AssertionClaims, Ga4Client, Ga4Config, JWT_BEARER_GRANT,
    RunReportRequest, RunReportResponse, ServiceAccountKey, build_assertion, google_error_message,
};

const TEST_KEY: &str = include_str!("testdata/test_key.pem");
const TEST_PUBLIC_KEY: &str = include_str!("testdata/test_key.pub.pem");

fn window() -> DateWindow {
    DateWindow::new(
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
    )
    .unwrap()
}

fn service_account_json(token_uri: &str) -> String {
    json!({
        "type": "service_account",
        "project_id": "dash-test",
        "private_key_id": "key-1",
        "private_key": TEST_KEY,
        "client_email": "exporter@dash-test.iam.gserviceaccount.com",
        "token_uri": token_uri,
    })
    .to_string()
}

// =============================================================================
// Fake Google endpoints
// =============================================================================

#[derive(Default)]
struct Recorded {
    token_requests: Vec<String>,
    report_requests: Vec<(String, Option<String>, Value)>,
}

#[derive(Clone)]
struct FakeGoogle {
    recorded: Arc<Mutex<Recorded>>,
    report_status: StatusCode,
    report_body: Value,
    token_status: StatusCode,
    retry_after: Option<&'static str>,
}

impl FakeGoogle {
    fn ok(report_body: Value) -> Self {
        Self {
            recorded: Arc::new(Mutex::new(Recorded::default())),
            report_status: StatusCode::OK,
            report_body,
            token_status: StatusCode::OK,
            retry_after: None,
        }
    }

    fn failing(status: StatusCode, body: Value) -> Self {
        Self {
            report_status: status,
            ..Self::ok(body)
        }
    }
}

async fn fake_google(
    State(fake): State<FakeGoogle>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    if uri.path() == "/token" {
        fake.recorded.lock().unwrap().token_requests.push(body);
        if fake.token_status != StatusCode::OK {
            return (fake.token_status, "invalid_grant").into_response();
        }
        return axum::Json(json!({
            "access_token": "exchanged-token",
            "expires_in": 3600,
            "token_type": "Bearer",
        }))
        .into_response();
    }

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let parsed: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    fake.recorded
        .lock()
        .unwrap()
        .report_requests
        .push((uri.path().to_string(), auth, parsed));

    let mut response = (fake.report_status, axum::Json(fake.report_body.clone())).into_response();
    if let Some(retry_after) = fake.retry_after {
        response
            .headers_mut()
            .insert("retry-after", retry_after.parse().unwrap());
    }
    response
}

async fn spawn(fake: FakeGoogle) -> String {
    let app = Router::new().fallback(fake_google).with_state(fake);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn sample_report() -> Value {
    json!({
        "dimensionHeaders": [{"name": "date"}],
        "metricHeaders": [{"name": "sessions", "type": "TYPE_INTEGER"}],
        "rows": [
            {"dimensionValues": [{"value": "20240301"}], "metricValues": [{"value": "10"}]},
            {"dimensionValues": [{"value": "20240302"}], "metricValues": [{"value": "12"}]}
        ],
        "rowCount": 2,
        "kind": "analyticsData#runReport"
    })
}

fn static_client(base: &str) -> Ga4Client {
    Ga4Client::new(Ga4Config {
        property_id: "279889272".into(),
        access_token: Some("static-token".into()),
        api_url: format!("{}/v1beta", base),
        timeout_secs: 5,
        ..Default::default()
    })
    .unwrap()
}

// =============================================================================
// Wire format
// =============================================================================

#[test]
fn test_detail_request_body() {
    let query = ReportQuery::detail(window(), 10_000).unwrap();
    let body = serde_json::to_value(RunReportRequest::from_query(&query)).unwrap();

    assert_eq!(
        body["dateRanges"],
        json!([{"startDate": "2024-03-01", "endDate": "2024-03-31"}])
    );
    assert_eq!(body["dimensions"].as_array().unwrap().len(), 8);
    assert_eq!(body["dimensions"][0], json!({"name": "date"}));
    assert_eq!(body["metrics"][0], json!({"name": "activeUsers"}));
    assert_eq!(body["orderBys"].as_array().unwrap().len(), 8);
    assert_eq!(body["orderBys"][0], json!({"dimension": {"dimensionName": "date"}}));
    assert_eq!(
        body["orderBys"][7],
        json!({"dimension": {"dimensionName": "sessionCampaignName"}})
    );
    assert_eq!(body["limit"], 10_000);
    assert_eq!(body["offset"], 0);
    assert_eq!(body["keepEmptyRows"], false);
}

#[test]
fn test_aggregate_request_body_has_no_order() {
    let query = ReportQuery::aggregate(window());
    let body = serde_json::to_value(RunReportRequest::from_query(&query)).unwrap();

    assert_eq!(body["dimensions"], json!([]));
    assert_eq!(body["metrics"].as_array().unwrap().len(), 5);
    assert!(body.get("orderBys").is_none());
    assert_eq!(body["limit"], 1);
}

#[test]
fn test_offset_is_sent() {
    let mut query = ReportQuery::detail(window(), 500).unwrap();
    query.advance(1500);
    let body = serde_json::to_value(RunReportRequest::from_query(&query)).unwrap();
    assert_eq!(body["offset"], 1500);
}

#[test]
fn test_response_decoding() {
    let report: RunReportResponse = serde_json::from_value(sample_report()).unwrap();
    let page = report.into_page();

    assert_eq!(page.reported_total, Some(2));
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.rows[0].dimension_values, vec!["20240301"]);
    assert_eq!(page.rows[1].metric_values, vec!["12"]);
}

#[test]
fn test_response_without_rows_is_empty_page() {
    let report: RunReportResponse =
        serde_json::from_value(json!({"kind": "analyticsData#runReport"})).unwrap();
    let page = report.into_page();

    assert!(page.rows.is_empty());
    assert_eq!(page.reported_total, None);
}

#[test]
fn test_google_error_message() {
    let body = r#"{"error":{"code":403,"message":"User does not have sufficient permissions","status":"PERMISSION_DENIED"}}"#;
    assert_eq!(
        google_error_message(body).as_deref(),
        Some("User does not have sufficient permissions")
    );
    assert_eq!(google_error_message("<html>bad gateway</html>"), None);
}

#[test]
fn test_new_rejects_empty_property() {
    let result = Ga4Client::new(Ga4Config::default());
    assert!(matches!(result, Err(ConnectorError::Init(_))));
}

// =============================================================================
// Credentials
// =============================================================================

#[test]
fn test_service_account_key_parsing() {
    let key = ServiceAccountKey::from_json(&service_account_json("https://example.test/token"))
        .unwrap();
    assert_eq!(key.client_email, "exporter@dash-test.iam.gserviceaccount.com");
    assert_eq!(key.token_uri, "https://example.test/token");
    assert_eq!(key.private_key_id.as_deref(), Some("key-1"));
}

#[test]
fn test_service_account_key_defaults_token_uri() {
    let json = json!({"client_email": "a@b.c", "private_key": TEST_KEY}).to_string();
    let key = ServiceAccountKey::from_json(&json).unwrap();
    assert_eq!(key.token_uri, "https://oauth2.googleapis.com/token");
}

#[test]
fn test_service_account_key_rejects_garbage() {
    assert!(matches!(
        ServiceAccountKey::from_json("not json"),
        Err(ConnectorError::Credentials(_))
    ));
    assert!(matches!(
        ServiceAccountKey::from_json(r#"{"client_email": "", "private_key": ""}"#),
        Err(ConnectorError::Credentials(_))
    ));
}

#[tokio::test]
async fn test_missing_key_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = ServiceAccountKey::load(&dir.path().join("missing.json")).await;
    assert!(matches!(result, Err(ConnectorError::Credentials(_))));
}

#[test]
fn test_assertion_is_signed_rs256() {
    let key = ServiceAccountKey::from_json(&service_account_json("https://example.test/token"))
        .unwrap();
    let now = Utc::now().timestamp();
    let jwt = build_assertion(&key, ANALYTICS_READONLY_SCOPE, now).unwrap();

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&["https://example.test/token"]);
    let decoding_key = DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap();
    let data = decode::<AssertionClaims>(&jwt, &decoding_key, &validation).unwrap();

    assert_eq!(data.header.kid.as_deref(), Some("key-1"));
    assert_eq!(data.claims.iss, "exporter@dash-test.iam.gserviceaccount.com");
    assert_eq!(data.claims.scope, ANALYTICS_READONLY_SCOPE);
    assert_eq!(data.claims.iat, now);
    assert_eq!(data.claims.exp, now + 3600);
}

#[test]
fn test_assertion_rejects_bad_key() {
    let json = json!({"client_email": "a@b.c", "private_key": "not a key"}).to_string();
    let key = ServiceAccountKey::from_json(&json).unwrap();
    let result = build_assertion(&key, ANALYTICS_READONLY_SCOPE, 0);
    assert!(matches!(result, Err(ConnectorError::Credentials(_))));
}

// =============================================================================
// Client against fake endpoints
// =============================================================================

#[tokio::test]
async fn test_run_report_with_static_token() {
    let fake = FakeGoogle::ok(sample_report());
    let recorded = fake.recorded.clone();
    let base = spawn(fake).await;
    let client = static_client(&base);

    let query = ReportQuery::detail(window(), 100).unwrap();
    let page = client.run_report(&query).await.unwrap();

    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.reported_total, Some(2));

    let recorded = recorded.lock().unwrap();
    assert!(recorded.token_requests.is_empty());
    let (path, auth, body) = &recorded.report_requests[0];
    assert_eq!(path, "/v1beta/properties/279889272:runReport");
    assert_eq!(auth.as_deref(), Some("Bearer static-token"));
    assert_eq!(body["limit"], 100);
}

#[tokio::test]
async fn test_service_account_token_is_cached() {
    let fake = FakeGoogle::ok(sample_report());
    let recorded = fake.recorded.clone();
    let base = spawn(fake).await;

    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("sa.json");
    std::fs::write(&key_path, service_account_json(&format!("{}/token", base))).unwrap();

    let client = Ga4Client::new(Ga4Config {
        property_id: "279889272".into(),
        credentials_file: key_path,
        api_url: format!("{}/v1beta", base),
        timeout_secs: 5,
        ..Default::default()
    })
    .unwrap();

    let query = ReportQuery::detail(window(), 100).unwrap();
    client.run_report(&query).await.unwrap();
    client.run_report(&query).await.unwrap();

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.token_requests.len(), 1);
    assert!(
        recorded.token_requests[0]
            .contains(&format!("grant_type={}", urlencoding::encode(JWT_BEARER_GRANT)))
    );
    assert!(recorded.token_requests[0].contains("assertion="));
    assert_eq!(recorded.report_requests.len(), 2);
    for (_, auth, _) in &recorded.report_requests {
        assert_eq!(auth.as_deref(), Some("Bearer exchanged-token"));
    }
}

#[tokio::test]
async fn test_missing_credentials_file_is_credentials_error() {
    let client = Ga4Client::new(Ga4Config {
        property_id: "279889272".into(),
        credentials_file: "/nonexistent/dash/ga4.json".into(),
        api_url: "http://127.0.0.1:9/v1beta".into(),
        timeout_secs: 1,
        ..Default::default()
    })
    .unwrap();

    let query = ReportQuery::detail(window(), 100).unwrap();
    let err = client.run_report(&query).await.unwrap_err();
    assert!(matches!(err, ProviderError::Credentials(_)));
}

#[tokio::test]
async fn test_token_endpoint_failure() {
    let mut fake = FakeGoogle::ok(sample_report());
    fake.token_status = StatusCode::BAD_REQUEST;
    let base = spawn(fake).await;

    let dir = tempfile::tempdir().unwrap();
    let key_path = dir.path().join("sa.json");
    std::fs::write(&key_path, service_account_json(&format!("{}/token", base))).unwrap();

    let client = Ga4Client::new(Ga4Config {
        property_id: "279889272".into(),
        credentials_file: key_path,
        api_url: format!("{}/v1beta", base),
        timeout_secs: 5,
        ..Default::default()
    })
    .unwrap();

    let query = ReportQuery::detail(window(), 100).unwrap();
    let err = client.run_report_once(&query).await.unwrap_err();
    assert!(matches!(err, ConnectorError::Token(ref msg) if msg.contains("400")));
}

#[tokio::test]
async fn test_permission_denied_maps_to_auth_failed() {
    let fake = FakeGoogle::failing(
        StatusCode::FORBIDDEN,
        json!({"error": {"code": 403, "message": "no access to property", "status": "PERMISSION_DENIED"}}),
    );
    let base = spawn(fake).await;
    let client = static_client(&base);

    let query = ReportQuery::detail(window(), 100).unwrap();
    let err = client.run_report_once(&query).await.unwrap_err();
    assert!(matches!(err, ConnectorError::AuthFailed(ref msg) if msg == "no access to property"));
}

#[tokio::test]
async fn test_quota_exhausted_maps_to_rate_limited() {
    let mut fake = FakeGoogle::failing(
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": {"code": 429, "message": "quota exhausted"}}),
    );
    fake.retry_after = Some("7");
    let base = spawn(fake).await;
    let client = static_client(&base);

    let query = ReportQuery::detail(window(), 100).unwrap();
    let err = client.run_report_once(&query).await.unwrap_err();
    assert!(matches!(err, ConnectorError::RateLimited { retry_after_secs: 7 }));
}

#[tokio::test]
async fn test_server_error_surfaces_status_to_engine() {
    let fake = FakeGoogle::failing(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": {"code": 500, "message": "backend error"}}),
    );
    let base = spawn(fake).await;
    let client = static_client(&base);

    let query = ReportQuery::detail(window(), 100).unwrap();
    let err = client.run_report(&query).await.unwrap_err();
    match err {
        ProviderError::Status { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "backend error");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
