//! Tests for export orchestration

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::Value;

use crate::builder::{DETAIL_DIMENSIONS, DETAIL_METRICS};
use crate::error::{AnalyticsError, ProviderError};
use crate::export::{ExportPlan, Exporter, SplitMode};
use crate::provider::RawRow;
use crate::test_utils::{FakeProvider, daily_rows};
use crate::window::DateWindow;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn march() -> DateWindow {
    DateWindow::new(date(2024, 3, 1), date(2024, 3, 31)).unwrap()
}

fn exporter(provider: &Arc<FakeProvider>) -> Exporter {
    Exporter::new(provider.clone())
}

async fn stream_body(exporter: &Exporter, plan: ExportPlan) -> Result<Value, AnalyticsError> {
    let stream = exporter.stream(plan).await?;
    let (first, mut rest) = stream.into_parts();

    let mut body = first.to_vec();
    while let Some(chunk) = rest.recv().await {
        body.extend_from_slice(&chunk);
    }
    Ok(serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_single_row_round_trip() {
    let mut dims = vec![String::new(); DETAIL_DIMENSIONS.len()];
    dims[0] = "2024-03-01".to_string();
    dims[1] = "US".to_string();
    let mut mets = vec![String::new(); DETAIL_METRICS.len()];
    mets[0] = "8".to_string();
    mets[2] = "10".to_string();

    let provider = Arc::new(FakeProvider::new(vec![RawRow::new(dims, mets)]));
    let plan = ExportPlan::single(march()).with_backoff(Duration::ZERO);

    let result = exporter(&provider).buffered(&plan).await.unwrap();

    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.summary.row_count, 1);
    assert_eq!(result.summary.pages, 1);
    assert!(!result.summary.truncated);

    let audit = result.summary.audit.as_ref().unwrap();
    assert_eq!(audit.detail_totals["sessions"], 10.0);
    assert_eq!(audit.detail_totals["activeUsers"], 8.0);
    assert_eq!(audit.relative_difference["sessions"], Some(0.0));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["rows"][0]["country"], "US");
    assert_eq!(json["rows"][0]["sessions"], 10.0);
    assert!(json["rows"][0]["newUsers"].is_null());
    assert_eq!(json["rowCount"], 1);
    assert_eq!(json["start"], "2024-03-01");
    assert_eq!(json["end"], "2024-03-31");
    assert_eq!(json["pages"], 1);
    assert_eq!(json["truncated"], false);
    assert_eq!(json["reportedRowCount"], 1);
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn test_monthly_split_paginates_each_month() {
    let window = DateWindow::new(date(2024, 1, 15), date(2024, 3, 10)).unwrap();
    let provider = Arc::new(FakeProvider::new(daily_rows(window.start, window.end, 1)));
    let plan = ExportPlan::monthly(window)
        .with_page_size(7)
        .with_backoff(Duration::ZERO);

    let result = exporter(&provider).buffered(&plan).await.unwrap();

    // 17 + 29 + 10 days
    assert_eq!(result.summary.row_count, 56);
    assert_eq!(result.summary.pages, 3 + 5 + 2);
    assert!(!result.summary.truncated);
    assert_eq!(result.summary.reported_row_count, Some(56));

    let mut windows: Vec<DateWindow> = provider
        .detail_calls()
        .iter()
        .map(|q| q.window)
        .collect();
    windows.dedup();
    assert_eq!(
        windows,
        vec![
            DateWindow::new(date(2024, 1, 15), date(2024, 1, 31)).unwrap(),
            DateWindow::new(date(2024, 2, 1), date(2024, 2, 29)).unwrap(),
            DateWindow::new(date(2024, 3, 1), date(2024, 3, 10)).unwrap(),
        ]
    );

    let dates: Vec<String> = result
        .rows
        .iter()
        .map(|r| r.get("date").unwrap().to_cell())
        .collect();
    let mut sorted = dates.clone();
    sorted.sort();
    assert_eq!(dates, sorted);
}

#[tokio::test]
async fn test_monthly_offsets_restart_per_window() {
    let window = DateWindow::new(date(2024, 1, 30), date(2024, 2, 2)).unwrap();
    let provider = Arc::new(FakeProvider::new(daily_rows(window.start, window.end, 3)));
    let plan = ExportPlan::monthly(window)
        .with_page_size(4)
        .with_backoff(Duration::ZERO);

    exporter(&provider).buffered(&plan).await.unwrap();

    let offsets: Vec<u64> = provider.detail_calls().iter().map(|q| q.offset).collect();
    assert_eq!(offsets, vec![0, 4, 0, 4]);
}

#[tokio::test]
async fn test_monthly_cap_is_per_window() {
    let window = DateWindow::new(date(2024, 1, 1), date(2024, 2, 29)).unwrap();
    let provider = Arc::new(FakeProvider::new(daily_rows(window.start, window.end, 1)));
    let plan = ExportPlan::monthly(window)
        .with_page_size(10)
        .with_max_pages(1)
        .with_backoff(Duration::ZERO);

    let result = exporter(&provider).buffered(&plan).await.unwrap();

    assert_eq!(result.summary.pages, 2);
    assert_eq!(result.summary.row_count, 20);
    assert!(result.summary.truncated);
}

#[tokio::test]
async fn test_single_plan_cap_truncates() {
    let provider = Arc::new(FakeProvider::endless());
    let plan = ExportPlan::single(march())
        .with_page_size(5)
        .with_max_pages(3)
        .with_backoff(Duration::ZERO);

    let result = exporter(&provider).buffered(&plan).await.unwrap();

    assert_eq!(result.summary.pages, 3);
    assert_eq!(result.summary.row_count, 15);
    assert!(result.summary.truncated);
    assert_eq!(provider.detail_calls().len(), 3);
}

#[tokio::test]
async fn test_audit_runs_once_over_full_window() {
    let window = DateWindow::new(date(2024, 1, 15), date(2024, 3, 10)).unwrap();
    let provider = Arc::new(FakeProvider::new(daily_rows(window.start, window.end, 2)));
    let plan = ExportPlan::monthly(window).with_backoff(Duration::ZERO);

    let result = exporter(&provider).buffered(&plan).await.unwrap();

    let aggregates = provider.aggregate_calls();
    assert_eq!(aggregates.len(), 1);
    assert_eq!(aggregates[0].window, window);

    let audit = result.summary.audit.unwrap();
    assert_eq!(audit.detail_totals["sessions"], 112.0);
    assert_eq!(audit.aggregate_totals["sessions"], 112.0);
}

#[tokio::test]
async fn test_empty_export() {
    let provider = Arc::new(FakeProvider::new(Vec::new()));
    let plan = ExportPlan::single(march());

    let result = exporter(&provider).buffered(&plan).await.unwrap();

    assert!(result.rows.is_empty());
    assert_eq!(result.summary.pages, 0);
    assert!(!result.summary.truncated);
    assert_eq!(provider.detail_calls().len(), 1);
}

#[tokio::test]
async fn test_invalid_page_size_makes_no_calls() {
    let provider = Arc::new(FakeProvider::new(Vec::new()));
    let plan = ExportPlan::single(march()).with_page_size(0);

    let err = exporter(&provider).buffered(&plan).await.unwrap_err();

    assert!(err.is_invalid_input());
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_buffered_failure_aborts_export() {
    let rows = daily_rows(date(2024, 3, 1), date(2024, 3, 1), 25);
    let provider = Arc::new(FakeProvider::new(rows).failing_on_call(2));
    let plan = ExportPlan::single(march())
        .with_page_size(10)
        .with_backoff(Duration::ZERO);

    let err = exporter(&provider).buffered(&plan).await.unwrap_err();

    assert!(matches!(err, AnalyticsError::Provider(ProviderError::Status { .. })));
    assert_eq!(provider.calls().len(), 2);
}

#[tokio::test]
async fn test_streamed_and_buffered_bodies_match() {
    let window = DateWindow::new(date(2024, 2, 27), date(2024, 3, 2)).unwrap();
    let provider = Arc::new(FakeProvider::new(daily_rows(window.start, window.end, 3)));
    let plan = ExportPlan::monthly(window)
        .with_page_size(4)
        .with_backoff(Duration::ZERO);

    let buffered = exporter(&provider).buffered(&plan).await.unwrap();
    let streamed = stream_body(&exporter(&provider), plan).await.unwrap();

    assert_eq!(serde_json::to_value(&buffered).unwrap(), streamed);
    assert_eq!(streamed["rows"].as_array().unwrap().len(), 15);
}

#[tokio::test]
async fn test_stream_failure_on_first_page_is_an_error() {
    let rows = daily_rows(date(2024, 3, 1), date(2024, 3, 1), 5);
    let provider = Arc::new(FakeProvider::new(rows).failing_on_call(1));
    let plan = ExportPlan::single(march()).with_backoff(Duration::ZERO);

    let err = stream_body(&exporter(&provider), plan).await.unwrap_err();

    assert!(matches!(err, AnalyticsError::Provider(_)));
}

#[tokio::test]
async fn test_stream_failure_mid_export_closes_document() {
    let rows = daily_rows(date(2024, 3, 1), date(2024, 3, 1), 25);
    let provider = Arc::new(FakeProvider::new(rows).failing_on_call(3));
    let plan = ExportPlan::single(march())
        .with_page_size(10)
        .with_backoff(Duration::ZERO);

    let doc = stream_body(&exporter(&provider), plan).await.unwrap();

    assert_eq!(doc["rows"].as_array().unwrap().len(), 20);
    assert_eq!(doc["rowCount"], 20);
    assert_eq!(doc["pages"], 2);
    assert_eq!(doc["truncated"], true);
    assert!(doc["audit"].is_null());
    assert!(doc["error"].as_str().unwrap().contains("503"));
}

#[test]
fn test_plan_defaults() {
    let single = ExportPlan::single(march());
    assert_eq!(single.split, SplitMode::Single);
    assert_eq!(single.page_size, 10_000);
    assert_eq!(single.max_pages, 200);
    assert_eq!(single.backoff, Duration::from_millis(150));
    assert_eq!(single.windows(), vec![march()]);

    let monthly = ExportPlan::monthly(march());
    assert_eq!(monthly.split, SplitMode::Monthly);
    assert_eq!(monthly.page_size, 25_000);
}
