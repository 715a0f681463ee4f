//! Tests for report query construction

use chrono::NaiveDate;

use crate::builder::{
    AUDIT_METRICS, DETAIL_DIMENSIONS, DETAIL_METRICS, MAX_PAGE_SIZE, QueryBuilder, ReportQuery,
};
use crate::error::AnalyticsError;
use crate::window::DateWindow;

fn window() -> DateWindow {
    DateWindow::new(
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
    )
    .unwrap()
}

#[test]
fn test_detail_query_uses_fixed_fields() {
    let query = ReportQuery::detail(window(), 10_000).unwrap();

    assert_eq!(query.dimensions, DETAIL_DIMENSIONS);
    assert_eq!(query.metrics, DETAIL_METRICS);
    assert_eq!(query.page_size, 10_000);
    assert_eq!(query.offset, 0);
    assert_eq!(query.window, window());
}

#[test]
fn test_detail_query_sorts_on_full_dimension_tuple() {
    let query = ReportQuery::detail(window(), 500).unwrap();
    assert_eq!(query.sort_keys, query.dimensions);
}

#[test]
fn test_page_size_bounds() {
    assert!(ReportQuery::detail(window(), 1).is_ok());
    assert!(ReportQuery::detail(window(), MAX_PAGE_SIZE).is_ok());

    assert!(matches!(
        ReportQuery::detail(window(), 0),
        Err(AnalyticsError::InvalidPageSize { size: 0, .. })
    ));
    assert!(matches!(
        ReportQuery::detail(window(), MAX_PAGE_SIZE + 1),
        Err(AnalyticsError::InvalidPageSize { .. })
    ));
}

#[test]
fn test_builder_requires_metrics() {
    let result = QueryBuilder::new(window()).dimensions(&["date"]).build();
    assert!(matches!(result, Err(AnalyticsError::InvalidQuery(_))));
}

#[test]
fn test_aggregate_query_has_no_dimensions() {
    let query = ReportQuery::aggregate(window());

    assert!(query.dimensions.is_empty());
    assert!(query.sort_keys.is_empty());
    assert_eq!(query.metrics, AUDIT_METRICS);
    assert_eq!(query.window, window());
}

#[test]
fn test_audit_metrics_are_detail_metrics() {
    for metric in AUDIT_METRICS {
        assert!(
            DETAIL_METRICS.contains(metric),
            "{} must be exported to be audited",
            metric
        );
    }
}

#[test]
fn test_advance_accumulates_offset() {
    let mut query = ReportQuery::detail(window(), 100).unwrap();
    query.advance(100);
    query.advance(100);
    query.advance(37);
    assert_eq!(query.offset, 237);
}

#[test]
fn test_for_window_resets_offset() {
    let mut query = ReportQuery::detail(window(), 100).unwrap();
    query.advance(300);

    let april = DateWindow::new(
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
    )
    .unwrap();
    let next = query.for_window(april);

    assert_eq!(next.offset, 0);
    assert_eq!(next.window, april);
    assert_eq!(next.page_size, 100);
    assert_eq!(next.dimensions, query.dimensions);
}
