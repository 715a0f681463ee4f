//! Export routes
//!
//! - `GET /exportar` - whole range as one window
//! - `GET /exportar_mensual` - one window per calendar month
//! - `GET /exportar/stream`, `GET /exportar_mensual/stream` - same exports,
//!   rows streamed as they are fetched
//!
//! Buffered exports answer only once every page and the audit are done.
//! Streamed exports answer as soon as the first page is in; a failure after
//! that point ends the body with an `error` field instead of a status code.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use dash_analytics::{ExportStream, SplitMode};
use futures_util::{StreamExt, stream};
use tracing::info;

use crate::error::Result;
use crate::state::AppState;
use crate::types::ExportParams;

/// Build the export router
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/exportar", get(export_single))
        .route("/exportar_mensual", get(export_monthly))
        .route("/exportar/stream", get(stream_single))
        .route("/exportar_mensual/stream", get(stream_monthly))
}

/// GET /exportar
async fn export_single(
    State(state): State<AppState>,
    params: std::result::Result<Query<ExportParams>, QueryRejection>,
) -> Result<Response> {
    buffered(state, params?.0, SplitMode::Single).await
}

/// GET /exportar_mensual
async fn export_monthly(
    State(state): State<AppState>,
    params: std::result::Result<Query<ExportParams>, QueryRejection>,
) -> Result<Response> {
    buffered(state, params?.0, SplitMode::Monthly).await
}

/// GET /exportar/stream
async fn stream_single(
    State(state): State<AppState>,
    params: std::result::Result<Query<ExportParams>, QueryRejection>,
) -> Result<Response> {
    streamed(state, params?.0, SplitMode::Single).await
}

/// GET /exportar_mensual/stream
async fn stream_monthly(
    State(state): State<AppState>,
    params: std::result::Result<Query<ExportParams>, QueryRejection>,
) -> Result<Response> {
    streamed(state, params?.0, SplitMode::Monthly).await
}

async fn buffered(state: AppState, params: ExportParams, split: SplitMode) -> Result<Response> {
    let plan = params.to_plan(&state, split)?;
    info!(window = %plan.window, split = ?split, "buffered export requested");

    let result = state.exporter.buffered(&plan).await?;
    Ok(([(header::CACHE_CONTROL, "no-store")], Json(result)).into_response())
}

async fn streamed(state: AppState, params: ExportParams, split: SplitMode) -> Result<Response> {
    let plan = params.to_plan(&state, split)?;
    info!(window = %plan.window, split = ?split, "streamed export requested");

    let export = state.exporter.stream(plan).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        Body::from_stream(body_stream(export)),
    )
        .into_response())
}

/// First chunk, then whatever the export task sends until it closes the channel
fn body_stream(
    export: ExportStream,
) -> impl futures_util::Stream<Item = std::result::Result<Bytes, Infallible>> + Send + 'static {
    let (first, rx) = export.into_parts();
    let rest = stream::unfold(rx, |mut rx| async move {
        let chunk = rx.recv().await?;
        Some((Ok::<_, Infallible>(chunk), rx))
    });
    stream::once(async move { Ok::<_, Infallible>(first) }).chain(rest)
}
