//! Operations routes
//!
//! Banner, health check and version endpoints for monitoring.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Service name shown by the banner
pub const SERVICE_NAME: &str = "Dash Marketing API";

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    /// Crate version
    pub version: &'static str,
    /// Seconds since the server started
    pub uptime_secs: u64,
}

/// Operations routes (banner, health, version)
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
}

/// GET /
async fn root_handler() -> String {
    format!(
        "{} is up. Exports at /exportar and /exportar_mensual.",
        SERVICE_NAME
    )
}

/// Health check endpoint
///
/// GET /health
///
/// Always returns 200 `ok` while the process is serving.
async fn health_handler() -> &'static str {
    "ok"
}

/// GET /version
async fn version_handler(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
    })
}
