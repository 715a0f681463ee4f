//! Dash API
//!
//! HTTP API for GA4 exports.
//!
//! # Overview
//!
//! This crate provides the REST surface of the export service. It's built on
//! Axum and drives the `dash-analytics` export engine through whatever
//! [`ReportProvider`](dash_analytics::ReportProvider) the binary wires in.
//!
//! # Usage
//!
//! ```ignore
//! use dash_api::{build_router, AppState};
//!
//! let state = AppState::new(Arc::new(ga4_client), config.export.clone());
//! let app = build_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! axum::serve(listener, app).await?;
//! ```
//!
//! # Endpoints
//!
//! ## Exports
//! - `GET /exportar?start&end[&page_size][&max_pages][&sleep_ms]` - one window
//! - `GET /exportar_mensual?start&end[&page_size][&max_pages][&sleep_ms]` -
//!   one window per calendar month
//! - `GET /exportar/stream`, `GET /exportar_mensual/stream` - streamed bodies
//!
//! ## Operations
//! - `GET /` - banner
//! - `GET /health` - liveness
//! - `GET /version` - crate version and uptime
//!
//! Errors are JSON: `{"error": "<message>", "code": "<CODE>"}`.

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

// Re-exports
pub use error::{ApiError, Result};
pub use routes::build_router;
pub use state::AppState;
pub use types::ExportParams;
