//! API routes
//!
//! Operations endpoints plus the export endpoints.

pub mod export;
pub mod ops;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Operations routes (banner, health, version)
        .merge(ops::routes())
        // Export routes (buffered and streamed)
        .merge(export::routes())
        .with_state(state)
}
