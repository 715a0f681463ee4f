//! Serve command - Run the HTTP API
//!
//! Binds `[api_server]`, wires the GA4 provider into the router and serves
//! until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use clap::Args;
use dash_api::{AppState, build_router};
use dash_config::{ApiServerConfig, Config};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Serve command arguments
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Host to bind (overrides HOST and the config file)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides PORT and the config file)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Run the serve command
pub async fn run(config: Config, args: ServeArgs) -> Result<()> {
    let mut server = config.api_server.clone();
    if let Some(host) = args.host {
        server.host = host;
    }
    if let Some(port) = args.port {
        server.port = port;
    }

    let provider = super::ga4_provider(&config)?;
    let state = AppState::new(provider, config.export.clone());

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&server)?);

    let addr = server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind API server to {}", addr))?;

    info!(
        addr = %addr,
        property_id = %config.ga4.property_id,
        floor_date = %config.export.floor_date,
        cors_any = server.allows_any_origin(),
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await
        .context("API server error")?;

    info!("Dash shutdown complete");
    Ok(())
}

/// CORS from `cors_allow_origins`; `*` (or an empty list) allows any origin
fn cors_layer(server: &ApiServerConfig) -> Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if server.allows_any_origin() {
        return Ok(layer.allow_origin(Any));
    }

    let origins = server
        .cors_allow_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("invalid CORS origin '{}'", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(layer.allow_origin(origins))
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, stopping server...");
}
