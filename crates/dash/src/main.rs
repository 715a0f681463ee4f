//! Dash - GA4 export service
//!
//! # Usage
//!
//! ```bash
//! # Run the HTTP API (default)
//! dash
//! dash --config configs/dash.toml
//! dash serve --port 9000
//!
//! # One-off export to CSV
//! dash export --start 2024-01-01 --end 2024-03-31 --monthly --output q1.csv
//! ```

mod cmd;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dash_config::{Config, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Dash - GA4 export service with pagination and aggregate audit
#[derive(Parser, Debug)]
#[command(name = "dash")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides LOG_LEVEL and the config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve(cmd::serve::ServeArgs),

    /// Export a date range to CSV or JSON
    Export(cmd::export::ExportArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("failed to load config from {}", path.display()),
        None => "failed to load config from environment".to_string(),
    })?;

    let log_level = resolve_log_level(cli.log_level.as_deref(), &config);
    init_logging(&log_level, config.log.format)?;

    match cli.command {
        Some(Command::Serve(args)) => cmd::serve::run(config, args).await,
        Some(Command::Export(args)) => cmd::export::run(config, args).await,
        // No subcommand = run server (default behavior)
        None => cmd::serve::run(config, cmd::serve::ServeArgs::default()).await,
    }
}

/// Resolve log level: CLI flag > LOG_LEVEL / config file > default "info"
///
/// `Config::load` has already applied `LOG_LEVEL` over the file value.
fn resolve_log_level(cli_level: Option<&str>, config: &Config) -> String {
    match cli_level {
        Some(level) => level.to_string(),
        None => config.log.level.as_str().to_string(),
    }
}

/// Initialize the tracing subscriber for logging
///
/// Logs go to stderr so `dash export` can write data to stdout.
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Console => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }

    Ok(())
}
