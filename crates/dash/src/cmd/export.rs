//! Export command - Run one export without the HTTP server
//!
//! Writes the rows as CSV (one column per dimension and metric) or the full
//! buffered JSON result, and logs the audit block.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, ValueEnum};
use dash_analytics::{DETAIL_DIMENSIONS, DETAIL_METRICS, DateWindow, ExportPlan, ExportResult};
use dash_config::Config;
use tracing::{info, warn};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Header row plus one line per row; unparseable metrics are empty cells
    Csv,
    /// Same document the `/exportar` endpoint returns
    Json,
}

/// Export command arguments
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// First day (YYYY-MM-DD)
    #[arg(long)]
    pub start: String,

    /// Last day (YYYY-MM-DD)
    #[arg(long)]
    pub end: String,

    /// Paginate each calendar month separately
    #[arg(long)]
    pub monthly: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Rows per page
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100_000))]
    pub page_size: Option<u32>,

    /// Page cap per window
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=2_000))]
    pub max_pages: Option<u32>,
}

/// Run the export command
pub async fn run(config: Config, args: ExportArgs) -> Result<()> {
    let plan = build_plan(&config, &args, Local::now().date_naive())?;
    let exporter = dash_analytics::Exporter::new(super::ga4_provider(&config)?);

    let result = exporter
        .buffered(&plan)
        .await
        .with_context(|| format!("export {} failed", plan.window))?;

    log_audit(&result);

    let out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(out);

    match args.format {
        OutputFormat::Csv => write_csv(&result, &mut out)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &result).context("failed to encode JSON")?;
            writeln!(out)?;
        }
    }
    out.flush().context("failed to flush output")?;

    if let Some(path) = &args.output {
        info!(path = %path.display(), rows = result.summary.row_count, "export written");
    }
    Ok(())
}

fn build_plan(config: &Config, args: &ExportArgs, today: NaiveDate) -> Result<ExportPlan> {
    let defaults = &config.export;
    let window = DateWindow::clamped(&args.start, &args.end, defaults.floor_date, today)
        .context("invalid date range")?;

    let (plan, default_page_size) = if args.monthly {
        (ExportPlan::monthly(window), defaults.monthly_page_size)
    } else {
        (ExportPlan::single(window), defaults.page_size)
    };

    Ok(plan
        .with_page_size(args.page_size.unwrap_or(default_page_size))
        .with_max_pages(args.max_pages.unwrap_or(defaults.max_pages))
        .with_backoff(Duration::from_millis(defaults.backoff_ms)))
}

/// Header is every dimension then every metric, in query order
fn write_csv<W: Write>(result: &ExportResult, out: W) -> Result<()> {
    let columns: Vec<&str> = DETAIL_DIMENSIONS
        .iter()
        .chain(DETAIL_METRICS.iter())
        .copied()
        .collect();

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&columns)?;
    for row in &result.rows {
        writer.write_record(
            columns
                .iter()
                .map(|name| row.get(name).map(|v| v.to_cell()).unwrap_or_default()),
        )?;
    }
    writer.flush()?;
    Ok(())
}

fn log_audit(result: &ExportResult) {
    let summary = &result.summary;
    info!(
        start = %summary.start,
        end = %summary.end,
        rows = summary.row_count,
        pages = summary.pages,
        truncated = summary.truncated,
        reported = ?summary.reported_row_count,
        "export complete"
    );

    let Some(audit) = &summary.audit else {
        return;
    };
    for (metric, detail) in &audit.detail_totals {
        let aggregate = audit.aggregate_totals.get(metric).copied().unwrap_or(0.0);
        let diff = audit.relative_difference.get(metric).copied().flatten();
        info!(metric, detail, aggregate, diff = ?diff, "audit");
    }

    let undefined = audit.undefined_metrics();
    if !undefined.is_empty() {
        warn!(metrics = ?undefined, "aggregate is zero but rows are not");
    }
    if summary.truncated {
        warn!("export is truncated; raise --max-pages or narrow the range");
    }
}
