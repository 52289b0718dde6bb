//! CLI entry point for the transaction metrics tool.
//!
//! Provides subcommands for a one-off report over a date range, the
//! succeeded/failed breakdown, and a refresh loop that re-summarizes a
//! periodically reloaded snapshot.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use txn_metrics::{
    MetricsError,
    config::SourceSchema,
    engine::breakdown_by_outcome,
    fetch::SourceSnapshot,
    model::{DateRange, Granularity, RawSeries},
    output::{SummaryRow, append_summary, print_json, print_pretty, write_series},
    report::{MetricsReport, build_report},
    store::{SeriesStore, filter},
};

#[derive(Parser)]
#[command(name = "txn_metrics")]
#[command(about = "Transaction count time-series and KPI summaries", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Path to a JSON/CSV file or URL to fetch (falls back to TXN_METRICS_SOURCE)
    #[arg(value_name = "FILE_OR_URL")]
    source: Option<String>,

    /// JSON file mapping upstream field names
    #[arg(long)]
    schema: Option<String>,
}

#[derive(Args)]
struct RangeArgs {
    /// First day to include (defaults to the first day in the data)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day to include (defaults to the last day in the data)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Display granularity
    #[arg(short, long, value_enum, default_value_t = Granularity::Day)]
    granularity: Granularity,
}

#[derive(Subcommand)]
enum Commands {
    /// Resample a date range and compute its KPI summary
    Report {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        range: RangeArgs,

        /// CSV file to write the resampled series to
        #[arg(long)]
        series_csv: Option<String>,

        /// CSV file to append the KPI summary to
        #[arg(long)]
        summary_csv: Option<String>,

        /// Log the full report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Succeeded/failed counts and success rate per bucket
    Breakdown {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        range: RangeArgs,

        /// Upstream boolean field holding the outcome (overrides the schema file)
        #[arg(long)]
        outcome_field: Option<String>,
    },
    /// Reload the snapshot on an interval and log the KPI summary each round
    Watch {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        range: RangeArgs,

        /// Seconds between snapshot refreshes
        #[arg(short = 'r', long, default_value_t = 3600)]
        refresh_secs: u64,

        /// Number of refresh rounds (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 1)]
        num_refreshes: usize,

        /// CSV file to append each round's KPI summary to
        #[arg(long)]
        summary_csv: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/txn_metrics.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("txn_metrics.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            source,
            range,
            series_csv,
            summary_csv,
            json,
        } => {
            let provider = snapshot_provider(&source, None)?;
            let mut store = SeriesStore::empty();
            let series = store.refresh(&provider).await?;

            let Some(report) = run_query(&series, &range)? else {
                return Ok(());
            };

            log_kpis(&report);
            print_pretty(&report);
            if json {
                print_json(&report)?;
            }
            if let Some(path) = series_csv {
                write_series(&path, &report.series)?;
                info!(path = %path, buckets = report.series.len(), "Series written");
            }
            if let Some(path) = summary_csv {
                append_summary(&path, &SummaryRow::from(&report))?;
            }
        }
        Commands::Breakdown {
            source,
            range,
            outcome_field,
        } => {
            let provider = snapshot_provider(&source, outcome_field)?;
            let mut store = SeriesStore::empty();
            let series = store.refresh(&provider).await?;

            let date_range = resolve_range(&series, &range)?;
            let filtered = filter(&series, date_range);

            match breakdown_by_outcome(&filtered, range.granularity) {
                Ok((succeeded, failed, success_rate)) => {
                    for point in success_rate.points() {
                        info!(
                            bucket_start = %point.bucket_start,
                            succeeded = point.succeeded,
                            failed = point.failed,
                            success_rate = point.success_rate,
                            has_outcomes = point.has_outcomes,
                            "Outcome bucket"
                        );
                    }
                    info!(
                        succeeded = succeeded.total(),
                        failed = failed.total(),
                        buckets = success_rate.len(),
                        "Outcome breakdown summary"
                    );
                }
                Err(MetricsError::EmptyInput) => {
                    warn!("No outcome-labeled transactions in range; is an outcome field configured?");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Watch {
            source,
            range,
            refresh_secs,
            num_refreshes,
            summary_csv,
        } => {
            watch(&source, &range, refresh_secs, num_refreshes, summary_csv).await?;
        }
    }

    Ok(())
}

fn snapshot_provider(args: &SourceArgs, outcome_field: Option<String>) -> Result<SourceSnapshot> {
    let source = match &args.source {
        Some(source) => source.clone(),
        None => std::env::var("TXN_METRICS_SOURCE")
            .context("no source given and TXN_METRICS_SOURCE is not set")?,
    };

    let mut schema = SourceSchema::load_or_default(args.schema.as_deref())?;
    if let Some(field) = outcome_field {
        schema = schema.with_outcome_field(field);
    }

    Ok(SourceSnapshot::new(source, schema))
}

/// Fills unset range ends from the snapshot's first and last day.
fn resolve_range(series: &RawSeries, args: &RangeArgs) -> Result<DateRange> {
    let start = args
        .start
        .or_else(|| series.first_date())
        .ok_or(MetricsError::EmptyInput)?;
    let end = args
        .end
        .or_else(|| series.last_date())
        .ok_or(MetricsError::EmptyInput)?;

    Ok(DateRange::new(start, end)?)
}

/// Builds the report, turning "no data in range" into an empty state instead of a failure.
fn run_query(series: &RawSeries, args: &RangeArgs) -> Result<Option<MetricsReport>> {
    let range = resolve_range(series, args)?;
    match build_report(series, range, args.granularity) {
        Ok(report) => Ok(Some(report)),
        Err(MetricsError::EmptyInput) => {
            warn!(start = %range.start(), end = %range.end(), "No transactions in range");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn log_kpis(report: &MetricsReport) {
    let kpis = &report.kpis;
    info!(
        total = kpis.total,
        average_daily_change_pct = %format!("{:.2}", kpis.average_daily_change_pct),
        throughput_per_second = %format!("{:.4}", kpis.throughput_per_second),
        average_daily_count = %format!("{:.2}", kpis.average_daily_count),
        median_daily_count = %format!("{:.2}", kpis.median_daily_count),
        max_daily_count = kpis.max_daily_count,
        "Key metrics"
    );
}

/// Refreshes the snapshot every `refresh_secs`, keeping the last good snapshot
/// when a refresh fails.
#[tracing::instrument(skip(source, range, summary_csv))]
async fn watch(
    source: &SourceArgs,
    range: &RangeArgs,
    refresh_secs: u64,
    num_refreshes: usize,
    summary_csv: Option<String>,
) -> Result<()> {
    let provider = snapshot_provider(source, None)?;
    let mut store = SeriesStore::empty();
    let mut round = 0;

    if num_refreshes == 0 {
        info!(refresh_secs, "Refreshing indefinitely. Press Ctrl+C to stop.");
    }

    loop {
        if num_refreshes > 0 && round >= num_refreshes {
            break;
        }
        round += 1;

        if let Err(e) = store.refresh(&provider).await {
            error!(round, error = %e, "Snapshot refresh failed");
        }

        match store.load() {
            Ok(series) => {
                if let Some(report) = run_query(&series, range)? {
                    log_kpis(&report);
                    if let Some(path) = &summary_csv {
                        if let Err(e) = append_summary(path, &SummaryRow::from(&report)) {
                            error!(path = %path, error = %e, "Failed to append summary");
                        }
                    }
                }
            }
            Err(e) => warn!(round, error = %e, "No snapshot to summarize yet"),
        }

        if num_refreshes == 0 || round < num_refreshes {
            info!(refresh_secs, "Waiting before next refresh");
            tokio::time::sleep(Duration::from_secs(refresh_secs)).await;
        }
    }

    info!(rounds = round, source = provider.source(), "Finished watching");
    Ok(())
}
