//! Output formatting and persistence for metrics reports.
//!
//! Supports pretty-printing, JSON serialization, a per-query series CSV, and an
//! appended KPI summary CSV.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::model::{Granularity, ResampledSeries};
use crate::report::MetricsReport;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// One KPI summary row, flattened for CSV.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub generated_at: DateTime<Utc>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub granularity: Granularity,
    pub total: u64,
    pub average_daily_change_pct: f64,
    pub throughput_per_second: f64,
    pub average_daily_count: f64,
    pub median_daily_count: f64,
    pub max_daily_count: u64,
}

impl From<&MetricsReport> for SummaryRow {
    fn from(report: &MetricsReport) -> Self {
        Self {
            generated_at: report.generated_at,
            start: report.range.start(),
            end: report.range.end(),
            granularity: report.granularity,
            total: report.kpis.total,
            average_daily_change_pct: report.kpis.average_daily_change_pct,
            throughput_per_second: report.kpis.throughput_per_second,
            average_daily_count: report.kpis.average_daily_count,
            median_daily_count: report.kpis.median_daily_count,
            max_daily_count: report.kpis.max_daily_count,
        }
    }
}

/// Logs a report using Rust's debug pretty-print format.
pub fn print_pretty(report: &MetricsReport) {
    debug!("{:#?}", report);
}

/// Logs a report as pretty-printed JSON.
pub fn print_json(report: &MetricsReport) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Writes every bucket of `series` to a CSV file, replacing any previous content.
pub fn write_series(path: &str, series: &ResampledSeries) -> Result<()> {
    debug!(path, buckets = series.len(), "Writing series CSV");

    let mut writer = WriterBuilder::new().has_headers(true).from_path(path)?;
    for bucket in series.buckets() {
        writer.serialize(bucket)?;
    }
    writer.flush()?;

    Ok(())
}

/// Appends a [`SummaryRow`] to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_summary(path: &str, row: &SummaryRow) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending summary CSV row");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(row)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DateRange, EventRecord, RawSeries};
    use crate::report::build_report;
    use chrono::TimeZone;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    fn report() -> MetricsReport {
        let series = RawSeries::from_records(vec![
            EventRecord::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), 100),
            EventRecord::new(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(), 150),
        ]);
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        )
        .unwrap();
        build_report(&series, range, Granularity::Day).unwrap()
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&report());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&report()).unwrap();
    }

    #[test]
    fn test_write_series_one_row_per_bucket() {
        let path = temp_path("txn_metrics_test_series.csv");
        let _ = fs::remove_file(&path);

        write_series(&path, &report().series).unwrap();
        write_series(&path, &report().series).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("cumulative_count"));
        assert!(lines[2].contains(",150,250,"));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_summary_writes_header_once() {
        let path = temp_path("txn_metrics_test_summary_header.csv");
        let _ = fs::remove_file(&path);

        let row = SummaryRow::from(&report());
        append_summary(&path, &row).unwrap();
        append_summary(&path, &row).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        // Header line should appear exactly once
        let header_count = content.lines().filter(|l| l.contains("generated_at")).count();
        assert_eq!(header_count, 1);
        assert_eq!(content.lines().count(), 3);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_summary_row_flattens_kpis() {
        let row = SummaryRow::from(&report());
        assert_eq!(row.total, 250);
        assert_eq!(row.max_daily_count, 150);
        assert_eq!(row.granularity, Granularity::Day);
    }
}
