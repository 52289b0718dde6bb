//! Summary statistics over a daily series.

use tracing::debug;

use crate::engine::resample::fill_missing_buckets;
use crate::engine::utility::{mean, median};
use crate::error::MetricsError;
use crate::model::{Granularity, KpiSummary, ResampledSeries, SECONDS_PER_DAY};

/// Computes the KPI summary from `resample(filtered, Granularity::Day)`.
///
/// Missing days between the first and last bucket that hold data count as zero.
/// Those bounds come from the data, not from the requested range: empty days
/// before the first or after the last bucket are not added. Throughput is `0`
/// for a single-day span, and change pairs with a zero predecessor are left out of
/// the average change.
///
/// # Errors
///
/// Returns [`MetricsError::EmptyInput`] if `daily_series` has no buckets.
#[tracing::instrument(skip(daily_series), fields(buckets = daily_series.len()))]
pub fn compute_kpis(daily_series: &ResampledSeries) -> Result<KpiSummary, MetricsError> {
    let daily = fill_missing_buckets(daily_series, Granularity::Day);
    let (Some(first), Some(last)) = (daily.buckets().first(), daily.buckets().last()) else {
        return Err(MetricsError::EmptyInput);
    };

    let total = daily.total();
    let counts: Vec<f64> = daily.buckets().iter().map(|b| b.count as f64).collect();
    let max_daily_count = daily.buckets().iter().map(|b| b.count).max().unwrap_or(0);

    let span_days = (last.bucket_start - first.bucket_start).num_days();
    let throughput_per_second = if span_days > 0 {
        total as f64 / (span_days as f64 * SECONDS_PER_DAY)
    } else {
        0.0
    };

    let changes = daily_changes_pct(&daily);
    debug!(
        days = daily.len(),
        span_days,
        change_pairs = changes.len(),
        "Computed daily KPI inputs"
    );

    Ok(KpiSummary {
        total,
        average_daily_change_pct: mean(&changes),
        throughput_per_second,
        average_daily_count: mean(&counts),
        median_daily_count: median(&counts),
        max_daily_count,
    })
}

/// Percent change between consecutive buckets, skipping pairs whose predecessor is zero.
fn daily_changes_pct(daily: &ResampledSeries) -> Vec<f64> {
    daily
        .buckets()
        .windows(2)
        .filter(|pair| pair[0].count > 0)
        .map(|pair| {
            let prev = pair[0].count as f64;
            (pair[1].count as f64 - prev) / prev * 100.0
        })
        .collect()
}
