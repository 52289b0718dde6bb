//! Bucketing of raw records into day/week/month series.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::MetricsError;
use crate::model::{Granularity, RawSeries, ResampledSeries, start_of_day};

/// Groups the records of `series` into buckets and sums `count` within each.
///
/// Only buckets that hold at least one record are emitted; gaps are left as they are.
/// Partial first/last buckets contain whatever records fall inside them.
///
/// # Errors
///
/// Returns [`MetricsError::EmptyInput`] if `series` has no records.
#[tracing::instrument(skip(series), fields(records = series.len(), granularity = %granularity))]
pub fn resample(
    series: &RawSeries,
    granularity: Granularity,
) -> Result<ResampledSeries, MetricsError> {
    if series.is_empty() {
        return Err(MetricsError::EmptyInput);
    }

    let counts = bucket_counts(series, granularity);
    debug!(buckets = counts.len(), "Series resampled");

    Ok(ResampledSeries::from_counts(
        counts
            .into_iter()
            .map(|(date, count)| (start_of_day(date), count)),
    ))
}

/// Returns `series` on a contiguous bucket axis from its first to its last bucket,
/// inserting `count = 0` for every missing bucket.
pub fn fill_missing_buckets(series: &ResampledSeries, granularity: Granularity) -> ResampledSeries {
    let mut existing: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for bucket in series.buckets() {
        let key = granularity.bucket_date(bucket.bucket_start.date_naive());
        let entry = existing.entry(key).or_default();
        *entry = entry.saturating_add(bucket.count);
    }

    let (Some(&first), Some(&last)) = (existing.keys().next(), existing.keys().next_back()) else {
        return ResampledSeries::default();
    };

    let axis = bucket_axis(first, last, granularity);
    let filled = axis.len() - existing.len();
    if filled > 0 {
        debug!(filled, granularity = %granularity, "Zero-filled missing buckets");
    }

    ResampledSeries::from_counts(axis.into_iter().map(|date| {
        let count = existing.get(&date).copied().unwrap_or(0);
        (start_of_day(date), count)
    }))
}

pub(crate) fn bucket_counts(
    series: &RawSeries,
    granularity: Granularity,
) -> BTreeMap<NaiveDate, u64> {
    let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for record in series.records() {
        let key = granularity.bucket_date(record.timestamp.date_naive());
        let entry = counts.entry(key).or_default();
        *entry = entry.saturating_add(record.count);
    }
    counts
}

/// Every bucket label from `first` to `last` inclusive.
fn bucket_axis(first: NaiveDate, last: NaiveDate, granularity: Granularity) -> Vec<NaiveDate> {
    let mut axis = Vec::new();
    let mut current = Some(first);
    while let Some(date) = current.filter(|d| *d <= last) {
        axis.push(date);
        current = granularity.next_bucket_date(date);
    }
    axis
}
