//! Succeeded/failed breakdown and the derived success-rate series.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::engine::resample::resample;
use crate::engine::utility::ratio_or_zero;
use crate::error::MetricsError;
use crate::model::{
    Granularity, RawSeries, ResampledSeries, SuccessRatePoint, SuccessRateSeries,
};

/// Resamples the succeeded and failed records of `labeled` independently and aligns
/// them on a shared bucket axis.
///
/// A bucket present on only one side counts as zero on the other. Records without
/// an outcome label are left out of both sides.
///
/// # Errors
///
/// Returns [`MetricsError::EmptyInput`] if `labeled` holds no labeled records.
#[tracing::instrument(skip(labeled), fields(records = labeled.len(), granularity = %granularity))]
pub fn breakdown_by_outcome(
    labeled: &RawSeries,
    granularity: Granularity,
) -> Result<(ResampledSeries, ResampledSeries, SuccessRateSeries), MetricsError> {
    let succeeded_raw = labeled.with_outcome(true);
    let failed_raw = labeled.with_outcome(false);

    if succeeded_raw.is_empty() && failed_raw.is_empty() {
        return Err(MetricsError::EmptyInput);
    }

    let unlabeled = labeled.len() - succeeded_raw.len() - failed_raw.len();
    if unlabeled > 0 {
        debug!(unlabeled, "Skipping records without an outcome label");
    }

    let succeeded = resample_side(&succeeded_raw, granularity)?;
    let failed = resample_side(&failed_raw, granularity)?;

    let mut aligned: BTreeMap<DateTime<Utc>, (u64, u64)> = BTreeMap::new();
    for bucket in succeeded.buckets() {
        let entry = aligned.entry(bucket.bucket_start).or_default();
        entry.0 = entry.0.saturating_add(bucket.count);
    }
    for bucket in failed.buckets() {
        let entry = aligned.entry(bucket.bucket_start).or_default();
        entry.1 = entry.1.saturating_add(bucket.count);
    }

    debug!(
        succeeded_buckets = succeeded.len(),
        failed_buckets = failed.len(),
        aligned_buckets = aligned.len(),
        "Aligned outcome series"
    );

    let points = aligned
        .iter()
        .map(|(&bucket_start, &(ok, ko))| {
            let total = ok.saturating_add(ko);
            SuccessRatePoint {
                bucket_start,
                succeeded: ok,
                failed: ko,
                success_rate: ratio_or_zero(ok as f64, total as f64),
                has_outcomes: total > 0,
            }
        })
        .collect();

    Ok((
        ResampledSeries::from_counts(aligned.iter().map(|(&start, &(ok, _))| (start, ok))),
        ResampledSeries::from_counts(aligned.iter().map(|(&start, &(_, ko))| (start, ko))),
        SuccessRateSeries::new(points),
    ))
}

/// An outcome with no records is an all-zero side, not an error.
fn resample_side(
    raw: &RawSeries,
    granularity: Granularity,
) -> Result<ResampledSeries, MetricsError> {
    match resample(raw, granularity) {
        Err(MetricsError::EmptyInput) => Ok(ResampledSeries::default()),
        other => other,
    }
}
