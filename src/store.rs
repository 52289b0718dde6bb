//! Series store: an explicitly owned, immutable snapshot of the raw series.
//!
//! [`SnapshotProvider`] is the only seam that performs I/O. The caller decides when
//! to [`SeriesStore::refresh`]; queries only ever read the current snapshot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::error::MetricsError;
use crate::model::{DateRange, RawSeries};

/// Produces a fresh copy of the full historical series.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn snapshot(&self) -> anyhow::Result<RawSeries>;
}

#[derive(Debug, Default)]
pub struct SeriesStore {
    snapshot: Option<Arc<RawSeries>>,
    refreshed_at: Option<Instant>,
}

impl SeriesStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_snapshot(series: RawSeries) -> Self {
        Self {
            snapshot: Some(Arc::new(series)),
            refreshed_at: Some(Instant::now()),
        }
    }

    /// Replaces the snapshot with one produced by `provider`.
    ///
    /// On failure the previous snapshot, if any, keeps serving.
    #[tracing::instrument(skip_all)]
    pub async fn refresh<P: SnapshotProvider + ?Sized>(
        &mut self,
        provider: &P,
    ) -> Result<Arc<RawSeries>, MetricsError> {
        match provider.snapshot().await {
            Ok(series) => {
                info!(
                    records = series.len(),
                    first = ?series.first_date(),
                    last = ?series.last_date(),
                    "Snapshot refreshed"
                );
                let series = Arc::new(series);
                self.snapshot = Some(series.clone());
                self.refreshed_at = Some(Instant::now());
                Ok(series)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    has_previous = self.snapshot.is_some(),
                    "Snapshot refresh failed"
                );
                Err(MetricsError::data_unavailable(format!("{e:#}")))
            }
        }
    }

    /// Returns the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::DataUnavailable`] if no snapshot has been produced yet.
    pub fn load(&self) -> Result<Arc<RawSeries>, MetricsError> {
        self.snapshot
            .clone()
            .ok_or_else(|| MetricsError::data_unavailable("no snapshot has been loaded"))
    }

    /// True when there is no snapshot or it is older than `max_age`.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        self.refreshed_at
            .is_none_or(|at| at.elapsed() >= max_age)
    }
}

/// Records of `series` whose timestamp falls within `range`, both ends inclusive.
pub fn filter(series: &RawSeries, range: DateRange) -> RawSeries {
    let filtered = series.retain(|r| range.contains(r.timestamp));
    debug!(
        start = %range.start(),
        end = %range.end(),
        kept = filtered.len(),
        total = series.len(),
        "Filtered series"
    );
    filtered
}

/// Validates `start <= end` and filters `series` to that range.
///
/// # Errors
///
/// Returns [`MetricsError::InvalidRange`] if `start` is after `end`.
pub fn filter_dates(
    series: &RawSeries,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<RawSeries, MetricsError> {
    Ok(filter(series, DateRange::new(start, end)?))
}
