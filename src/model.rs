//! Typed records flowing between the series store and the aggregation engine.

use std::fmt;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MetricsError;

/// Divisor used for every `throughput` value, whatever the bucket width.
///
/// Throughput is a daily-normalized rate, not literal transactions per second
/// for week or month buckets.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// One observed bucket from the upstream feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    pub count: u64,
    pub success: Option<bool>,
}

impl EventRecord {
    pub fn new(timestamp: DateTime<Utc>, count: u64) -> Self {
        Self {
            timestamp,
            count,
            success: None,
        }
    }

    pub fn with_outcome(timestamp: DateTime<Utc>, count: u64, success: bool) -> Self {
        Self {
            timestamp,
            count,
            success: Some(success),
        }
    }
}

/// Timestamp-ordered records with at most one entry per `(timestamp, success)` key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSeries {
    records: Vec<EventRecord>,
}

impl RawSeries {
    /// Sorts the records and sums any that share both timestamp and outcome label.
    pub fn from_records(mut records: Vec<EventRecord>) -> Self {
        records.sort_by(|a, b| (a.timestamp, a.success).cmp(&(b.timestamp, b.success)));

        let mut merged: Vec<EventRecord> = Vec::with_capacity(records.len());
        for record in records {
            match merged.last_mut() {
                Some(last)
                    if last.timestamp == record.timestamp && last.success == record.success =>
                {
                    last.count = last.count.saturating_add(record.count);
                }
                _ => merged.push(record),
            }
        }

        Self { records: merged }
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_count(&self) -> u64 {
        self.records
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(r.count))
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.timestamp.date_naive())
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.timestamp.date_naive())
    }

    /// Whether any record carries an outcome label.
    pub fn is_labeled(&self) -> bool {
        self.records.iter().any(|r| r.success.is_some())
    }

    /// Sub-series holding only records labeled with `outcome`.
    pub fn with_outcome(&self, outcome: bool) -> RawSeries {
        Self {
            records: self
                .records
                .iter()
                .filter(|r| r.success == Some(outcome))
                .cloned()
                .collect(),
        }
    }

    pub(crate) fn retain(&self, keep: impl Fn(&EventRecord) -> bool) -> RawSeries {
        Self {
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }
}

/// Display and resampling granularity.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Day,
    /// Tuesday through Monday, labelled by the closing Monday.
    Week,
    /// Calendar months, closed by the month end.
    Month,
}

impl Granularity {
    /// Maps a calendar date to the date labelling its bucket.
    ///
    /// Days label themselves, months use their first day, and weeks use the
    /// Monday on or after `date` (the week closes on that Monday).
    pub fn bucket_date(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Week => {
                let to_monday = (7 - date.weekday().num_days_from_monday()) % 7;
                date.checked_add_days(Days::new(u64::from(to_monday)))
                    .unwrap_or(NaiveDate::MAX)
            }
            Granularity::Month => date - Days::new(u64::from(date.day0())),
        }
    }

    /// Bucket key for a timestamp: UTC midnight of its bucket label date.
    pub fn bucket_start(self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        start_of_day(self.bucket_date(timestamp.date_naive()))
    }

    /// Label of the bucket right after the one labelled `bucket_date`, or `None`
    /// past the last representable date.
    pub fn next_bucket_date(self, bucket_date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Granularity::Day => bucket_date.checked_add_days(Days::new(1)),
            Granularity::Week => bucket_date.checked_add_days(Days::new(7)),
            Granularity::Month => bucket_date.checked_add_months(Months::new(1)),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        };
        f.write_str(name)
    }
}

pub(crate) fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Inclusive calendar-date range, interpreted in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, MetricsError> {
        if start > end {
            return Err(MetricsError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn start_instant(&self) -> DateTime<Utc> {
        start_of_day(self.start)
    }

    /// Last representable instant of the end day.
    pub fn end_instant(&self) -> DateTime<Utc> {
        match self.end.checked_add_days(Days::new(1)) {
            Some(next) => start_of_day(next) - TimeDelta::nanoseconds(1),
            None => DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start_instant() && timestamp <= self.end_instant()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub bucket_start: DateTime<Utc>,
    pub count: u64,
    pub cumulative_count: u64,
    pub throughput: f64,
}

/// Ordered buckets with running totals and daily-normalized throughput.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResampledSeries {
    buckets: Vec<Bucket>,
}

impl ResampledSeries {
    /// Derives `cumulative_count` and `throughput` from ascending `(bucket_start, count)` pairs.
    pub fn from_counts(counts: impl IntoIterator<Item = (DateTime<Utc>, u64)>) -> Self {
        let mut running = 0u64;
        let buckets = counts
            .into_iter()
            .map(|(bucket_start, count)| {
                running = running.saturating_add(count);
                Bucket {
                    bucket_start,
                    count,
                    cumulative_count: running,
                    throughput: count as f64 / SECONDS_PER_DAY,
                }
            })
            .collect();
        Self { buckets }
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn counts(&self) -> Vec<u64> {
        self.buckets.iter().map(|b| b.count).collect()
    }

    pub fn total(&self) -> u64 {
        self.buckets
            .iter()
            .fold(0u64, |acc, b| acc.saturating_add(b.count))
    }
}

/// Summary scalars, always computed from the daily resampling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSummary {
    pub total: u64,
    pub average_daily_change_pct: f64,
    pub throughput_per_second: f64,
    pub average_daily_count: f64,
    pub median_daily_count: f64,
    pub max_daily_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessRatePoint {
    pub bucket_start: DateTime<Utc>,
    pub succeeded: u64,
    pub failed: u64,
    /// `succeeded / (succeeded + failed)`, or `0.0` when the bucket has no outcomes.
    pub success_rate: f64,
    /// False when both sides are zero, so a consumer can tell "no data" from a true 0% rate.
    pub has_outcomes: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SuccessRateSeries {
    points: Vec<SuccessRatePoint>,
}

impl SuccessRateSeries {
    pub fn new(points: Vec<SuccessRatePoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[SuccessRatePoint] {
        &self.points
    }

    pub fn rates(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.success_rate).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_from_records_sorts_and_sums_duplicates() {
        let series = RawSeries::from_records(vec![
            EventRecord::new(ts(2024, 1, 2, 0), 5),
            EventRecord::new(ts(2024, 1, 1, 0), 10),
            EventRecord::new(ts(2024, 1, 2, 0), 7),
        ]);

        assert_eq!(series.len(), 2);
        assert_eq!(series.records()[0].count, 10);
        assert_eq!(series.records()[1].count, 12);
        assert_eq!(series.total_count(), 22);
    }

    #[test]
    fn test_from_records_keeps_outcome_partitions_apart() {
        let series = RawSeries::from_records(vec![
            EventRecord::with_outcome(ts(2024, 1, 1, 0), 3, true),
            EventRecord::with_outcome(ts(2024, 1, 1, 0), 4, false),
            EventRecord::with_outcome(ts(2024, 1, 1, 0), 1, true),
        ]);

        assert_eq!(series.len(), 2);
        assert_eq!(series.with_outcome(true).total_count(), 4);
        assert_eq!(series.with_outcome(false).total_count(), 4);
        assert!(series.is_labeled());
    }

    #[test]
    fn test_week_bucket_closes_on_monday() {
        // 2024-01-02 is a Tuesday, 2024-01-07 a Sunday, 2024-01-08 a Monday.
        assert_eq!(Granularity::Week.bucket_date(date(2024, 1, 1)), date(2024, 1, 1));
        assert_eq!(Granularity::Week.bucket_date(date(2024, 1, 2)), date(2024, 1, 8));
        assert_eq!(Granularity::Week.bucket_date(date(2024, 1, 7)), date(2024, 1, 8));
        assert_eq!(Granularity::Week.bucket_date(date(2024, 1, 8)), date(2024, 1, 8));
        assert_eq!(Granularity::Week.bucket_date(date(2024, 1, 9)), date(2024, 1, 15));
    }

    #[test]
    fn test_month_bucket_and_next() {
        assert_eq!(Granularity::Month.bucket_date(date(2024, 2, 29)), date(2024, 2, 1));
        assert_eq!(
            Granularity::Month.next_bucket_date(date(2024, 1, 1)),
            Some(date(2024, 2, 1))
        );
        assert_eq!(
            Granularity::Month.next_bucket_date(date(2024, 12, 1)),
            Some(date(2025, 1, 1))
        );
    }

    #[test]
    fn test_bucket_dates_at_calendar_limit() {
        assert_eq!(Granularity::Day.next_bucket_date(NaiveDate::MAX), None);
        assert_eq!(Granularity::Week.next_bucket_date(NaiveDate::MAX), None);
        assert_eq!(Granularity::Month.next_bucket_date(NaiveDate::MAX), None);
        assert!(Granularity::Week.bucket_date(NaiveDate::MAX) <= NaiveDate::MAX);
    }

    #[test]
    fn test_day_bucket_truncates_to_midnight() {
        assert_eq!(Granularity::Day.bucket_start(ts(2024, 3, 5, 17)), ts(2024, 3, 5, 0));
    }

    #[test]
    fn test_date_range_rejects_reversed_dates() {
        let err = DateRange::new(date(2024, 1, 5), date(2024, 1, 1)).unwrap_err();
        assert_eq!(
            err,
            MetricsError::InvalidRange {
                start: date(2024, 1, 5),
                end: date(2024, 1, 1)
            }
        );
    }

    #[test]
    fn test_date_range_end_is_inclusive_of_whole_day() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 1)).unwrap();
        assert!(range.contains(Utc.with_ymd_and_hms(2024, 1, 1, 23, 59, 59).unwrap()));
        assert!(!range.contains(ts(2024, 1, 2, 0)));
        assert!(!range.contains(Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap()));
    }

    #[test]
    fn test_date_range_open_ended_at_last_date() {
        let range = DateRange::new(date(2024, 1, 1), NaiveDate::MAX).unwrap();

        assert_eq!(range.end_instant(), DateTime::<Utc>::MAX_UTC);
        assert!(range.contains(ts(2024, 6, 1, 12)));
        assert!(!range.contains(ts(2023, 12, 31, 23)));
    }

    #[test]
    fn test_from_counts_derives_running_total_and_throughput() {
        let series = ResampledSeries::from_counts(vec![
            (ts(2024, 1, 1, 0), 86_400),
            (ts(2024, 1, 2, 0), 0),
        ]);

        assert_eq!(series.buckets()[0].throughput, 1.0);
        assert_eq!(series.buckets()[1].cumulative_count, 86_400);
        assert_eq!(series.buckets()[1].throughput, 0.0);
    }

    #[test]
    fn test_granularity_display_matches_value_names() {
        assert_eq!(Granularity::Week.to_string(), "week");
        assert_eq!(
            serde_json::to_string(&Granularity::Month).unwrap(),
            "\"month\""
        );
    }
}
