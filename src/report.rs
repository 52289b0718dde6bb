//! End-to-end query: filter, resample for display, and summarize at daily resolution.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::engine::{breakdown_by_outcome, compute_kpis, resample};
use crate::error::MetricsError;
use crate::model::{
    DateRange, Granularity, KpiSummary, RawSeries, ResampledSeries, SuccessRateSeries,
};
use crate::store::filter;

/// Aligned succeeded/failed series and the success rate per bucket.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeBreakdown {
    pub succeeded: ResampledSeries,
    pub failed: ResampledSeries,
    pub success_rate: SuccessRateSeries,
}

/// Everything a dashboard needs for one `(range, granularity)` query.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub range: DateRange,
    pub granularity: Granularity,
    pub generated_at: DateTime<Utc>,
    pub series: ResampledSeries,
    pub kpis: KpiSummary,
    pub outcomes: Option<OutcomeBreakdown>,
}

/// Runs the full query against `series`.
///
/// KPIs come from the daily resampling whatever `granularity` is requested for display.
/// The outcome breakdown is included only when the filtered records carry labels.
///
/// # Errors
///
/// Returns [`MetricsError::EmptyInput`] when no record falls inside `range`.
#[tracing::instrument(
    skip(series),
    fields(start = %range.start(), end = %range.end(), granularity = %granularity)
)]
pub fn build_report(
    series: &RawSeries,
    range: DateRange,
    granularity: Granularity,
) -> Result<MetricsReport, MetricsError> {
    let filtered = filter(series, range);

    let display = resample(&filtered, granularity)?;
    let daily = resample(&filtered, Granularity::Day)?;
    let kpis = compute_kpis(&daily)?;

    let outcomes = if filtered.is_labeled() {
        let (succeeded, failed, success_rate) = breakdown_by_outcome(&filtered, granularity)?;
        Some(OutcomeBreakdown {
            succeeded,
            failed,
            success_rate,
        })
    } else {
        None
    };

    let buckets = display.len();
    info!(
        records = filtered.len(),
        buckets,
        total = kpis.total,
        labeled = outcomes.is_some(),
        "Report built"
    );

    Ok(MetricsReport {
        range,
        granularity,
        generated_at: Utc::now(),
        series: display,
        kpis,
        outcomes,
    })
}

/// The snapshot's first through last calendar day, or `None` for an empty snapshot.
pub fn default_range(series: &RawSeries) -> Option<DateRange> {
    let (start, end) = (series.first_date()?, series.last_date()?);
    DateRange::new(start, end).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventRecord;
    use chrono::{NaiveDate, TimeZone};

    fn day(m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, m, d, 0, 0, 0).unwrap()
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn sample() -> RawSeries {
        RawSeries::from_records(vec![
            EventRecord::new(day(1, 1), 100),
            EventRecord::new(day(1, 2), 150),
            EventRecord::new(day(1, 3), 90),
            EventRecord::new(day(1, 10), 40),
            EventRecord::new(day(2, 5), 60),
        ])
    }

    #[test]
    fn test_kpis_do_not_depend_on_display_granularity() {
        let range = DateRange::new(date(1, 1), date(2, 29)).unwrap();
        let series = sample();

        let by_day = build_report(&series, range, Granularity::Day).unwrap();
        let by_week = build_report(&series, range, Granularity::Week).unwrap();
        let by_month = build_report(&series, range, Granularity::Month).unwrap();

        assert_eq!(by_day.kpis, by_week.kpis);
        assert_eq!(by_day.kpis, by_month.kpis);
        assert_eq!(by_month.series.counts(), vec![380, 60]);
    }

    #[test]
    fn test_kpi_days_span_the_data_not_the_range() {
        let series = RawSeries::from_records(vec![
            EventRecord::new(day(1, 1), 100),
            EventRecord::new(day(1, 2), 150),
            EventRecord::new(day(1, 3), 90),
        ]);
        let december = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        let wide = DateRange::new(december, date(3, 31)).unwrap();

        let report = build_report(&series, wide, Granularity::Day).unwrap();

        assert_eq!(report.series.len(), 3);
        assert_eq!(report.kpis.average_daily_count, 340.0 / 3.0);
        assert_eq!(report.kpis.throughput_per_second, 340.0 / (2.0 * 86_400.0));
    }

    #[test]
    fn test_range_ending_on_last_representable_date() {
        let range = DateRange::new(date(1, 1), NaiveDate::MAX).unwrap();

        let report = build_report(&sample(), range, Granularity::Week).unwrap();

        assert_eq!(report.kpis.total, 440);
        assert_eq!(report.series.counts(), vec![100, 240, 40, 60]);
        assert_eq!(report.series.buckets()[1].bucket_start, day(1, 8));
    }

    #[test]
    fn test_empty_range_reports_empty_input() {
        let range = DateRange::new(date(3, 1), date(3, 31)).unwrap();
        let err = build_report(&sample(), range, Granularity::Day).unwrap_err();
        assert!(err.is_empty_input());
    }

    #[test]
    fn test_unlabeled_report_has_no_outcomes() {
        let range = DateRange::new(date(1, 1), date(1, 3)).unwrap();
        let report = build_report(&sample(), range, Granularity::Day).unwrap();
        assert!(report.outcomes.is_none());
        assert_eq!(report.kpis.total, 340);
    }

    #[test]
    fn test_labeled_report_includes_breakdown() {
        let series = RawSeries::from_records(vec![
            EventRecord::with_outcome(day(1, 1), 9, true),
            EventRecord::with_outcome(day(1, 1), 1, false),
        ]);
        let range = DateRange::new(date(1, 1), date(1, 1)).unwrap();

        let report = build_report(&series, range, Granularity::Day).unwrap();
        let outcomes = report.outcomes.unwrap();

        assert_eq!(report.kpis.total, 10);
        assert_eq!(outcomes.success_rate.rates(), vec![0.9]);
    }

    #[test]
    fn test_default_range_spans_snapshot() {
        let range = default_range(&sample()).unwrap();
        assert_eq!(range.start(), date(1, 1));
        assert_eq!(range.end(), date(2, 5));
        assert!(default_range(&RawSeries::default()).is_none());
    }
}
