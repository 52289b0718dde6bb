//! Aggregation engine.
//!
//! Pure functions over an already range-filtered [`RawSeries`](crate::model::RawSeries):
//! resampling to a granularity, KPI computation at daily resolution, and the
//! succeeded/failed breakdown with its success-rate series.

pub mod breakdown;
pub mod kpi;
pub mod resample;
pub mod utility;

pub use breakdown::breakdown_by_outcome;
pub use kpi::compute_kpis;
pub use resample::{fill_missing_buckets, resample};
