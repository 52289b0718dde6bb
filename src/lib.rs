pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod model;
pub mod output;
pub mod parser;
pub mod report;
pub mod store;

pub use error::MetricsError;
pub use model::{
    DateRange, EventRecord, Granularity, KpiSummary, RawSeries, ResampledSeries,
    SuccessRateSeries,
};
