//! Error kinds surfaced by the series store and the aggregation engine.
//!
//! Arithmetic edge cases (zero-day spans, zero denominators) are not errors;
//! they resolve to `0` inside the engine.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetricsError {
    /// The raw snapshot could not be produced.
    #[error("transaction data unavailable: {reason}")]
    DataUnavailable { reason: String },

    /// `start` is after `end`. Never swapped silently.
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// No records matched, so there is nothing to resample or summarize.
    #[error("no transaction records in the requested range")]
    EmptyInput,
}

impl MetricsError {
    pub fn data_unavailable(reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            reason: reason.into(),
        }
    }

    /// True for the expected "no data" condition a presentation layer renders as an empty state.
    pub fn is_empty_input(&self) -> bool {
        matches!(self, Self::EmptyInput)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_range_message_names_both_dates() {
        let err = MetricsError::InvalidRange {
            start: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        let msg = err.to_string();
        assert!(msg.contains("2024-02-01"));
        assert!(msg.contains("2024-01-01"));
    }

    #[test]
    fn test_is_empty_input() {
        assert!(MetricsError::EmptyInput.is_empty_input());
        assert!(!MetricsError::data_unavailable("timeout").is_empty_input());
    }
}
