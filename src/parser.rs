//! Maps upstream JSON or CSV rows onto [`EventRecord`]s.

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::config::SourceSchema;
use crate::model::{EventRecord, start_of_day};

/// Encoding of a source payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Csv,
}

impl SourceFormat {
    /// Picks the format from a path or URL: `.csv` is CSV, anything else JSON.
    pub fn from_source(source: &str) -> Self {
        let path = source.split(['?', '#']).next().unwrap_or(source);
        if path.to_ascii_lowercase().ends_with(".csv") {
            SourceFormat::Csv
        } else {
            SourceFormat::Json
        }
    }
}

/// Decodes `bytes` into event records using the field names in `schema`.
///
/// JSON payloads are either an array of row objects or a query-result envelope
/// `{"result": {"rows": [...]}}`.
///
/// # Errors
///
/// Returns an error if the payload is malformed, a required field is missing,
/// a count is negative or fractional, or an outcome is not a boolean.
pub fn parse_records(
    bytes: &[u8],
    format: SourceFormat,
    schema: &SourceSchema,
) -> Result<Vec<EventRecord>> {
    match format {
        SourceFormat::Json => parse_json(bytes, schema),
        SourceFormat::Csv => parse_csv(bytes, schema),
    }
}

fn parse_json(bytes: &[u8], schema: &SourceSchema) -> Result<Vec<EventRecord>> {
    let payload: Value = serde_json::from_slice(bytes).context("payload is not valid JSON")?;

    let rows = match &payload {
        Value::Array(rows) => rows,
        Value::Object(_) => payload
            .pointer("/result/rows")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("JSON object has no result.rows array"))?,
        _ => bail!("JSON payload must be an array or an object"),
    };

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let row = row
                .as_object()
                .ok_or_else(|| anyhow!("row {i} is not an object"))?;
            json_row(row, schema).with_context(|| format!("invalid row {i}"))
        })
        .collect()
}

fn json_row(row: &Map<String, Value>, schema: &SourceSchema) -> Result<EventRecord> {
    let timestamp = match row.get(&schema.timestamp_field) {
        Some(Value::String(s)) => parse_timestamp(s)?,
        Some(other) => bail!("'{}' must be a string, got {other}", schema.timestamp_field),
        None => bail!("missing field '{}'", schema.timestamp_field),
    };

    let count = match row.get(&schema.count_field) {
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| {
            anyhow!("'{}' must be a non-negative integer, got {n}", schema.count_field)
        })?,
        Some(Value::String(s)) => parse_count(s, &schema.count_field)?,
        Some(other) => bail!("'{}' must be a number, got {other}", schema.count_field),
        None => bail!("missing field '{}'", schema.count_field),
    };

    let success = match &schema.outcome_field {
        None => None,
        Some(field) => match row.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(other) => bail!("'{field}' must be a boolean, got {other}"),
        },
    };

    Ok(EventRecord {
        timestamp,
        count,
        success,
    })
}

fn parse_csv(bytes: &[u8], schema: &SourceSchema) -> Result<Vec<EventRecord>> {
    let mut rdr = csv::Reader::from_reader(bytes);
    let headers = rdr.headers()?.clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| anyhow!("CSV has no '{name}' column"))
    };
    let ts_idx = column(&schema.timestamp_field)?;
    let count_idx = column(&schema.count_field)?;
    let outcome_idx = schema.outcome_field.as_deref().map(column).transpose()?;

    let mut records = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let row = result?;
        let field = |idx: usize| row.get(idx).unwrap_or("").trim();

        let timestamp = parse_timestamp(field(ts_idx)).with_context(|| format!("invalid row {i}"))?;
        let count = parse_count(field(count_idx), &schema.count_field)
            .with_context(|| format!("invalid row {i}"))?;
        let success = match outcome_idx.map(field) {
            None | Some("") => None,
            Some("true") => Some(true),
            Some("false") => Some(false),
            Some(other) => bail!("invalid row {i}: outcome must be true or false, got '{other}'"),
        };

        records.push(EventRecord {
            timestamp,
            count,
            success,
        });
    }

    Ok(records)
}

fn parse_count(raw: &str, field: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .with_context(|| format!("'{field}' must be a non-negative integer, got '{raw}'"))
}

/// Parses an upstream timestamp into UTC.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff] UTC`, `YYYY-MM-DD HH:MM:SS[.fff]`,
/// and bare dates. Zone-less values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    let naive = raw.strip_suffix(" UTC").unwrap_or(raw);
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Ok(ts.and_utc());
        }
    }

    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .map(start_of_day)
        .with_context(|| format!("unrecognized timestamp '{raw}'"))
}
