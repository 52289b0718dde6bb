use anyhow::{Context, Result};
use serde::Deserialize;

/// Maps upstream row fields onto [`EventRecord`](crate::model::EventRecord) fields.
///
/// Stored as a plain JSON object on disk; every key is optional:
/// ```json
/// {
///   "timestamp_field": "Date",
///   "count_field": "Number of Txns",
///   "outcome_field": "success"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SourceSchema {
    pub timestamp_field: String,
    pub count_field: String,
    pub outcome_field: Option<String>,
}

impl Default for SourceSchema {
    fn default() -> Self {
        Self {
            timestamp_field: "Date".to_string(),
            count_field: "Number of Txns".to_string(),
            outcome_field: None,
        }
    }
}

impl SourceSchema {
    /// Loads the schema from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read schema file '{path}'"))?;
        serde_json::from_str(&content).with_context(|| format!("invalid schema file '{path}'"))
    }

    /// Loads from `path` when given, otherwise uses the defaults.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn with_outcome_field(mut self, field: impl Into<String>) -> Self {
        self.outcome_field = Some(field.into());
        self
    }
}
