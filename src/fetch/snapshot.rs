use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::{BasicClient, HttpClient, read_source};
use crate::config::SourceSchema;
use crate::model::RawSeries;
use crate::parser::{SourceFormat, parse_records};
use crate::store::SnapshotProvider;

/// Produces snapshots by reading `source` and mapping its rows through `schema`.
pub struct SourceSnapshot<C: HttpClient = BasicClient> {
    client: C,
    source: String,
    format: SourceFormat,
    schema: SourceSchema,
}

impl SourceSnapshot<BasicClient> {
    pub fn new(source: impl Into<String>, schema: SourceSchema) -> Self {
        Self::with_client(BasicClient::new(), source, schema)
    }
}

impl<C: HttpClient> SourceSnapshot<C> {
    pub fn with_client(client: C, source: impl Into<String>, schema: SourceSchema) -> Self {
        let source = source.into();
        Self {
            client,
            format: SourceFormat::from_source(&source),
            source,
            schema,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[async_trait]
impl<C: HttpClient> SnapshotProvider for SourceSnapshot<C> {
    async fn snapshot(&self) -> Result<RawSeries> {
        let bytes = read_source(&self.client, &self.source).await?;
        let records = parse_records(&bytes, self.format, &self.schema)?;
        let parsed = records.len();
        let series = RawSeries::from_records(records);

        info!(
            source = %self.source,
            parsed,
            merged = parsed - series.len(),
            "Snapshot parsed"
        );
        Ok(series)
    }
}
