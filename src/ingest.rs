//! Ingestion boundary: validate loosely-typed upstream records into [`ContentItem`]s.
//!
//! The crawler/parser/enrichment pipeline hands over JSON records whose shape
//! is not guaranteed. Every record is checked here once, so scoring code only
//! ever sees fixed-shape items. A malformed record is rejected on its own and
//! never aborts the rest of the batch.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::item::{ContentItem, ItemId};

/// Result type for ingestion operations.
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// A content record as delivered by upstream enrichment. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawContentRecord {
    #[serde(default)]
    pub id: Option<String>,
    /// Kept as `f64` so out-of-range values are caught instead of silently rounded.
    #[serde(default)]
    pub embedding: Option<Vec<f64>>,
    #[serde(default)]
    pub topics: Option<Vec<String>>,
    #[serde(default)]
    pub entities: Option<Vec<String>>,
    #[serde(default)]
    pub content_hash: Option<String>,
}

/// Outcome of ingesting a batch of raw records.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Records that passed validation, in input order.
    pub items: Vec<ContentItem>,
    /// Records that were rejected.
    pub rejected: Vec<IngestError>,
}

impl ContentItem {
    /// Validate a raw record into an item.
    ///
    /// `index` is the record's position in its batch and only used for error
    /// reporting. `dimension` is the deployment's embedding dimension.
    pub fn from_record(
        raw: RawContentRecord,
        index: usize,
        dimension: usize,
    ) -> IngestResult<ContentItem> {
        let label = raw.id.clone().unwrap_or_else(|| "<missing id>".into());
        let malformed = |reason: String| IngestError::MalformedRecord {
            index,
            id: label.clone(),
            reason,
        };

        let id = match raw.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => ItemId::new(id),
            _ => return Err(malformed("missing or empty id".into())),
        };

        let content_hash = match raw.content_hash.as_deref().map(str::trim) {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => return Err(malformed("missing or empty content_hash".into())),
        };

        let raw_embedding = raw
            .embedding
            .ok_or_else(|| malformed("missing embedding".into()))?;
        if raw_embedding.is_empty() {
            return Err(malformed("empty embedding".into()));
        }
        if raw_embedding.len() != dimension {
            return Err(malformed(format!(
                "embedding has {} components, expected {dimension}",
                raw_embedding.len()
            )));
        }

        let mut embedding = Vec::with_capacity(raw_embedding.len());
        for (pos, value) in raw_embedding.into_iter().enumerate() {
            let narrowed = value as f32;
            if !value.is_finite() || !narrowed.is_finite() {
                return Err(malformed(format!(
                    "embedding component {pos} is not a finite f32 ({value})"
                )));
            }
            embedding.push(narrowed);
        }

        Ok(ContentItem::new(
            id,
            embedding,
            raw.topics.unwrap_or_default(),
            raw.entities.unwrap_or_default(),
            content_hash,
        ))
    }
}

/// Validate a batch of raw records, keeping the good ones.
pub fn ingest_records(records: Vec<RawContentRecord>, dimension: usize) -> IngestReport {
    let mut report = IngestReport::default();
    for (index, raw) in records.into_iter().enumerate() {
        match ContentItem::from_record(raw, index, dimension) {
            Ok(item) => report.items.push(item),
            Err(e) => {
                tracing::warn!(error = %e, "rejected content record");
                report.rejected.push(e);
            }
        }
    }
    tracing::info!(
        accepted = report.items.len(),
        rejected = report.rejected.len(),
        "ingested content records"
    );
    report
}

/// Parse a JSON array of raw records.
pub fn parse_records(json: &str) -> IngestResult<Vec<RawContentRecord>> {
    serde_json::from_str(json).map_err(|e| IngestError::Parse {
        message: e.to_string(),
    })
}

/// Read and parse a JSON records file.
pub fn load_records(path: &Path) -> IngestResult<Vec<RawContentRecord>> {
    let content = std::fs::read_to_string(path).map_err(|source| IngestError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_records(&content)
}
