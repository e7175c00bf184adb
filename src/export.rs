//! Graph snapshots for persistence and exchange.
//!
//! A [`GraphSnapshot`] is the serializable form of a [`KnowledgeGraph`]:
//! every item field and every edge with its component signals. Two encodings
//! are supported: pretty JSON for inspection and bincode for compact storage.
//! Both round-trip scores exactly.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::graph::{GraphResult, KnowledgeGraph, RelationEdge};
use crate::item::ContentItem;

/// Current snapshot format version.
pub const FORMAT_VERSION: u32 = 1;

/// Serializable graph contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub format_version: u32,
    /// Items ordered by id.
    pub items: Vec<ContentItem>,
    /// Edges ordered by canonical key.
    pub edges: Vec<RelationEdge>,
}

impl GraphSnapshot {
    /// Capture a graph.
    pub fn from_graph(graph: &KnowledgeGraph) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            items: graph.items().map(|it| ContentItem::clone(it)).collect(),
            edges: graph.edges().cloned().collect(),
        }
    }

    /// Rebuild the graph, checking the format version and edge endpoints.
    pub fn into_graph(self) -> GraphResult<KnowledgeGraph> {
        if self.format_version != FORMAT_VERSION {
            return Err(GraphError::Serialization {
                message: format!(
                    "unsupported snapshot format version {} (expected {FORMAT_VERSION})",
                    self.format_version
                ),
            });
        }
        KnowledgeGraph::from_parts(self.items, self.edges)
    }
}

/// On-disk encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Binary,
}

impl SnapshotFormat {
    /// `.json` is JSON; anything else is binary.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => SnapshotFormat::Json,
            _ => SnapshotFormat::Binary,
        }
    }
}

fn serde_err(e: impl std::fmt::Display) -> GraphError {
    GraphError::Serialization {
        message: e.to_string(),
    }
}

/// Encode a graph as pretty-printed JSON.
pub fn to_json(graph: &KnowledgeGraph) -> GraphResult<String> {
    serde_json::to_string_pretty(&GraphSnapshot::from_graph(graph)).map_err(serde_err)
}

/// Decode a graph from JSON.
pub fn from_json(json: &str) -> GraphResult<KnowledgeGraph> {
    let snapshot: GraphSnapshot = serde_json::from_str(json).map_err(serde_err)?;
    snapshot.into_graph()
}

/// Encode a graph with bincode.
pub fn to_bytes(graph: &KnowledgeGraph) -> GraphResult<Vec<u8>> {
    bincode::serialize(&GraphSnapshot::from_graph(graph)).map_err(serde_err)
}

/// Decode a graph from bincode.
pub fn from_bytes(bytes: &[u8]) -> GraphResult<KnowledgeGraph> {
    let snapshot: GraphSnapshot = bincode::deserialize(bytes).map_err(serde_err)?;
    snapshot.into_graph()
}

/// Write a graph to `path`, choosing the encoding from the extension.
pub fn save(graph: &KnowledgeGraph, path: &Path) -> GraphResult<()> {
    let bytes = match SnapshotFormat::from_path(path) {
        SnapshotFormat::Json => to_json(graph)?.into_bytes(),
        SnapshotFormat::Binary => to_bytes(graph)?,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|source| GraphError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
    }
    std::fs::write(path, bytes).map_err(|source| GraphError::Io {
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!(path = %path.display(), items = graph.item_count(), "graph saved");
    Ok(())
}

/// Read a graph written by [`save`].
pub fn load(path: &Path) -> GraphResult<KnowledgeGraph> {
    let bytes = std::fs::read(path).map_err(|source| GraphError::Io {
        path: path.display().to_string(),
        source,
    })?;
    match SnapshotFormat::from_path(path) {
        SnapshotFormat::Json => {
            let json = String::from_utf8(bytes).map_err(serde_err)?;
            from_json(&json)
        }
        SnapshotFormat::Binary => from_bytes(&bytes),
    }
}
