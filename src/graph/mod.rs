//! Knowledge graph: content items connected by fused relevance edges.
//!
//! - **Model** ([`KnowledgeGraph`]): immutable-by-convention snapshot of items and edges
//! - **Full rebuild** ([`builder`]): score every pair, threshold, repair connectivity
//! - **Delta** ([`update`]): admit new/changed items without rescoring stable pairs
//! - **Repair** ([`repair`]): union-find based connectivity repair shared by both paths
//! - **Analytics** ([`analytics`]): centrality, components, paths, topic coverage
//!
//! Edges are undirected in meaning and stored once per unordered pair under
//! a canonical [`EdgeKey`] (lexicographically smaller id first).

pub mod analytics;
pub mod builder;
pub mod index;
pub mod repair;
pub mod scoring;
pub mod shared;
pub mod update;
pub mod validate;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::item::ItemId;
use crate::similarity::SignalScores;

pub use index::KnowledgeGraph;

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Canonical key for an unordered item pair: `source < target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub source: ItemId,
    pub target: ItemId,
}

impl EdgeKey {
    /// Canonicalise a pair. Returns `None` for a self-pair.
    pub fn new(a: ItemId, b: ItemId) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self {
                source: a,
                target: b,
            }),
            std::cmp::Ordering::Greater => Some(Self {
                source: b,
                target: a,
            }),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Borrowing variant of [`EdgeKey::new`].
    pub fn of(a: &ItemId, b: &ItemId) -> Option<Self> {
        Self::new(a.clone(), b.clone())
    }

    /// Whether `id` is one of the endpoints.
    pub fn touches(&self, id: &ItemId) -> bool {
        &self.source == id || &self.target == id
    }

    /// The endpoint opposite `id`, if `id` is an endpoint.
    pub fn other(&self, id: &ItemId) -> Option<&ItemId> {
        if &self.source == id {
            Some(&self.target)
        } else if &self.target == id {
            Some(&self.source)
        } else {
            None
        }
    }
}

impl std::fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -- {}", self.source, self.target)
    }
}

/// Why an edge exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeOrigin {
    /// Composite score reached the relevance threshold.
    Threshold,
    /// Added by connectivity repair regardless of threshold.
    Repair,
}

impl std::fmt::Display for EdgeOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeOrigin::Threshold => write!(f, "threshold"),
            EdgeOrigin::Repair => write!(f, "repair"),
        }
    }
}

/// A scored relation between two items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationEdge {
    /// Canonical endpoints.
    pub key: EdgeKey,
    /// Composite relevance in [0, 1].
    pub score: f64,
    /// Component signals, retained for explainability.
    pub signals: SignalScores,
    /// Threshold or repair edge.
    pub origin: EdgeOrigin,
}

impl RelationEdge {
    /// Lexicographically smaller endpoint.
    pub fn source(&self) -> &ItemId {
        &self.key.source
    }

    /// Lexicographically larger endpoint.
    pub fn target(&self) -> &ItemId {
        &self.key.target
    }
}

/// A pair that could not be scored, reported alongside the resulting graph.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPair {
    pub key: EdgeKey,
    pub reason: crate::error::SignalError,
}
