//! In-memory knowledge graph value with adjacency indexing.
//!
//! A [`KnowledgeGraph`] is a plain value: builders and updaters produce a new
//! one instead of mutating a shared instance, so readers holding an older
//! snapshot never observe a partial update. Items are held behind `Arc` so
//! cloning a graph for copy-on-write does not copy embeddings.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::GraphError;
use crate::item::{ContentItem, ItemId};
use crate::store::SignalSource;

use super::{EdgeKey, GraphResult, RelationEdge};

/// Items plus canonical relation edges.
#[derive(Clone, Default, PartialEq)]
pub struct KnowledgeGraph {
    /// ItemId → item.
    items: BTreeMap<ItemId, Arc<ContentItem>>,
    /// Canonical pair → edge.
    edges: BTreeMap<EdgeKey, RelationEdge>,
    /// ItemId → neighbour ids.
    adjacency: BTreeMap<ItemId, BTreeSet<ItemId>>,
}

impl KnowledgeGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a graph from items and edges, checking edge endpoints.
    ///
    /// Used when restoring a serialized snapshot.
    pub fn from_parts(
        items: impl IntoIterator<Item = ContentItem>,
        edges: impl IntoIterator<Item = RelationEdge>,
    ) -> GraphResult<Self> {
        let mut graph = Self::new();
        for item in items {
            graph.put_item(Arc::new(item));
        }
        for edge in edges {
            if edge.key.source >= edge.key.target {
                return Err(GraphError::Serialization {
                    message: format!("edge {} is not canonical or is a self-loop", edge.key),
                });
            }
            for endpoint in [&edge.key.source, &edge.key.target] {
                if !graph.contains(endpoint) {
                    return Err(GraphError::Serialization {
                        message: format!("edge {} references unknown item {endpoint}", edge.key),
                    });
                }
            }
            graph.put_edge(edge);
        }
        Ok(graph)
    }

    // -- read accessors ----------------------------------------------------

    /// All items, ordered by id.
    pub fn items(&self) -> impl Iterator<Item = &Arc<ContentItem>> {
        self.items.values()
    }

    /// All item ids, ordered.
    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.items.keys()
    }

    /// Look up one item.
    pub fn item(&self, id: &ItemId) -> Option<&Arc<ContentItem>> {
        self.items.get(id)
    }

    /// Whether an item exists.
    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.contains_key(id)
    }

    /// All edges, ordered by canonical key.
    pub fn edges(&self) -> impl Iterator<Item = &RelationEdge> {
        self.edges.values()
    }

    /// Edge between two items, in either order.
    pub fn edge(&self, a: &ItemId, b: &ItemId) -> Option<&RelationEdge> {
        EdgeKey::of(a, b).and_then(|key| self.edges.get(&key))
    }

    /// Composite score of the edge between two items, if one exists.
    pub fn edge_score(&self, a: &ItemId, b: &ItemId) -> Option<f64> {
        self.edge(a, b).map(|e| e.score)
    }

    /// Neighbour ids of an item, ordered. Empty for unknown ids.
    pub fn neighbors(&self, id: &ItemId) -> Vec<&ItemId> {
        self.adjacency
            .get(id)
            .map(|n| n.iter().collect())
            .unwrap_or_default()
    }

    /// Neighbours together with the connecting edges, highest score first.
    pub fn neighbor_edges(&self, id: &ItemId) -> Vec<(&ItemId, &RelationEdge)> {
        let mut out: Vec<(&ItemId, &RelationEdge)> = self
            .neighbors(id)
            .into_iter()
            .filter_map(|n| self.edge(id, n).map(|e| (n, e)))
            .collect();
        out.sort_by(|a, b| {
            b.1.score
                .partial_cmp(&a.1.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        out
    }

    /// Number of edges touching an item.
    pub fn degree(&self, id: &ItemId) -> usize {
        self.adjacency.get(id).map(BTreeSet::len).unwrap_or(0)
    }

    /// Number of items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    // -- crate-internal mutation (only on graphs not yet handed out) --------

    /// Insert or replace an item. Existing edges are kept.
    pub(crate) fn put_item(&mut self, item: Arc<ContentItem>) {
        self.adjacency.entry(item.id.clone()).or_default();
        self.items.insert(item.id.clone(), item);
    }

    /// Insert or replace an edge. Both endpoints must already be present.
    pub(crate) fn put_edge(&mut self, edge: RelationEdge) {
        debug_assert!(edge.key.source < edge.key.target, "non-canonical edge");
        let (s, t) = (edge.key.source.clone(), edge.key.target.clone());
        self.adjacency.entry(s.clone()).or_default().insert(t.clone());
        self.adjacency.entry(t).or_default().insert(s);
        self.edges.insert(edge.key.clone(), edge);
    }

    /// Remove every edge touching `id`, returning them.
    pub(crate) fn detach(&mut self, id: &ItemId) -> Vec<RelationEdge> {
        let neighbours = self.adjacency.get_mut(id).map(std::mem::take).unwrap_or_default();
        let mut removed = Vec::with_capacity(neighbours.len());
        for n in neighbours {
            if let Some(set) = self.adjacency.get_mut(&n) {
                set.remove(id);
            }
            if let Some(edge) = EdgeKey::of(id, &n).and_then(|k| self.edges.remove(&k)) {
                removed.push(edge);
            }
        }
        removed
    }
}

impl SignalSource for KnowledgeGraph {
    fn get(&self, id: &ItemId) -> Option<Arc<ContentItem>> {
        self.items.get(id).cloned()
    }

    fn ids(&self) -> Vec<ItemId> {
        self.items.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

impl std::fmt::Debug for KnowledgeGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeGraph")
            .field("items", &self.item_count())
            .field("edges", &self.edge_count())
            .finish()
    }
}
