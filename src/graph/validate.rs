//! Structural checks on a finished graph.

use petgraph::unionfind::UnionFind;
use serde::Serialize;

use crate::config::ConnectivityMode;
use crate::item::ItemId;

use super::KnowledgeGraph;

/// Result of [`validate_connectivity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityReport {
    /// Number of connected components.
    pub components: usize,
    /// Items with degree 0 in a graph of two or more items.
    pub isolated: Vec<ItemId>,
    /// Edges whose endpoints coincide.
    pub self_loops: usize,
    /// Whether the graph meets `mode` and has no self-loops.
    pub satisfied: bool,
}

/// Check `graph` against a connectivity mode.
///
/// Graphs with zero or one item satisfy every mode.
pub fn validate_connectivity(graph: &KnowledgeGraph, mode: ConnectivityMode) -> ConnectivityReport {
    let ids: Vec<&ItemId> = graph.item_ids().collect();
    let position = |id: &ItemId| ids.binary_search(&id).ok();

    let mut uf = UnionFind::<usize>::new(ids.len());
    let mut self_loops = 0;
    for edge in graph.edges() {
        if edge.source() == edge.target() {
            self_loops += 1;
            continue;
        }
        if let (Some(s), Some(t)) = (position(edge.source()), position(edge.target())) {
            uf.union(s, t);
        }
    }
    let mut roots: Vec<usize> = (0..ids.len()).map(|i| uf.find(i)).collect();
    roots.sort_unstable();
    roots.dedup();
    let components = roots.len();

    let isolated: Vec<ItemId> = if ids.len() < 2 {
        Vec::new()
    } else {
        ids.iter()
            .filter(|id| graph.degree(id) == 0)
            .map(|id| (*id).clone())
            .collect()
    };

    let mode_ok = match mode {
        ConnectivityMode::Connected => components <= 1,
        ConnectivityMode::NoIsolated => isolated.is_empty(),
    };
    ConnectivityReport {
        components,
        isolated,
        self_loops,
        satisfied: mode_ok && self_loops == 0,
    }
}
