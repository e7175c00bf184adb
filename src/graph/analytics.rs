//! Graph analytics: centrality, components, paths, topic and entity coverage.
//!
//! All functions operate on a [`KnowledgeGraph`] reference and return
//! structured results sorted by relevance (degree desc, size desc, etc.).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::algo::{astar, tarjan_scc};
use petgraph::graph::{NodeIndex, UnGraph};
use serde::Serialize;

use crate::error::GraphError;
use crate::item::{ContentItem, ItemId};

use super::{EdgeOrigin, GraphResult, KnowledgeGraph};

/// Undirected petgraph view: node weights are the item ids.
fn undirected_view(kg: &KnowledgeGraph) -> (UnGraph<&ItemId, f64>, HashMap<&ItemId, NodeIndex>) {
    let mut graph = UnGraph::with_capacity(kg.item_count(), kg.edge_count());
    let mut index = HashMap::with_capacity(kg.item_count());
    for id in kg.item_ids() {
        index.insert(id, graph.add_node(id));
    }
    for edge in kg.edges() {
        if let (Some(&s), Some(&t)) = (index.get(edge.source()), index.get(edge.target())) {
            graph.add_edge(s, t, edge.score);
        }
    }
    (graph, index)
}

// ---------------------------------------------------------------------------
// Degree centrality
// ---------------------------------------------------------------------------

/// Degree centrality for a single item.
#[derive(Debug, Clone, Serialize)]
pub struct DegreeCentrality {
    pub id: ItemId,
    /// Number of incident edges.
    pub degree: usize,
    /// Sum of incident edge scores.
    pub weighted: f64,
}

/// Degree centrality for all items, sorted by degree desc, then id.
pub fn degree_centrality(kg: &KnowledgeGraph) -> Vec<DegreeCentrality> {
    let mut results: Vec<DegreeCentrality> = kg
        .item_ids()
        .map(|id| DegreeCentrality {
            id: id.clone(),
            degree: kg.degree(id),
            weighted: kg.neighbor_edges(id).iter().map(|(_, e)| e.score).sum(),
        })
        .collect();
    results.sort_by(|a, b| b.degree.cmp(&a.degree).then_with(|| a.id.cmp(&b.id)));
    results
}

// ---------------------------------------------------------------------------
// Connected components
// ---------------------------------------------------------------------------

/// A connected component of the graph.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectedComponent {
    /// Position after sorting (0 = largest).
    pub id: usize,
    /// Member ids, sorted.
    pub members: Vec<ItemId>,
    pub size: usize,
}

/// Connected components, sorted by size desc, then smallest member.
pub fn connected_components(kg: &KnowledgeGraph) -> Vec<ConnectedComponent> {
    let (graph, _) = undirected_view(kg);
    let mut groups: Vec<Vec<ItemId>> = tarjan_scc(&graph)
        .into_iter()
        .map(|indices| {
            let mut members: Vec<ItemId> = indices.iter().map(|&idx| graph[idx].clone()).collect();
            members.sort();
            members
        })
        .collect();
    groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.first().cmp(&b.first())));
    groups
        .into_iter()
        .enumerate()
        .map(|(id, members)| ConnectedComponent {
            id,
            size: members.len(),
            members,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Shortest path
// ---------------------------------------------------------------------------

/// Shortest path by hop count. `Ok(None)` if the items are not connected.
pub fn shortest_path(
    kg: &KnowledgeGraph,
    from: &ItemId,
    to: &ItemId,
) -> GraphResult<Option<Vec<ItemId>>> {
    for id in [from, to] {
        if !kg.contains(id) {
            return Err(GraphError::ItemNotFound { id: id.to_string() });
        }
    }
    let (graph, index) = undirected_view(kg);
    let (Some(&start), Some(&goal)) = (index.get(from), index.get(to)) else {
        return Ok(None);
    };

    let path = astar(&graph, start, |n| n == goal, |_| 1usize, |_| 0usize)
        .map(|(_cost, path)| path.into_iter().map(|idx| graph[idx].clone()).collect());
    Ok(path)
}

// ---------------------------------------------------------------------------
// Summary statistics
// ---------------------------------------------------------------------------

/// Aggregate graph statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphStats {
    pub items: usize,
    pub edges: usize,
    pub threshold_edges: usize,
    pub repair_edges: usize,
    /// Mean composite score; 0 for a graph without edges.
    pub mean_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub mean_degree: f64,
    pub components: usize,
}

/// Compute summary statistics.
pub fn graph_stats(kg: &KnowledgeGraph) -> GraphStats {
    let mut stats = GraphStats {
        items: kg.item_count(),
        edges: kg.edge_count(),
        components: connected_components(kg).len(),
        ..Default::default()
    };
    if stats.edges == 0 {
        return stats;
    }

    let (mut sum, mut min, mut max) = (0.0f64, f64::INFINITY, f64::NEG_INFINITY);
    for edge in kg.edges() {
        match edge.origin {
            EdgeOrigin::Threshold => stats.threshold_edges += 1,
            EdgeOrigin::Repair => stats.repair_edges += 1,
        }
        sum += edge.score;
        min = min.min(edge.score);
        max = max.max(edge.score);
    }
    stats.mean_score = sum / stats.edges as f64;
    stats.min_score = min;
    stats.max_score = max;
    stats.mean_degree = 2.0 * stats.edges as f64 / stats.items as f64;
    stats
}

// ---------------------------------------------------------------------------
// Topic coverage
// ---------------------------------------------------------------------------

/// Items carrying one topic.
#[derive(Debug, Clone, Serialize)]
pub struct TopicCoverage {
    pub topic: String,
    pub items: Vec<ItemId>,
}

/// Per-topic item lists, sorted by item count desc, then topic.
pub fn topic_coverage(kg: &KnowledgeGraph) -> Vec<TopicCoverage> {
    let mut by_topic: BTreeMap<&str, Vec<ItemId>> = BTreeMap::new();
    for item in kg.items() {
        for topic in &item.topics {
            by_topic.entry(topic).or_default().push(item.id.clone());
        }
    }
    let mut coverage: Vec<TopicCoverage> = by_topic
        .into_iter()
        .map(|(topic, items)| TopicCoverage {
            topic: topic.to_string(),
            items,
        })
        .collect();
    coverage.sort_by(|a, b| b.items.len().cmp(&a.items.len()).then_with(|| a.topic.cmp(&b.topic)));
    coverage
}

/// Number of items carrying both topics of each pair (pair stored in
/// lexicographic order). Pairs that never co-occur are absent.
pub fn topic_cooccurrence(kg: &KnowledgeGraph) -> BTreeMap<(String, String), usize> {
    let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();
    for item in kg.items() {
        let topics: Vec<&String> = item.topics.iter().collect();
        for (i, a) in topics.iter().enumerate() {
            for b in &topics[i + 1..] {
                *counts.entry(((*a).clone(), (*b).clone())).or_default() += 1;
            }
        }
    }
    counts
}

// ---------------------------------------------------------------------------
// Entity coverage
// ---------------------------------------------------------------------------

/// Mentions at which the frequency component of prominence saturates.
const PROMINENCE_MENTIONS: f64 = 50.0;
/// Distinct topics at which the diversity component saturates.
const PROMINENCE_TOPICS: f64 = 20.0;

/// Items mentioning one entity.
#[derive(Debug, Clone, Serialize)]
pub struct EntityCoverage {
    pub entity: String,
    pub items: Vec<ItemId>,
    /// Distinct topics across those items.
    pub topics: usize,
    /// Edges joining two of those items.
    pub internal_edges: usize,
    /// Prominence in [0, 1].
    pub prominence: f64,
}

/// Per-entity coverage, sorted by prominence desc, then entity.
///
/// Prominence is `0.4 * frequency + 0.4 * diversity + 0.2 * cohesion`:
/// frequency is the mention count over 50, diversity the distinct topic count
/// over 20 (both capped at 1), and cohesion the internal edge count over
/// `mentions - 1`, capped at 1 (0 for a single mention).
pub fn entity_coverage(kg: &KnowledgeGraph) -> Vec<EntityCoverage> {
    let mut by_entity: BTreeMap<&str, Vec<&ContentItem>> = BTreeMap::new();
    for item in kg.items() {
        for entity in &item.entities {
            by_entity.entry(entity).or_default().push(item.as_ref());
        }
    }

    let mut coverage: Vec<EntityCoverage> = by_entity
        .into_iter()
        .map(|(entity, items)| {
            let topics: BTreeSet<&str> = items
                .iter()
                .flat_map(|it| it.topics.iter().map(String::as_str))
                .collect();
            let members: BTreeSet<&ItemId> = items.iter().map(|it| &it.id).collect();
            let internal_edges = members
                .iter()
                .map(|id| kg.neighbors(id).into_iter().filter(|n| members.contains(n)).count())
                .sum::<usize>()
                / 2;
            EntityCoverage {
                entity: entity.to_string(),
                prominence: prominence(items.len(), topics.len(), internal_edges),
                items: items.iter().map(|it| it.id.clone()).collect(),
                topics: topics.len(),
                internal_edges,
            }
        })
        .collect();
    coverage.sort_by(|a, b| {
        b.prominence
            .total_cmp(&a.prominence)
            .then_with(|| a.entity.cmp(&b.entity))
    });
    coverage
}

fn prominence(mentions: usize, topics: usize, internal_edges: usize) -> f64 {
    let frequency = (mentions as f64 / PROMINENCE_MENTIONS).min(1.0);
    let diversity = (topics as f64 / PROMINENCE_TOPICS).min(1.0);
    let cohesion = if mentions < 2 {
        0.0
    } else {
        (internal_edges as f64 / (mentions - 1) as f64).min(1.0)
    };
    0.4 * frequency + 0.4 * diversity + 0.2 * cohesion
}

/// Entity count per item. Items without entities are absent.
pub fn entity_distribution(kg: &KnowledgeGraph) -> BTreeMap<ItemId, usize> {
    kg.items()
        .filter(|it| !it.entities.is_empty())
        .map(|it| (it.id.clone(), it.entities.len()))
        .collect()
}
