//! Full graph rebuild.
//!
//! 1. Validate configuration (fails before any scoring).
//! 2. Score candidate pairs: every unordered pair, or the approximate
//!    nearest-neighbour candidates when `candidate_limit` is set.
//! 3. Keep pairs whose composite score reaches the threshold.
//! 4. Run connectivity repair.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::ann;
use crate::cancel::CancelToken;
use crate::config::GraphConfig;
use crate::item::{ContentItem, ItemId};
use crate::store::SignalSource;

use super::repair::repair;
use super::scoring::{PairScores, score_all_pairs, score_rows};
use super::{EdgeOrigin, GraphResult, KnowledgeGraph, SkippedPair};

/// Counters describing one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Distinct items in the graph.
    pub items: usize,
    /// Pairs compared.
    pub pairs_scored: usize,
    /// Edges at or above the threshold.
    pub threshold_edges: usize,
    /// Edges added by connectivity repair.
    pub repair_edges: usize,
    /// Pairs that could not be compared.
    pub skipped_pairs: usize,
    /// Connected components after thresholding, before repair.
    pub components_before_repair: usize,
}

/// A built graph plus the diagnostics gathered on the way.
#[derive(Debug)]
pub struct BuildOutcome {
    pub graph: KnowledgeGraph,
    /// Pairs that failed scoring; the build continued without them.
    pub skipped: Vec<SkippedPair>,
    /// Items repair could not connect.
    pub unrepaired: Vec<ItemId>,
    pub stats: BuildStats,
}

/// Build a graph from a batch of items.
pub fn build_graph(items: Vec<ContentItem>, config: &GraphConfig) -> GraphResult<BuildOutcome> {
    build_graph_with_cancel(items, config, &CancelToken::new())
}

/// Build a graph, checking `cancel` between pair batches and repair rounds.
///
/// A cancelled build returns [`GraphError::Cancelled`](crate::error::GraphError::Cancelled)
/// and no graph.
pub fn build_graph_with_cancel(
    items: Vec<ContentItem>,
    config: &GraphConfig,
    cancel: &CancelToken,
) -> GraphResult<BuildOutcome> {
    config.validate()?;
    let started = Instant::now();

    let mut graph = KnowledgeGraph::new();
    for item in dedupe_last_wins(items) {
        graph.put_item(Arc::new(item));
    }
    if graph.is_empty() {
        info!("empty batch, returning empty graph");
        return Ok(BuildOutcome {
            graph,
            skipped: Vec::new(),
            unrepaired: Vec::new(),
            stats: BuildStats::default(),
        });
    }

    let scores = score_candidates(&graph, config, cancel)?;
    let PairScores {
        retained,
        skipped,
        pairs_scored,
    } = scores;
    log_skipped(&skipped);

    let threshold_edges = retained.len();
    for pair in retained {
        graph.put_edge(pair.into_edge(EdgeOrigin::Threshold));
    }

    let repaired = repair(
        &mut graph,
        &config.weights,
        config.connectivity,
        None,
        cancel,
    )?;

    let stats = BuildStats {
        items: graph.item_count(),
        pairs_scored,
        threshold_edges,
        repair_edges: repaired.edges_added,
        skipped_pairs: skipped.len(),
        components_before_repair: repaired.components_before,
    };
    info!(
        items = stats.items,
        edges = graph.edge_count(),
        threshold_edges,
        repair_edges = stats.repair_edges,
        skipped = stats.skipped_pairs,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "graph built"
    );
    Ok(BuildOutcome {
        graph,
        skipped,
        unrepaired: repaired.unrepaired,
        stats,
    })
}

/// Build a graph from every item held by a [`SignalSource`].
pub fn build_graph_from<S: SignalSource + ?Sized>(
    source: &S,
    config: &GraphConfig,
) -> GraphResult<BuildOutcome> {
    build_graph_from_with_cancel(source, config, &CancelToken::new())
}

/// [`build_graph_from`] with cooperative cancellation.
pub fn build_graph_from_with_cancel<S: SignalSource + ?Sized>(
    source: &S,
    config: &GraphConfig,
    cancel: &CancelToken,
) -> GraphResult<BuildOutcome> {
    build_graph_with_cancel(collect_items(source), config, cancel)
}

/// Every item of `source`, in id order.
pub(crate) fn collect_items<S: SignalSource + ?Sized>(source: &S) -> Vec<ContentItem> {
    source
        .ids()
        .iter()
        .filter_map(|id| source.get(id))
        .map(|item| ContentItem::clone(&item))
        .collect()
}

fn score_candidates(
    graph: &KnowledgeGraph,
    config: &GraphConfig,
    cancel: &CancelToken,
) -> GraphResult<PairScores> {
    let items: Vec<&ContentItem> = graph.items().map(|a| a.as_ref()).collect();
    let prefiltered = match config.candidate_limit {
        Some(k) if items.len() > k + 1 => ann::candidate_pairs(&items, k),
        _ => None,
    };
    match prefiltered {
        Some(rows) => score_rows(
            items.len(),
            |i| (items[i], rows[i].iter().map(|&j| items[j]).collect()),
            &config.weights,
            config.threshold,
            config.batch_size,
            cancel,
        ),
        None => score_all_pairs(
            &items,
            &config.weights,
            config.threshold,
            config.batch_size,
            cancel,
        ),
    }
}

/// Collapse duplicate ids, keeping the last occurrence.
pub(crate) fn dedupe_last_wins(items: Vec<ContentItem>) -> Vec<ContentItem> {
    let mut by_id: BTreeMap<ItemId, ContentItem> = BTreeMap::new();
    for item in items {
        if let Some(previous) = by_id.insert(item.id.clone(), item) {
            warn!(id = %previous.id, "duplicate item id in batch, keeping the last occurrence");
        }
    }
    by_id.into_values().collect()
}

pub(crate) fn log_skipped(skipped: &[SkippedPair]) {
    for pair in skipped {
        warn!(
            source = %pair.key.source,
            target = %pair.key.target,
            reason = %pair.reason,
            "pair skipped"
        );
    }
}
