//! Incremental graph updates.
//!
//! A batch of new or changed items is admitted into an existing graph without
//! rescoring pairs that did not change:
//!
//! - an item whose content hash matches the stored version is skipped;
//! - a changed item loses all its edges, then is treated as new;
//! - an unknown id is a new item;
//! - batch items are scored against the untouched items first, then against
//!   each other;
//! - repair runs while a component touches the batch or a former neighbour
//!   of a changed item, and merges everything into the untouched part of the
//!   graph.
//!
//! Edges whose endpoints are both outside the batch are never removed or
//! rescored.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::config::GraphConfig;
use crate::item::{ContentItem, ItemId};
use crate::store::SignalSource;

use super::builder::{collect_items, dedupe_last_wins, log_skipped};
use super::repair::repair;
use super::scoring::{PairScores, score_rows};
use super::{EdgeOrigin, GraphResult, KnowledgeGraph, SkippedPair};

/// Counters describing one update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Items whose id was not in the graph.
    pub added: usize,
    /// Items whose content hash changed.
    pub replaced: usize,
    /// Items identical to the stored version.
    pub unchanged: usize,
    /// Edges dropped from replaced items.
    pub removed_edges: usize,
    pub pairs_scored: usize,
    pub threshold_edges: usize,
    pub repair_edges: usize,
    pub skipped_pairs: usize,
}

/// An updated graph plus diagnostics.
#[derive(Debug)]
pub struct UpdateOutcome {
    pub graph: KnowledgeGraph,
    pub skipped: Vec<SkippedPair>,
    pub unrepaired: Vec<ItemId>,
    pub stats: UpdateStats,
}

impl UpdateOutcome {
    fn unchanged(graph: KnowledgeGraph, stats: UpdateStats) -> Self {
        Self {
            graph,
            skipped: Vec::new(),
            unrepaired: Vec::new(),
            stats,
        }
    }
}

/// Admit `changed` into `graph`, returning the new graph value.
pub fn update_graph(
    graph: KnowledgeGraph,
    changed: Vec<ContentItem>,
    config: &GraphConfig,
) -> GraphResult<UpdateOutcome> {
    update_graph_with_cancel(graph, changed, config, &CancelToken::new())
}

/// [`update_graph`] with cooperative cancellation.
///
/// The input graph is consumed; callers that must keep the prior version on
/// cancellation pass a clone (see [`SharedGraph`](super::shared::SharedGraph)).
pub fn update_graph_with_cancel(
    graph: KnowledgeGraph,
    changed: Vec<ContentItem>,
    config: &GraphConfig,
    cancel: &CancelToken,
) -> GraphResult<UpdateOutcome> {
    config.validate()?;
    if changed.is_empty() {
        return Ok(UpdateOutcome::unchanged(graph, UpdateStats::default()));
    }
    let started = Instant::now();
    let mut graph = graph;
    let mut stats = UpdateStats::default();
    let mut batch: BTreeSet<ItemId> = BTreeSet::new();
    let mut scope: BTreeSet<ItemId> = BTreeSet::new();

    for item in dedupe_last_wins(changed) {
        match graph.item(&item.id) {
            Some(stored) if !item.is_changed_version_of(stored) => {
                debug!(id = %item.id, "content hash unchanged, skipping");
                stats.unchanged += 1;
                continue;
            }
            Some(_) => {
                let removed = graph.detach(&item.id);
                stats.removed_edges += removed.len();
                scope.extend(removed.iter().filter_map(|e| e.key.other(&item.id)).cloned());
                stats.replaced += 1;
            }
            None => {
                debug!(id = %item.id, "id not in graph, admitting as new");
                stats.added += 1;
            }
        }
        batch.insert(item.id.clone());
        graph.put_item(Arc::new(item));
    }
    if batch.is_empty() {
        info!(unchanged = stats.unchanged, "update batch had no changes");
        return Ok(UpdateOutcome::unchanged(graph, stats));
    }

    let PairScores {
        retained,
        skipped,
        pairs_scored,
    } = score_batch(&graph, &batch, config, cancel)?;
    log_skipped(&skipped);
    stats.pairs_scored = pairs_scored;
    stats.skipped_pairs = skipped.len();
    stats.threshold_edges = retained.len();
    for pair in retained {
        graph.put_edge(pair.into_edge(EdgeOrigin::Threshold));
    }

    scope.extend(batch.iter().cloned());
    let repaired = repair(
        &mut graph,
        &config.weights,
        config.connectivity,
        Some(&scope),
        cancel,
    )?;
    stats.repair_edges = repaired.edges_added;

    info!(
        added = stats.added,
        replaced = stats.replaced,
        unchanged = stats.unchanged,
        removed_edges = stats.removed_edges,
        threshold_edges = stats.threshold_edges,
        repair_edges = stats.repair_edges,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "graph updated"
    );
    Ok(UpdateOutcome {
        graph,
        skipped,
        unrepaired: repaired.unrepaired,
        stats,
    })
}

/// Admit every item of a [`SignalSource`]; items whose content hash matches
/// the graph's copy are no-ops.
pub fn update_graph_from<S: SignalSource + ?Sized>(
    graph: KnowledgeGraph,
    source: &S,
    config: &GraphConfig,
) -> GraphResult<UpdateOutcome> {
    update_graph_from_with_cancel(graph, source, config, &CancelToken::new())
}

/// [`update_graph_from`] with cooperative cancellation.
pub fn update_graph_from_with_cancel<S: SignalSource + ?Sized>(
    graph: KnowledgeGraph,
    source: &S,
    config: &GraphConfig,
    cancel: &CancelToken,
) -> GraphResult<UpdateOutcome> {
    update_graph_with_cancel(graph, collect_items(source), config, cancel)
}

/// Pass 1: batch items against every item outside the batch.
/// Pass 2: batch items against each other.
fn score_batch(
    graph: &KnowledgeGraph,
    batch: &BTreeSet<ItemId>,
    config: &GraphConfig,
    cancel: &CancelToken,
) -> GraphResult<PairScores> {
    let (fresh, stable): (Vec<&ContentItem>, Vec<&ContentItem>) = graph
        .items()
        .map(|a| a.as_ref())
        .partition(|it| batch.contains(&it.id));

    let mut scores = score_rows(
        fresh.len(),
        |i| (fresh[i], stable.clone()),
        &config.weights,
        config.threshold,
        config.batch_size,
        cancel,
    )?;
    let within = score_rows(
        fresh.len(),
        |i| (fresh[i], fresh[i + 1..].to_vec()),
        &config.weights,
        config.threshold,
        config.batch_size,
        cancel,
    )?;
    scores.retained.extend(within.retained);
    scores.skipped.extend(within.skipped);
    scores.pairs_scored += within.pairs_scored;
    Ok(scores)
}
