//! Connectivity repair.
//!
//! After threshold edges are in place the graph may contain isolated items or
//! several components. Repair adds the minimum set of below-threshold edges
//! needed to restore the configured [`ConnectivityMode`]:
//!
//! - [`ConnectivityMode::Connected`]: merge components in rounds. In each round
//!   every component except one anchor picks its single best-scoring edge to
//!   an item outside itself; picks that still join two separate components are
//!   added. Rounds repeat until one component remains. The anchor is the
//!   largest component, or under a scoped repair the largest component that
//!   lies wholly outside the scope.
//! - [`ConnectivityMode::NoIsolated`]: every degree-0 item gets its best edge.
//!
//! Ties between candidate edges go to the smaller canonical key, so repair is
//! deterministic for a given input.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::unionfind::UnionFind;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::ConnectivityMode;
use crate::error::GraphError;
use crate::fusion::FusionWeights;
use crate::item::{ContentItem, ItemId};

use super::scoring::{ScoredPair, score_pair};
use super::{EdgeOrigin, GraphResult, KnowledgeGraph};

/// What a repair pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairOutcome {
    /// Repair edges added.
    pub edges_added: usize,
    /// Components before repair.
    pub components_before: usize,
    /// Components after repair.
    pub components_after: usize,
    /// Items that could not be connected because no pair involving them
    /// could be scored.
    pub unrepaired: Vec<ItemId>,
}

/// Restore `mode` on `graph`.
///
/// With `scope` set, `Connected` repair runs only while some component
/// intersects the scope, and then merges every component into the largest
/// component outside the scope. `NoIsolated` always checks every item, since
/// a degree-0 check is cheap.
pub fn repair(
    graph: &mut KnowledgeGraph,
    weights: &FusionWeights,
    mode: ConnectivityMode,
    scope: Option<&BTreeSet<ItemId>>,
    cancel: &CancelToken,
) -> GraphResult<RepairOutcome> {
    let items: Vec<&ContentItem> = graph.items().map(|a| a.as_ref()).collect();
    let mut uf = UnionFind::<usize>::new(items.len());
    for edge in graph.edges() {
        if let (Some(s), Some(t)) = (position(&items, edge.source()), position(&items, edge.target())) {
            uf.union(s, t);
        }
    }
    let components_before = components(&uf, items.len()).len();
    let in_scope = |i: usize| scope.is_none_or(|s| s.contains(&items[i].id));

    let (picked, unrepaired) = match mode {
        ConnectivityMode::Connected => connect_components(&items, &mut uf, weights, &in_scope, cancel)?,
        ConnectivityMode::NoIsolated => {
            let isolated: Vec<usize> = (0..items.len())
                .filter(|&i| graph.degree(&items[i].id) == 0)
                .collect();
            attach_isolated(&items, &isolated, &mut uf, weights)
        }
    };

    let unrepaired: Vec<ItemId> = unrepaired.into_iter().map(|i| items[i].id.clone()).collect();
    let components_after = components(&uf, items.len()).len();
    let edges_added = picked.len();
    for pair in picked {
        debug!(edge = %pair.key, score = pair.score, "repair edge");
        graph.put_edge(pair.into_edge(EdgeOrigin::Repair));
    }

    if !unrepaired.is_empty() {
        warn!(
            count = unrepaired.len(),
            "items could not be connected: no comparable partner"
        );
    }
    info!(
        %mode,
        components_before,
        components_after,
        edges_added,
        "connectivity repair finished"
    );
    Ok(RepairOutcome {
        edges_added,
        components_before,
        components_after,
        unrepaired,
    })
}

/// Group indices by component, largest first, ties by smallest member.
fn components(uf: &UnionFind<usize>, n: usize) -> Vec<Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..n {
        groups.entry(uf.find(i)).or_default().push(i);
    }
    let mut out: Vec<Vec<usize>> = groups.into_values().collect();
    out.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));
    out
}

/// Best edge from any of `members` to an item `j` with `outside(j)`.
///
/// `None` when no such pair could be scored.
fn best_edge(
    items: &[&ContentItem],
    members: &[usize],
    outside: impl Fn(usize) -> bool,
    weights: &FusionWeights,
) -> Option<ScoredPair> {
    let mut best: Option<ScoredPair> = None;
    for &m in members {
        for j in (0..items.len()).filter(|&j| j != m && outside(j)) {
            if let Ok(Some(pair)) = score_pair(items[m], items[j], weights) {
                if best.as_ref().is_none_or(|b| pair.beats(b)) {
                    best = Some(pair);
                }
            }
        }
    }
    best
}

fn connect_components(
    items: &[&ContentItem],
    uf: &mut UnionFind<usize>,
    weights: &FusionWeights,
    in_scope: &(impl Fn(usize) -> bool + Sync),
    cancel: &CancelToken,
) -> GraphResult<(Vec<ScoredPair>, Vec<usize>)> {
    let mut picked: Vec<ScoredPair> = Vec::new();
    // Smallest member of each component known to have no comparable partner.
    let mut stuck: BTreeSet<usize> = BTreeSet::new();
    let initial = components(uf, items.len()).len();
    let mut round = 0usize;

    loop {
        let comps = components(uf, items.len());
        if comps.len() <= 1 {
            break;
        }
        if cancel.is_cancelled() {
            return Err(GraphError::Cancelled {
                rows_done: initial - comps.len(),
                rows_total: initial - 1,
            });
        }
        let touches_scope = |c: &Vec<usize>| c.iter().any(|&i| in_scope(i));
        if !comps.iter().any(|c| touches_scope(c)) {
            break;
        }
        // The anchor stays put: the largest component outside the scope if
        // there is one, otherwise the largest overall.
        let anchor = comps.iter().position(|c| !touches_scope(c)).unwrap_or(0);
        let candidates: Vec<&Vec<usize>> = comps
            .iter()
            .enumerate()
            .filter(|&(k, c)| k != anchor && !stuck.contains(&c[0]))
            .map(|(_, c)| c)
            .collect();
        if candidates.is_empty() {
            break;
        }
        round += 1;
        debug!(round, components = comps.len(), candidates = candidates.len(), "repair round");

        let labels: Vec<usize> = (0..items.len()).map(|i| uf.find(i)).collect();
        let picks: Vec<Option<ScoredPair>> = candidates
            .par_iter()
            .map(|comp| {
                let root = labels[comp[0]];
                best_edge(items, comp, |j| labels[j] != root, weights)
            })
            .collect();

        let mut merged = false;
        for (comp, pick) in candidates.iter().zip(picks) {
            let Some(pair) = pick else {
                stuck.insert(comp[0]);
                continue;
            };
            let (Some(s), Some(t)) = (position(items, &pair.key.source), position(items, &pair.key.target))
            else {
                continue;
            };
            if uf.union(s, t) {
                picked.push(pair);
                merged = true;
            }
        }
        if !merged {
            break;
        }
    }

    let unrepaired: Vec<usize> = components(uf, items.len())
        .into_iter()
        .filter(|c| stuck.contains(&c[0]))
        .flatten()
        .collect();
    Ok((picked, unrepaired))
}

fn attach_isolated(
    items: &[&ContentItem],
    isolated: &[usize],
    uf: &mut UnionFind<usize>,
    weights: &FusionWeights,
) -> (Vec<ScoredPair>, Vec<usize>) {
    if items.len() < 2 {
        return (Vec::new(), Vec::new());
    }
    let picks: Vec<Option<ScoredPair>> = isolated
        .par_iter()
        .map(|&i| best_edge(items, &[i], |_| true, weights))
        .collect();

    let mut picked: Vec<ScoredPair> = Vec::new();
    let mut seen = BTreeSet::new();
    let mut unrepaired = Vec::new();
    for (&i, pick) in isolated.iter().zip(picks) {
        match pick {
            Some(pair) => {
                if seen.insert(pair.key.clone()) {
                    if let (Some(s), Some(t)) =
                        (position(items, &pair.key.source), position(items, &pair.key.target))
                    {
                        uf.union(s, t);
                    }
                    picked.push(pair);
                }
            }
            None => unrepaired.push(i),
        }
    }
    (picked, unrepaired)
}

/// Index of `id` in the id-sorted item slice.
fn position(items: &[&ContentItem], id: &ItemId) -> Option<usize> {
    items.binary_search_by(|it| it.id.cmp(id)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeKey, RelationEdge};
    use crate::similarity::SignalScores;
    use std::sync::Arc;

    fn item(id: &str, embedding: Vec<f32>) -> ContentItem {
        ContentItem::new(id, embedding, Vec::<&str>::new(), Vec::<&str>::new(), "h")
    }

    fn graph_of(items: Vec<ContentItem>) -> KnowledgeGraph {
        let mut g = KnowledgeGraph::new();
        for it in items {
            g.put_item(Arc::new(it));
        }
        g
    }

    fn threshold_edge(a: &str, b: &str) -> RelationEdge {
        RelationEdge {
            key: EdgeKey::new(a.into(), b.into()).unwrap(),
            score: 0.9,
            signals: SignalScores {
                embedding: 0.9,
                topic: 0.0,
                entity: 0.0,
            },
            origin: EdgeOrigin::Threshold,
        }
    }

    fn run(g: &mut KnowledgeGraph, mode: ConnectivityMode) -> RepairOutcome {
        repair(g, &FusionWeights::default(), mode, None, &CancelToken::new()).unwrap()
    }

    #[test]
    fn connects_all_singletons() {
        let mut g = graph_of(vec![
            item("a", vec![1.0, 0.0]),
            item("b", vec![0.0, 1.0]),
            item("c", vec![-1.0, 0.0]),
            item("d", vec![0.0, -1.0]),
        ]);
        let out = run(&mut g, ConnectivityMode::Connected);
        assert_eq!(out.components_before, 4);
        assert_eq!(out.components_after, 1);
        assert_eq!(out.edges_added, 3);
        assert_eq!(g.edge_count(), 3);
        assert!(g.edges().all(|e| e.origin == EdgeOrigin::Repair));
    }

    #[test]
    fn picks_highest_scoring_bridge() {
        let mut g = graph_of(vec![
            item("a", vec![1.0, 0.0]),
            item("b", vec![1.0, 0.05]),
            item("c", vec![0.9, 0.3]),
            item("d", vec![-1.0, 0.0]),
        ]);
        g.put_edge(threshold_edge("a", "b"));
        g.put_edge(threshold_edge("c", "d"));
        let out = run(&mut g, ConnectivityMode::Connected);
        assert_eq!(out.edges_added, 1);
        // b is c's closest partner outside {c, d}.
        let bridge = g.edges().find(|e| e.origin == EdgeOrigin::Repair).unwrap();
        assert_eq!(bridge.key.to_string(), "b -- c");
    }

    #[test]
    fn already_connected_graph_is_untouched() {
        let mut g = graph_of(vec![item("a", vec![1.0]), item("b", vec![1.0])]);
        g.put_edge(threshold_edge("a", "b"));
        let before = g.clone();
        let out = run(&mut g, ConnectivityMode::Connected);
        assert_eq!(out.edges_added, 0);
        assert_eq!(g, before);
    }

    #[test]
    fn single_item_needs_no_repair() {
        let mut g = graph_of(vec![item("a", vec![1.0])]);
        for mode in [ConnectivityMode::Connected, ConnectivityMode::NoIsolated] {
            let out = run(&mut g, mode);
            assert_eq!(out.edges_added, 0);
            assert!(out.unrepaired.is_empty());
        }
    }

    #[test]
    fn no_isolated_attaches_each_singleton() {
        let mut g = graph_of(vec![
            item("a", vec![1.0, 0.0]),
            item("b", vec![1.0, 0.1]),
            item("c", vec![-1.0, 0.0]),
            item("d", vec![-1.0, -0.1]),
        ]);
        let out = run(&mut g, ConnectivityMode::NoIsolated);
        assert!(out.unrepaired.is_empty());
        for id in ["a", "b", "c", "d"] {
            assert!(g.degree(&id.into()) >= 1, "{id} isolated");
        }
        // a<->b and c<->d pick each other; duplicates are collapsed.
        assert_eq!(g.edge_count(), 2);
        assert_eq!(out.components_after, 2);
    }

    #[test]
    fn incomparable_item_is_reported() {
        let mut g = graph_of(vec![
            item("a", vec![1.0, 0.0]),
            item("b", vec![0.0, 1.0]),
            item("odd", vec![1.0, 0.0, 0.0]),
        ]);
        let out = run(&mut g, ConnectivityMode::Connected);
        assert_eq!(out.unrepaired, vec![ItemId::from("odd")]);
        assert_eq!(out.components_after, 2);
        assert_eq!(g.degree(&"a".into()), 1);
    }

    fn scoped(g: &mut KnowledgeGraph, ids: &[&str]) -> RepairOutcome {
        let scope: BTreeSet<ItemId> = ids.iter().map(|&id| ItemId::from(id)).collect();
        repair(
            g,
            &FusionWeights::default(),
            ConnectivityMode::Connected,
            Some(&scope),
            &CancelToken::new(),
        )
        .unwrap()
    }

    #[test]
    fn scope_without_components_is_left_alone() {
        let mut g = graph_of(vec![item("a", vec![1.0]), item("b", vec![1.0])]);
        let out = scoped(&mut g, &["elsewhere"]);
        assert_eq!(out.edges_added, 0);
        assert_eq!(out.components_after, 2);
    }

    #[test]
    fn largest_scoped_component_joins_the_rest() {
        // {x, y} is the largest component and lies in scope; z is outside.
        let mut g = graph_of(vec![
            item("x", vec![0.0, 1.0]),
            item("y", vec![0.0, 1.0]),
            item("z", vec![1.0, 0.0]),
        ]);
        g.put_edge(threshold_edge("x", "y"));
        let out = scoped(&mut g, &["x", "y"]);
        assert_eq!(out.edges_added, 1);
        assert_eq!(out.components_after, 1);
        assert_eq!(g.degree(&"z".into()), 1);
    }

    #[test]
    fn scoped_repair_anchors_on_outside_component() {
        let mut g = graph_of(vec![
            item("a", vec![1.0]),
            item("b", vec![1.0]),
            item("c", vec![1.0]),
        ]);
        g.put_edge(threshold_edge("a", "b"));
        let out = scoped(&mut g, &["c"]);
        assert_eq!(out.edges_added, 1);
        assert_eq!(out.components_after, 1);
        assert_eq!(g.degree(&"c".into()), 1);
    }

    #[test]
    fn cancellation_aborts_repair() {
        let mut g = graph_of(vec![item("a", vec![1.0]), item("b", vec![1.0])]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = repair(
            &mut g,
            &FusionWeights::default(),
            ConnectivityMode::Connected,
            None,
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(err, GraphError::Cancelled { .. }));
        assert_eq!(g.edge_count(), 0);
    }
}
