//! End-to-end integration tests for the content-graph engine.
//!
//! These tests exercise the full pipeline from record ingestion through
//! scoring, graph construction, connectivity repair and incremental updates.

use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use content_graph::config::{ConnectivityMode, GraphConfig};
use content_graph::error::{ConfigError, GraphError};
use content_graph::fusion::FusionWeights;
use content_graph::graph::EdgeOrigin;
use content_graph::graph::builder::build_graph_from;
use content_graph::graph::scoring::score_pair;
use content_graph::graph::validate::validate_connectivity;
use content_graph::ingest::{ingest_records, parse_records};
use content_graph::store::{MemorySignalStore, SignalSource};
use content_graph::{ContentItem, ItemId, KnowledgeGraph, build_graph, update_graph};

const TOPICS: &[&str] = &["rust", "graphs", "cooking", "travel", "music", "finance"];
const ENTITIES: &[&str] = &["Mozilla", "Paris", "Dr. Ferris", "ACME"];

fn random_items(rng: &mut StdRng, prefix: &str, n: usize, dimension: usize) -> Vec<ContentItem> {
    (0..n)
        .map(|i| {
            let embedding: Vec<f32> = (0..dimension).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let topics: Vec<&str> = TOPICS.iter().copied().filter(|_| rng.gen_bool(0.3)).collect();
            let entities: Vec<&str> = ENTITIES.iter().copied().filter(|_| rng.gen_bool(0.2)).collect();
            ContentItem::new(
                format!("{prefix}-{i:03}"),
                embedding,
                topics,
                entities,
                format!("hash-{prefix}-{i}"),
            )
        })
        .collect()
}

fn plain(id: &str, embedding: Vec<f32>) -> ContentItem {
    ContentItem::new(id, embedding, Vec::<&str>::new(), Vec::<&str>::new(), format!("h-{id}"))
}

#[test]
fn identical_items_score_one() {
    let a = ContentItem::new("a", vec![0.3, -0.2, 0.9], ["rust", "graphs"], ["Mozilla"], "h1");
    let b = ContentItem::new("b", vec![0.3, -0.2, 0.9], ["graphs", "rust"], ["Mozilla"], "h2");
    let pair = score_pair(&a, &b, &FusionWeights::default()).unwrap().unwrap();
    assert!((pair.score - 1.0).abs() < 1e-9);

    let outcome = build_graph(vec![a, b], &GraphConfig::with_dimension(3)).unwrap();
    let score = outcome.graph.edge_score(&"a".into(), &"b".into()).unwrap();
    assert!((score - 1.0).abs() < 1e-9);
}

#[test]
fn identical_items_without_labels_score_embedding_weight_only() {
    let a = plain("a", vec![0.3, -0.2, 0.9]);
    let b = plain("b", vec![0.3, -0.2, 0.9]);
    let pair = score_pair(&a, &b, &FusionWeights::default()).unwrap().unwrap();
    assert!((pair.signals.embedding - 1.0).abs() < 1e-12);
    // Two empty sets have Jaccard 0, not 1.
    assert_eq!(pair.signals.topic, 0.0);
    assert_eq!(pair.signals.entity, 0.0);
    assert!((pair.score - 0.6).abs() < 1e-9);

    let outcome = build_graph(vec![a, b], &GraphConfig::with_dimension(3)).unwrap();
    let edge = outcome.graph.edge(&"a".into(), &"b".into()).unwrap();
    assert_eq!(edge.origin, EdgeOrigin::Threshold);
    assert!((edge.score - 0.6).abs() < 1e-9);
}

#[test]
fn orthogonal_disjoint_pair_scores_embedding_half_only() {
    let a = ContentItem::new("a", vec![1.0, 0.0], ["rust"], ["Mozilla"], "h1");
    let b = ContentItem::new("b", vec![0.0, 1.0], ["cooking"], ["Paris"], "h2");
    let pair = score_pair(&a, &b, &FusionWeights::default()).unwrap().unwrap();
    assert!((pair.signals.embedding - 0.5).abs() < 1e-12);
    assert_eq!(pair.signals.topic, 0.0);
    assert_eq!(pair.signals.entity, 0.0);
    // 0.6 * 0.5 + 0.3 * 0 + 0.1 * 0
    assert!((pair.score - 0.3).abs() < 1e-12);
}

#[test]
fn weights_not_summing_to_one_are_rejected_before_work() {
    let config = GraphConfig {
        weights: FusionWeights {
            embedding: 0.5,
            topic: 0.3,
            entity: 0.1,
        },
        ..GraphConfig::with_dimension(2)
    };
    let err = build_graph(vec![plain("a", vec![1.0, 0.0])], &config).unwrap_err();
    assert!(matches!(
        err,
        GraphError::Config(ConfigError::InvalidWeights { .. })
    ));
    let err = update_graph(KnowledgeGraph::new(), Vec::new(), &config).unwrap_err();
    assert!(matches!(
        err,
        GraphError::Config(ConfigError::InvalidWeights { .. })
    ));
}

#[test]
fn no_item_is_isolated() {
    let mut rng = StdRng::seed_from_u64(11);
    let config = GraphConfig {
        threshold: 0.6,
        ..GraphConfig::with_dimension(8)
    };
    for n in [2, 3, 10, 40] {
        let items = random_items(&mut rng, "n", n, 8);
        let outcome = build_graph(items, &config).unwrap();
        let g = &outcome.graph;
        for id in g.item_ids() {
            assert!(g.degree(id) >= 1, "{id} isolated in graph of {n}");
        }
        let report = validate_connectivity(g, ConnectivityMode::Connected);
        assert!(report.satisfied, "graph of {n} not connected: {report:?}");
        assert_eq!(report.self_loops, 0);
        assert!(outcome.unrepaired.is_empty());
    }
}

#[test]
fn no_isolated_mode_holds_its_weaker_guarantee() {
    let mut rng = StdRng::seed_from_u64(5);
    let config = GraphConfig {
        threshold: 0.8,
        connectivity: ConnectivityMode::NoIsolated,
        ..GraphConfig::with_dimension(8)
    };
    let outcome = build_graph(random_items(&mut rng, "w", 30, 8), &config).unwrap();
    let report = validate_connectivity(&outcome.graph, ConnectivityMode::NoIsolated);
    assert!(report.satisfied);
    assert!(report.isolated.is_empty());
}

#[test]
fn rebuild_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(42);
    let items = random_items(&mut rng, "d", 50, 16);
    let config = GraphConfig {
        batch_size: 7,
        ..GraphConfig::with_dimension(16)
    };
    let first = build_graph(items.clone(), &config).unwrap();
    let mut reversed = items;
    reversed.reverse();
    let second = build_graph(reversed, &config).unwrap();
    assert_eq!(first.graph, second.graph);
    let edges_a: Vec<_> = first.graph.edges().collect();
    let edges_b: Vec<_> = second.graph.edges().collect();
    assert_eq!(edges_a, edges_b);
}

#[test]
fn empty_update_returns_identical_graph() {
    let mut rng = StdRng::seed_from_u64(3);
    let config = GraphConfig::with_dimension(8);
    let graph = build_graph(random_items(&mut rng, "e", 20, 8), &config)
        .unwrap()
        .graph;
    let updated = update_graph(graph.clone(), Vec::new(), &config).unwrap();
    assert_eq!(updated.graph, graph);
}

#[test]
fn near_duplicates_link_and_orthogonal_items_are_repaired() {
    let items = vec![
        plain("A", vec![1.0, 0.0, 0.0, 0.0]),
        plain("B", vec![0.99, 0.141, 0.0, 0.0]),
        plain("C", vec![0.0, 0.0, 1.0, 0.0]),
        plain("D", vec![0.0, 0.0, 0.0, 1.0]),
    ];
    let outcome = build_graph(items, &GraphConfig::with_dimension(4)).unwrap();
    let g = &outcome.graph;

    let ab = g.edge(&"A".into(), &"B".into()).unwrap();
    assert_eq!(ab.origin, EdgeOrigin::Threshold);
    assert!(ab.score >= 0.35);
    assert_eq!(outcome.stats.threshold_edges, 1);
    assert_eq!(outcome.stats.components_before_repair, 3);

    // Every orthogonal pair ties at 0.3; the smallest key wins.
    let ac = g.edge(&"A".into(), &"C".into()).unwrap();
    let ad = g.edge(&"A".into(), &"D".into()).unwrap();
    assert_eq!(ac.origin, EdgeOrigin::Repair);
    assert_eq!(ad.origin, EdgeOrigin::Repair);
    assert!((ac.score - 0.3).abs() < 1e-9);
    assert_eq!(g.edge_count(), 3);
    assert!(validate_connectivity(g, ConnectivityMode::Connected).satisfied);
}

#[test]
fn single_item_graph_is_trivially_valid() {
    let outcome = build_graph(vec![plain("solo", vec![1.0, 2.0])], &GraphConfig::with_dimension(2))
        .unwrap();
    assert_eq!(outcome.graph.item_count(), 1);
    assert_eq!(outcome.graph.edge_count(), 0);
    for mode in [ConnectivityMode::Connected, ConnectivityMode::NoIsolated] {
        assert!(validate_connectivity(&outcome.graph, mode).satisfied);
    }
}

#[test]
fn mismatched_pairs_are_reported_and_build_continues() {
    let items = vec![
        plain("a", vec![1.0, 0.0]),
        plain("b", vec![0.9, 0.1]),
        plain("c", vec![0.1, 0.9]),
        plain("x", vec![1.0, 0.0, 0.0]),
    ];
    let outcome = build_graph(items, &GraphConfig::with_dimension(2)).unwrap();
    assert_eq!(outcome.skipped.len(), 3);
    assert!(outcome.skipped.iter().all(|s| s.key.touches(&"x".into())));
    assert_eq!(outcome.unrepaired, vec![ItemId::from("x")]);
    for id in ["a", "b", "c"] {
        assert!(outcome.graph.degree(&id.into()) >= 1);
    }
}

#[test]
fn update_preserves_untouched_edges_and_connectivity() {
    let mut rng = StdRng::seed_from_u64(9);
    let config = GraphConfig {
        threshold: 0.55,
        ..GraphConfig::with_dimension(8)
    };
    let base = build_graph(random_items(&mut rng, "base", 30, 8), &config)
        .unwrap()
        .graph;

    let mut batch = random_items(&mut rng, "new", 5, 8);
    // One changed version of an existing item.
    let mut changed = ContentItem::clone(base.item(&"base-004".into()).unwrap());
    changed.embedding = (0..8).map(|_| rng.gen_range(-1.0..1.0)).collect();
    changed.content_hash = "hash-base-4-v2".into();
    batch.push(changed);
    let touched: BTreeSet<ItemId> = batch.iter().map(|it| it.id.clone()).collect();

    let outcome = update_graph(base.clone(), batch, &config).unwrap();
    let updated = &outcome.graph;
    assert_eq!(outcome.stats.added, 5);
    assert_eq!(outcome.stats.replaced, 1);

    for edge in base.edges() {
        if touched.contains(edge.source()) || touched.contains(edge.target()) {
            continue;
        }
        assert_eq!(updated.edge(edge.source(), edge.target()), Some(edge));
    }
    assert!(validate_connectivity(updated, ConnectivityMode::Connected).satisfied);
}

#[test]
fn update_threshold_edges_match_rebuild_for_batch_pairs() {
    let mut rng = StdRng::seed_from_u64(21);
    let config = GraphConfig {
        threshold: 0.5,
        ..GraphConfig::with_dimension(6)
    };
    let old = random_items(&mut rng, "old", 15, 6);
    let new = random_items(&mut rng, "new", 4, 6);

    let base = build_graph(old.clone(), &config).unwrap().graph;
    let updated = update_graph(base, new.clone(), &config).unwrap().graph;
    let rebuilt = build_graph([old, new.clone()].concat(), &config).unwrap().graph;

    let is_threshold = |g: &KnowledgeGraph, a: &ItemId, b: &ItemId| {
        g.edge(a, b)
            .is_some_and(|e| e.origin == EdgeOrigin::Threshold)
    };
    for fresh in &new {
        for other in rebuilt.item_ids() {
            if other == &fresh.id {
                continue;
            }
            assert_eq!(
                is_threshold(&updated, &fresh.id, other),
                is_threshold(&rebuilt, &fresh.id, other),
                "{} -- {other}",
                fresh.id
            );
        }
    }
}

#[test]
fn records_flow_through_store_into_graph() {
    let json = r#"[
        {"id": "post-1", "embedding": [1.0, 0.0, 0.2], "topics": ["Rust", "rust!"],
         "entities": ["Dr. Ferris"], "content_hash": "a"},
        {"id": "post-2", "embedding": [0.9, 0.1, 0.2], "topics": ["rust"],
         "entities": ["ferris"], "content_hash": "b"},
        {"id": "post-3", "embedding": [0.0, 1.0], "content_hash": "c"},
        {"id": "", "embedding": [0.0, 1.0, 0.0], "content_hash": "d"},
        {"id": "post-4", "embedding": [-1.0, 0.0, 0.0], "topics": [], "content_hash": "e"}
    ]"#;
    let report = ingest_records(parse_records(json).unwrap(), 3);
    assert_eq!(report.items.len(), 3);
    assert_eq!(report.rejected.len(), 2);

    let store = MemorySignalStore::new();
    for item in report.items {
        assert!(store.put(item));
    }
    assert_eq!(store.ids().len(), 3);
    let post1 = store.get(&"post-1".into()).unwrap();
    assert_eq!(post1.topics.len(), 1);
    assert!(post1.entities.contains("ferris"));

    let outcome = build_graph_from(&store, &GraphConfig::with_dimension(3)).unwrap();
    let edge = outcome.graph.edge(&"post-1".into(), &"post-2".into()).unwrap();
    assert_eq!(edge.origin, EdgeOrigin::Threshold);
    assert_eq!(edge.signals.topic, 1.0);
    assert_eq!(edge.signals.entity, 1.0);
    assert!(validate_connectivity(&outcome.graph, ConnectivityMode::Connected).satisfied);
}
