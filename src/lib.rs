// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # content-graph
//!
//! Multi-signal content similarity and connected topic-graph construction.
//!
//! Parsed content items carry an embedding, a topic set and an entity set.
//! Every pair of items is compared on three independent signals, the signals
//! are fused into one weighted relevance score, and pairs above a threshold
//! become edges. A repair pass then guarantees the graph is connected (or, if
//! configured, that no item is isolated).
//!
//! ## Architecture
//!
//! - **Items** (`item`, `ingest`): validated content records with normalised labels
//! - **Signal store** (`store`): concurrent in-memory item access
//! - **Similarity** (`similarity`): rescaled cosine, topic Jaccard, entity Jaccard
//! - **Fusion** (`fusion`): validated weights, composite score in [0, 1]
//! - **Graph** (`graph`): full rebuild, incremental update, repair, analytics
//! - **Pre-filter** (`ann`): optional HNSW candidate restriction for large batches
//! - **Persistence** (`export`): JSON and bincode snapshots
//!
//! ## Library usage
//!
//! ```no_run
//! use content_graph::config::GraphConfig;
//! use content_graph::graph::builder::build_graph;
//! use content_graph::item::ContentItem;
//!
//! let config = GraphConfig::with_dimension(3);
//! let items = vec![
//!     ContentItem::new("a", vec![1.0, 0.0, 0.0], ["rust"], ["Mozilla"], "h1"),
//!     ContentItem::new("b", vec![0.9, 0.1, 0.0], ["rust"], Vec::<&str>::new(), "h2"),
//! ];
//! let outcome = build_graph(items, &config).unwrap();
//! for edge in outcome.graph.edges() {
//!     println!("{} {:.3}", edge.key, edge.score);
//! }
//! ```

pub mod ann;
pub mod cancel;
pub mod config;
pub mod error;
pub mod export;
pub mod fusion;
pub mod graph;
pub mod ingest;
pub mod item;
pub mod similarity;
pub mod store;

pub use cancel::CancelToken;
pub use config::{ConnectivityMode, GraphConfig};
pub use error::{CgError, CgResult};
pub use graph::builder::{
    BuildOutcome, build_graph, build_graph_from, build_graph_from_with_cancel,
    build_graph_with_cancel,
};
pub use graph::update::{
    UpdateOutcome, update_graph, update_graph_from, update_graph_from_with_cancel,
    update_graph_with_cancel,
};
pub use graph::{EdgeKey, EdgeOrigin, KnowledgeGraph, RelationEdge};
pub use item::{ContentItem, ItemId};
