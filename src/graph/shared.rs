//! Copy-on-write handle for serving a graph while it is rebuilt.
//!
//! Readers take an `Arc` snapshot and keep it as long as they like. Writers
//! compute a new graph off-lock and swap it in; a failed or cancelled write
//! leaves the published graph untouched.

use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use crate::cancel::CancelToken;
use crate::config::GraphConfig;
use crate::item::ContentItem;

use super::builder::{BuildOutcome, build_graph_with_cancel};
use super::update::{UpdateOutcome, update_graph_with_cancel};
use super::{GraphResult, KnowledgeGraph};

/// A published graph shared between readers and one writer at a time.
#[derive(Debug, Default)]
pub struct SharedGraph {
    current: RwLock<Arc<KnowledgeGraph>>,
    /// Serialises writers so concurrent updates cannot lose each other's work.
    writer: Mutex<()>,
}

impl SharedGraph {
    /// Publish an initial graph.
    pub fn new(graph: KnowledgeGraph) -> Self {
        Self {
            current: RwLock::new(Arc::new(graph)),
            writer: Mutex::new(()),
        }
    }

    /// The currently published graph.
    pub fn snapshot(&self) -> Arc<KnowledgeGraph> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn publish(&self, graph: KnowledgeGraph) {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::new(graph);
    }

    /// Rebuild from scratch and publish the result.
    ///
    /// On error the previous graph stays published. The returned outcome's
    /// `graph` is a copy of what was published.
    pub fn rebuild(
        &self,
        items: Vec<ContentItem>,
        config: &GraphConfig,
        cancel: &CancelToken,
    ) -> GraphResult<BuildOutcome> {
        let _writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        let outcome = build_graph_with_cancel(items, config, cancel)?;
        self.publish(outcome.graph.clone());
        debug!(items = outcome.graph.item_count(), "published rebuilt graph");
        Ok(outcome)
    }

    /// Apply an incremental update to a copy of the published graph and
    /// publish the result.
    pub fn apply(
        &self,
        changed: Vec<ContentItem>,
        config: &GraphConfig,
        cancel: &CancelToken,
    ) -> GraphResult<UpdateOutcome> {
        let _writer = self.writer.lock().unwrap_or_else(|p| p.into_inner());
        let base = KnowledgeGraph::clone(&self.snapshot());
        let outcome = update_graph_with_cancel(base, changed, config, cancel)?;
        self.publish(outcome.graph.clone());
        debug!(items = outcome.graph.item_count(), "published updated graph");
        Ok(outcome)
    }
}
