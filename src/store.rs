//! Signal store: per-item embedding, topic and entity signals.
//!
//! [`SignalSource`] is the read interface graph construction draws items from
//! (`build_graph_from`, `update_graph_from`). [`MemorySignalStore`] is a
//! concurrent in-memory implementation backed by DashMap; a
//! [`KnowledgeGraph`](crate::graph::KnowledgeGraph) is also a source, which is
//! how a saved graph is rebuilt under a new configuration. Fetching records
//! from external storage is the caller's concern and happens before any
//! scoring starts.

use std::sync::Arc;

use dashmap::DashMap;

use crate::item::{ContentItem, ItemId};

/// Read access to item signals.
pub trait SignalSource {
    /// Look up one item.
    fn get(&self, id: &ItemId) -> Option<Arc<ContentItem>>;

    /// All known ids, sorted.
    fn ids(&self) -> Vec<ItemId>;

    /// Number of items.
    fn len(&self) -> usize;

    /// Whether the source is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Concurrent in-memory signal store using a sharded hashmap.
#[derive(Debug, Default)]
pub struct MemorySignalStore {
    data: DashMap<ItemId, Arc<ContentItem>>,
}

impl MemorySignalStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: DashMap::with_capacity(capacity),
        }
    }

    /// Insert or replace an item.
    ///
    /// Returns `true` when the item is new or its content hash changed.
    pub fn put(&self, item: ContentItem) -> bool {
        let changed = self
            .data
            .get(&item.id)
            .map(|existing| existing.content_hash != item.content_hash)
            .unwrap_or(true);
        self.data.insert(item.id.clone(), Arc::new(item));
        changed
    }

    /// Remove an item and return it.
    pub fn remove(&self, id: &ItemId) -> Option<Arc<ContentItem>> {
        self.data.remove(id).map(|(_, v)| v)
    }

    /// Check if an id exists.
    pub fn contains(&self, id: &ItemId) -> bool {
        self.data.contains_key(id)
    }

    /// All items sorted by id (snapshot; not a consistent view under concurrent writes).
    pub fn snapshot(&self) -> Vec<Arc<ContentItem>> {
        let mut items: Vec<Arc<ContentItem>> =
            self.data.iter().map(|entry| Arc::clone(entry.value())).collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        items
    }
}

impl SignalSource for MemorySignalStore {
    fn get(&self, id: &ItemId) -> Option<Arc<ContentItem>> {
        self.data.get(id).map(|v| Arc::clone(v.value()))
    }

    fn ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.data.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}
