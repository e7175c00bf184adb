//! Approximate nearest-neighbour candidate pre-filter.
//!
//! For large batches the exhaustive pair matrix dominates build time. When a
//! `candidate_limit` is configured, an HNSW index over the embeddings limits
//! full signal fusion to each item's `k` nearest neighbours. Candidate lists
//! are symmetric: if `j` is a neighbour of `i`, the pair is scored once under
//! its canonical row.

use std::collections::BTreeSet;

use anndists::dist::DistCosine;
use hnsw_rs::hnsw::Hnsw;
use tracing::{debug, warn};

use crate::item::ContentItem;

/// Maximum number of HNSW layers.
const MAX_LAYER: usize = 16;
/// Connections per node.
const MAX_CONNECTIONS: usize = 16;
/// Construction-time search width.
const EF_CONSTRUCTION: usize = 200;

/// Per-row candidate columns for an id-sorted item slice.
///
/// Entry `i` holds the indices `j > i` to compare against `items[i]`.
/// Returns `None` when the items do not share one embedding dimension; the
/// caller then scores exhaustively so mismatches are still reported per pair.
pub fn candidate_pairs(items: &[&ContentItem], k: usize) -> Option<Vec<BTreeSet<usize>>> {
    let n = items.len();
    let dimension = items.first()?.dimension();
    if items.iter().any(|it| it.dimension() != dimension) {
        warn!("mixed embedding dimensions, skipping approximate pre-filter");
        return None;
    }

    let hnsw: Hnsw<f32, DistCosine> =
        Hnsw::new(MAX_CONNECTIONS, n, MAX_LAYER, EF_CONSTRUCTION, DistCosine {});
    for (i, item) in items.iter().enumerate() {
        hnsw.insert((&item.embedding, i));
    }

    let ef_search = (k * 2).max(32);
    let mut rows: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    for (i, item) in items.iter().enumerate() {
        // One extra slot: the query point is usually its own nearest neighbour.
        for neighbour in hnsw.search(&item.embedding, k + 1, ef_search) {
            let j = neighbour.d_id;
            if j == i || j >= n {
                continue;
            }
            let (row, col) = if i < j { (i, j) } else { (j, i) };
            rows[row].insert(col);
        }
    }

    let candidates: usize = rows.iter().map(BTreeSet::len).sum();
    debug!(items = n, k, candidates, "approximate candidate pairs");
    Some(rows)
}
