//! Parallel pair scoring shared by full builds, incremental updates and repair.
//!
//! Work is organised as rows of the pair matrix: an anchor item plus the items
//! it is compared against. Rows are scored in chunks of `batch_size` with rayon;
//! the cancellation token is checked between chunks. Chunk results are
//! collected in row order, so the output does not depend on thread scheduling.

use rayon::prelude::*;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::GraphError;
use crate::fusion::FusionWeights;
use crate::item::ContentItem;
use crate::similarity::{self, SignalScores};

use super::{EdgeKey, EdgeOrigin, GraphResult, RelationEdge, SkippedPair};

/// One scored pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPair {
    pub key: EdgeKey,
    pub signals: SignalScores,
    pub score: f64,
}

impl ScoredPair {
    /// Turn the pair into an edge of the given origin.
    pub fn into_edge(self, origin: EdgeOrigin) -> RelationEdge {
        RelationEdge {
            key: self.key,
            score: self.score,
            signals: self.signals,
            origin,
        }
    }

    /// Whether `self` should be preferred over `other` as a repair edge:
    /// higher score first, then the smaller canonical key.
    pub(crate) fn beats(&self, other: &ScoredPair) -> bool {
        self.score > other.score || (self.score == other.score && self.key < other.key)
    }
}

/// Aggregated output of a scoring run.
#[derive(Debug, Default)]
pub struct PairScores {
    /// Pairs whose composite reached the threshold, in row order.
    pub retained: Vec<ScoredPair>,
    /// Pairs that could not be compared.
    pub skipped: Vec<SkippedPair>,
    /// Pairs that were compared, successful or not.
    pub pairs_scored: usize,
}

/// Score a single pair. Self-pairs yield `Ok(None)`.
pub fn score_pair(
    a: &ContentItem,
    b: &ContentItem,
    weights: &FusionWeights,
) -> Result<Option<ScoredPair>, SkippedPair> {
    let Some(key) = EdgeKey::of(&a.id, &b.id) else {
        return Ok(None);
    };
    match similarity::compare(a, b) {
        Ok(signals) => Ok(Some(ScoredPair {
            score: weights.fuse(&signals),
            key,
            signals,
        })),
        Err(reason) => Err(SkippedPair { key, reason }),
    }
}

fn score_row(
    anchor: &ContentItem,
    others: &[&ContentItem],
    weights: &FusionWeights,
    threshold: f64,
) -> PairScores {
    let mut out = PairScores::default();
    for other in others {
        match score_pair(anchor, other, weights) {
            Ok(Some(pair)) => {
                out.pairs_scored += 1;
                if pair.score >= threshold {
                    out.retained.push(pair);
                }
            }
            Ok(None) => {}
            Err(skipped) => {
                out.pairs_scored += 1;
                out.skipped.push(skipped);
            }
        }
    }
    out
}

/// Score `rows_total` rows of the pair matrix.
///
/// `row(i)` yields the anchor for row `i` and the items it is compared with.
/// Returns [`GraphError::Cancelled`] if the token fires between chunks.
pub fn score_rows<'a, F>(
    rows_total: usize,
    row: F,
    weights: &FusionWeights,
    threshold: f64,
    batch_size: usize,
    cancel: &CancelToken,
) -> GraphResult<PairScores>
where
    F: Fn(usize) -> (&'a ContentItem, Vec<&'a ContentItem>) + Sync,
{
    let batch_size = batch_size.max(1);
    let mut out = PairScores::default();
    let mut start = 0;
    while start < rows_total {
        if cancel.is_cancelled() {
            return Err(GraphError::Cancelled {
                rows_done: start,
                rows_total,
            });
        }
        let end = (start + batch_size).min(rows_total);
        let chunk: Vec<PairScores> = (start..end)
            .into_par_iter()
            .map(|i| {
                let (anchor, others) = row(i);
                score_row(anchor, &others, weights, threshold)
            })
            .collect();
        for part in chunk {
            out.pairs_scored += part.pairs_scored;
            out.retained.extend(part.retained);
            out.skipped.extend(part.skipped);
        }
        debug!(
            rows_done = end,
            rows_total,
            retained = out.retained.len(),
            "scored pair batch"
        );
        start = end;
    }
    Ok(out)
}

/// Score every unordered pair of `items` (upper triangle of the pair matrix).
pub fn score_all_pairs(
    items: &[&ContentItem],
    weights: &FusionWeights,
    threshold: f64,
    batch_size: usize,
    cancel: &CancelToken,
) -> GraphResult<PairScores> {
    score_rows(
        items.len(),
        |i| (items[i], items[i + 1..].to_vec()),
        weights,
        threshold,
        batch_size,
        cancel,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, embedding: Vec<f32>, topics: &[&str]) -> ContentItem {
        ContentItem::new(id, embedding, topics.to_vec(), Vec::<&str>::new(), "h")
    }

    fn fixture() -> Vec<ContentItem> {
        vec![
            item("a", vec![1.0, 0.0], &["rust"]),
            item("b", vec![1.0, 0.1], &["rust"]),
            item("c", vec![-1.0, 0.0], &["cooking"]),
            item("d", vec![0.0, 1.0], &[]),
        ]
    }

    #[test]
    fn all_pairs_counted_once() {
        let items = fixture();
        let refs: Vec<&ContentItem> = items.iter().collect();
        let out = score_all_pairs(&refs, &FusionWeights::default(), 0.0, 2, &CancelToken::new())
            .unwrap();
        assert_eq!(out.pairs_scored, 6);
        assert_eq!(out.retained.len(), 6);
        assert!(out.skipped.is_empty());
        for pair in &out.retained {
            assert!(pair.key.source < pair.key.target);
        }
    }

    #[test]
    fn threshold_filters_pairs() {
        let items = fixture();
        let refs: Vec<&ContentItem> = items.iter().collect();
        let out = score_all_pairs(&refs, &FusionWeights::default(), 0.85, 64, &CancelToken::new())
            .unwrap();
        assert_eq!(out.retained.len(), 1);
        assert_eq!(out.retained[0].key.to_string(), "a -- b");
    }

    #[test]
    fn output_independent_of_batch_size() {
        let items = fixture();
        let refs: Vec<&ContentItem> = items.iter().collect();
        let w = FusionWeights::default();
        let one = score_all_pairs(&refs, &w, 0.2, 1, &CancelToken::new()).unwrap();
        let many = score_all_pairs(&refs, &w, 0.2, 100, &CancelToken::new()).unwrap();
        assert_eq!(one.retained, many.retained);
    }

    #[test]
    fn mismatched_dimensions_are_skipped() {
        let items = vec![
            item("a", vec![1.0, 0.0], &[]),
            item("b", vec![1.0, 0.0, 0.0], &[]),
            item("c", vec![1.0, 0.0], &[]),
        ];
        let refs: Vec<&ContentItem> = items.iter().collect();
        let out = score_all_pairs(&refs, &FusionWeights::default(), 0.0, 64, &CancelToken::new())
            .unwrap();
        assert_eq!(out.pairs_scored, 3);
        assert_eq!(out.skipped.len(), 2);
        assert_eq!(out.retained.len(), 1);
    }

    #[test]
    fn cancelled_token_aborts_before_scoring() {
        let items = fixture();
        let refs: Vec<&ContentItem> = items.iter().collect();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = score_all_pairs(&refs, &FusionWeights::default(), 0.0, 1, &cancel).unwrap_err();
        assert!(matches!(
            err,
            GraphError::Cancelled {
                rows_done: 0,
                rows_total: 4
            }
        ));
    }

    #[test]
    fn self_pair_is_ignored() {
        let a = item("a", vec![1.0], &[]);
        assert!(matches!(score_pair(&a, &a, &FusionWeights::default()), Ok(None)));
    }

    #[test]
    fn tie_break_prefers_smaller_key() {
        let s = SignalScores {
            embedding: 0.5,
            topic: 0.0,
            entity: 0.0,
        };
        let ab = ScoredPair {
            key: EdgeKey::new("a".into(), "b".into()).unwrap(),
            signals: s,
            score: 0.3,
        };
        let ac = ScoredPair {
            key: EdgeKey::new("a".into(), "c".into()).unwrap(),
            ..ab.clone()
        };
        assert!(ab.beats(&ac));
        assert!(!ac.beats(&ab));
    }
}
