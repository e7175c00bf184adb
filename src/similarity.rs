//! Pairwise relevance signals: embedding cosine, topic Jaccard, entity Jaccard.
//!
//! Every signal lies in [0, 1]. All functions here are pure; they read their
//! two inputs and nothing else.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::SignalError;
use crate::item::ContentItem;

/// Result type for signal computation.
pub type SignalResult<T> = std::result::Result<T, SignalError>;

/// The three independent signals for one pair of items.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalScores {
    /// Cosine similarity rescaled from [-1, 1] to [0, 1].
    pub embedding: f64,
    /// Jaccard similarity of the topic sets.
    pub topic: f64,
    /// Jaccard similarity of the entity sets.
    pub entity: f64,
}

/// Compute all three signals for a pair.
///
/// Fails with [`SignalError::DimensionMismatch`] if the embeddings differ in length.
pub fn compare(a: &ContentItem, b: &ContentItem) -> SignalResult<SignalScores> {
    if a.embedding.len() != b.embedding.len() {
        return Err(SignalError::DimensionMismatch {
            left: a.id.to_string(),
            right: b.id.to_string(),
            left_dim: a.embedding.len(),
            right_dim: b.embedding.len(),
        });
    }
    Ok(SignalScores {
        embedding: rescaled_cosine(&a.embedding, &b.embedding),
        topic: jaccard(&a.topics, &b.topics),
        entity: jaccard(&a.entities, &b.entities),
    })
}

/// Cosine similarity of two equal-length vectors, accumulated in f64.
///
/// A zero-norm vector has no direction; its cosine with anything is 0. The
/// same holds for vectors carrying non-finite components.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let cos = dot / (norm_a.sqrt() * norm_b.sqrt());
    if cos.is_finite() {
        cos.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Cosine mapped from [-1, 1] to [0, 1] via `(cos + 1) / 2`.
pub fn rescaled_cosine(a: &[f32], b: &[f32]) -> f64 {
    (cosine(a, b) + 1.0) / 2.0
}

/// Jaccard index `|A ∩ B| / |A ∪ B|`; 0 when both sets are empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}
