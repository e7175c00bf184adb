//! Weighted fusion of the three relevance signals into one composite score.
//!
//! `score = w_emb * embedding + w_topic * topic + w_entity * entity`
//!
//! Weights are non-negative and sum to 1, so the composite stays in [0, 1]
//! and is monotonic non-decreasing in every signal.

use serde::{Deserialize, Serialize};

use crate::config::ConfigResult;
use crate::error::ConfigError;
use crate::similarity::SignalScores;

/// Tolerance on the weight sum.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Fusion weights for the embedding, topic and entity signals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    /// Weight for embedding similarity (default: 0.6).
    #[serde(default = "default_embedding_weight")]
    pub embedding: f64,
    /// Weight for topic overlap (default: 0.3).
    #[serde(default = "default_topic_weight")]
    pub topic: f64,
    /// Weight for entity overlap (default: 0.1).
    #[serde(default = "default_entity_weight")]
    pub entity: f64,
}

fn default_embedding_weight() -> f64 {
    0.6
}
fn default_topic_weight() -> f64 {
    0.3
}
fn default_entity_weight() -> f64 {
    0.1
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            embedding: default_embedding_weight(),
            topic: default_topic_weight(),
            entity: default_entity_weight(),
        }
    }
}

impl FusionWeights {
    /// Build validated weights.
    pub fn new(embedding: f64, topic: f64, entity: f64) -> ConfigResult<Self> {
        let weights = Self {
            embedding,
            topic,
            entity,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Check that the weights are finite, non-negative and sum to 1.
    pub fn validate(&self) -> ConfigResult<()> {
        let parts = [self.embedding, self.topic, self.entity];
        let sum: f64 = parts.iter().sum();
        let well_formed = parts.iter().all(|w| w.is_finite() && *w >= 0.0);
        if !well_formed || (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::InvalidWeights {
                embedding: self.embedding,
                topic: self.topic,
                entity: self.entity,
                sum,
            });
        }
        Ok(())
    }

    /// Composite relevance score for a set of signals, clamped to [0, 1].
    pub fn fuse(&self, signals: &SignalScores) -> f64 {
        let score = self.embedding * signals.embedding
            + self.topic * signals.topic
            + self.entity * signals.entity;
        if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}
