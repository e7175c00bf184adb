//! Graph construction configuration, persisted as TOML.
//!
//! Validation runs before any scoring work starts; an invalid configuration is
//! always surfaced to the caller immediately.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::fusion::FusionWeights;

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Which connectivity guarantee the repair pass enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityMode {
    /// The whole graph forms a single connected component.
    #[default]
    Connected,
    /// Every item has degree >= 1; several components may remain.
    NoIsolated,
}

impl std::fmt::Display for ConnectivityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityMode::Connected => write!(f, "connected"),
            ConnectivityMode::NoIsolated => write!(f, "no-isolated"),
        }
    }
}

/// Configuration for graph builds and incremental updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Minimum composite score for a threshold edge.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Embedding dimension enforced at ingestion.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Connectivity guarantee for the repair pass.
    #[serde(default)]
    pub connectivity: ConnectivityMode,
    /// Pair-matrix rows scored between cancellation checks.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Nearest neighbours per item for the approximate pre-filter.
    /// `None` scores every pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_limit: Option<usize>,
    /// Signal fusion weights.
    #[serde(default)]
    pub weights: FusionWeights,
}

fn default_threshold() -> f64 {
    0.35
}
fn default_dimension() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            dimension: default_dimension(),
            connectivity: ConnectivityMode::default(),
            batch_size: default_batch_size(),
            candidate_limit: None,
            weights: FusionWeights::default(),
        }
    }
}

impl GraphConfig {
    /// Default configuration for a given embedding dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            ..Default::default()
        }
    }

    /// Validate every field.
    pub fn validate(&self) -> ConfigResult<()> {
        self.weights.validate()?;
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidThreshold {
                threshold: self.threshold,
            });
        }
        if self.dimension == 0 {
            return Err(ConfigError::InvalidDimension {
                dimension: self.dimension,
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize {
                batch_size: self.batch_size,
            });
        }
        if let Some(0) = self.candidate_limit {
            return Err(ConfigError::InvalidCandidateLimit { limit: 0 });
        }
        Ok(())
    }

    /// Load and validate a config from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save the config as TOML.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}
