//! Rich diagnostic error types for the content-graph engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers know exactly
//! what went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the content-graph engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum CgError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),
}

// ---------------------------------------------------------------------------
// Signal errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
pub enum SignalError {
    #[error("dimension mismatch between {left} and {right}: {left_dim} vs {right_dim}")]
    #[diagnostic(
        code(cgraph::signal::dim_mismatch),
        help(
            "Both embeddings of a pair must have the same length. \
             Re-embed the offending item with the deployment's model, \
             or reject it at ingestion by setting `dimension` in the config."
        )
    )]
    DimensionMismatch {
        left: String,
        right: String,
        left_dim: usize,
        right_dim: usize,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error(
        "invalid fusion weights: embedding={embedding}, topic={topic}, entity={entity} (sum {sum})"
    )]
    #[diagnostic(
        code(cgraph::config::invalid_weights),
        help(
            "Fusion weights must be finite, non-negative and sum to 1.0 \
             (tolerance 1e-6). The default split is 0.6 / 0.3 / 0.1."
        )
    )]
    InvalidWeights {
        embedding: f64,
        topic: f64,
        entity: f64,
        sum: f64,
    },

    #[error("invalid relevance threshold: {threshold}")]
    #[diagnostic(
        code(cgraph::config::invalid_threshold),
        help("The relevance threshold is a composite score and must lie in [0.0, 1.0].")
    )]
    InvalidThreshold { threshold: f64 },

    #[error("invalid embedding dimension: {dimension}")]
    #[diagnostic(
        code(cgraph::config::invalid_dimension),
        help("The embedding dimension must be a positive integer matching the embedding model.")
    )]
    InvalidDimension { dimension: usize },

    #[error("invalid batch size: {batch_size}")]
    #[diagnostic(
        code(cgraph::config::invalid_batch_size),
        help("`batch_size` is the number of pair-matrix rows scored between cancellation checks; use a value > 0.")
    )]
    InvalidBatchSize { batch_size: usize },

    #[error("invalid candidate limit: {limit}")]
    #[diagnostic(
        code(cgraph::config::invalid_candidate_limit),
        help("`candidate_limit` must be > 0 when set. Remove it to score every pair.")
    )]
    InvalidCandidateLimit { limit: usize },

    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(cgraph::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(cgraph::config::parse),
        help("Check the TOML syntax. `cgraph config init` writes a valid default file.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(cgraph::config::write),
        help("Ensure you have write permissions to the target directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Ingestion errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum IngestError {
    #[error("malformed record #{index} ({id}): {reason}")]
    #[diagnostic(
        code(cgraph::ingest::malformed),
        help(
            "Every content record needs a non-empty id, a non-empty content hash \
             and a finite embedding of the configured dimension. Topics and \
             entities may be empty."
        )
    )]
    MalformedRecord {
        index: usize,
        id: String,
        reason: String,
    },

    #[error("failed to read records: {path}")]
    #[diagnostic(
        code(cgraph::ingest::read),
        help("Ensure the records file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse records: {message}")]
    #[diagnostic(
        code(cgraph::ingest::parse),
        help("Records must be a JSON array of objects with id, embedding, topics, entities and content_hash.")
    )]
    Parse { message: String },
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("graph construction cancelled after {rows_done} of {rows_total} rows")]
    #[diagnostic(
        code(cgraph::graph::cancelled),
        help("The rebuild was cancelled; no partial graph was produced and any prior graph is unchanged.")
    )]
    Cancelled { rows_done: usize, rows_total: usize },

    #[error("item not found: {id}")]
    #[diagnostic(
        code(cgraph::graph::item_not_found),
        help("The id is not part of this graph. List items with `cgraph info`.")
    )]
    ItemNotFound { id: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(cgraph::graph::serde),
        help(
            "Failed to encode or decode a graph snapshot. \
             This usually means the file was written by an incompatible version; rebuild the graph."
        )
    )]
    Serialization { message: String },

    #[error("I/O error on {path}")]
    #[diagnostic(
        code(cgraph::graph::io),
        help("Check that the path exists, has correct permissions, and that the disk is not full.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

/// Convenience alias for functions returning content-graph results.
pub type CgResult<T> = std::result::Result<T, CgError>;
