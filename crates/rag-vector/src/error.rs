//! Vector index and snapshot error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from in-memory index operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// usearch index error
    #[error("Index error: {0}")]
    Index(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the durable snapshot artifact.
///
/// Kept distinct from embedding-service failures: a missing or corrupt
/// artifact is a persistence problem, fatal to the retrieval path, and
/// retrying a remote call will not fix it.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// No snapshot at the configured path
    #[error("Index snapshot not found at {0}")]
    NotFound(PathBuf),

    /// Snapshot exists but cannot be reconstructed
    #[error("Index snapshot at {path} is corrupt: {detail}")]
    Corrupt { path: PathBuf, detail: String },

    /// IO error while reading or writing the artifact
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying index error
    #[error(transparent)]
    Vector(#[from] VectorError),
}
