//! Embedder error types.

use thiserror::Error;

/// Errors from the remote embedder.
///
/// All variants are treated as retryable by the ingestion scheduler; the
/// distinction matters for diagnostics, not for retry eligibility.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// Transport-level failure (connect, timeout, TLS)
    #[error("Embedder request failed: {0}")]
    Http(String),

    /// Non-success HTTP status from the API (429, 5xx, ...)
    #[error("Embedder returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response arrived but did not have the expected shape
    #[error("Invalid embedder response: {0}")]
    InvalidResponse(String),

    /// Returned vector had the wrong length
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Client construction / configuration error
    #[error("Embedder configuration error: {0}")]
    Config(String),
}
