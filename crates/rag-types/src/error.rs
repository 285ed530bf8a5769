//! Error types shared across the club-rag crates.

use thiserror::Error;

/// Unified error type for configuration and input handling.
#[derive(Debug, Error)]
pub enum RagError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input, rejected before any remote call
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
