//! Generation error types.

use thiserror::Error;

/// Errors from the streaming generator.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Transport-level failure before any response arrived
    #[error("Generator request failed: {0}")]
    Http(String),

    /// Non-success HTTP status from the API
    #[error("Generator returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The stream broke after it was opened; the delivered prefix stands
    #[error("Generation stream failed: {0}")]
    Stream(String),

    /// Client construction / configuration error
    #[error("Generator configuration error: {0}")]
    Config(String),
}
