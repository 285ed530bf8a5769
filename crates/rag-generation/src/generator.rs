//! The generator seam.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::GenerationError;

/// A lazy, finite sequence of generated text tokens, in model order.
/// An `Err` item terminates the stream; it cannot be resumed.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// Trait for streaming text generators.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Open a streaming generation for the rendered prompt.
    ///
    /// An error here means no stream was opened and nothing was
    /// delivered. Errors inside the returned stream terminate it after
    /// whatever prefix the caller already received.
    async fn stream(&self, prompt: &str) -> Result<TokenStream, GenerationError>;
}
