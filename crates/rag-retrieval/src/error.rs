//! Retrieval error types.
//!
//! The three failure classes of the query path stay distinct: a missing
//! or corrupt index artifact cannot be fixed by retrying a remote call,
//! an embedder failure says nothing about the artifact, and invalid
//! input is rejected before either is touched.

use thiserror::Error;

use rag_embeddings::EmbedderError;
use rag_vector::SnapshotError;

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The index snapshot could not be loaded
    #[error("Index unavailable: {0}")]
    Index(#[from] SnapshotError),

    /// The query could not be embedded
    #[error("Query embedding failed: {0}")]
    Embedding(#[from] EmbedderError),

    /// Malformed request, rejected without any remote call
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
