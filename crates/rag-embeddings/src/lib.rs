//! # rag-embeddings
//!
//! Embedding types and the embedder seam for club-rag.
//!
//! The embedder is an opaque remote capability: text goes in, a
//! fixed-length vector comes out, subject to an external rate limit and
//! transient failures. Rate limiting and retries are *not* handled here;
//! the ingestion scheduler is the sole caller-side protection.
//!
//! ## Features
//! - [`Embedding`]: normalized vector with cosine similarity
//! - [`Embedder`]: async trait at the remote-call boundary
//! - [`OpenAiEmbedder`]: OpenAI-compatible `/embeddings` client
//! - [`MockEmbedder`]: deterministic bag-of-words double for tests

pub mod error;
pub mod mock;
pub mod model;
pub mod remote;

pub use error::EmbedderError;
pub use mock::MockEmbedder;
pub use model::{Embedder, Embedding};
pub use remote::{OpenAiEmbedder, RemoteEmbedderConfig};
