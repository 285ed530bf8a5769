//! # rag-retrieval
//!
//! The query-time half of club-rag: embed the query, search the loaded
//! index, and assemble the retrieved records into one context block for
//! the generation prompt.

pub mod error;
pub mod pipeline;

pub use error::RetrievalError;
pub use pipeline::{RetrievalPipeline, RetrievedContext, RetrievedEntry};
