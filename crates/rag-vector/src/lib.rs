//! # rag-vector
//!
//! The persistent similarity index for club-rag.
//!
//! Ingestion side: [`IndexBuilder`] owns a fresh HNSW index while
//! [`populate`] pushes one embed-and-insert unit per record through the
//! rate-limited scheduler, then [`IndexBuilder::save`] persists an
//! atomic snapshot (usearch index file + self-describing JSON manifest).
//!
//! Serving side: [`IndexStore`] loads that snapshot exactly once per
//! process into a read-only [`LoadedIndex`] shared by all queries.

pub mod error;
pub mod hnsw;
pub mod snapshot;
pub mod store;
pub mod writer;

pub use error::{SnapshotError, VectorError};
pub use hnsw::{HnswConfig, HnswIndex, SearchHit};
pub use snapshot::{LoadedIndex, Manifest, ManifestEntry, INDEX_FILE, MANIFEST_FILE};
pub use store::IndexStore;
pub use writer::{populate, IndexBuilder, PopulateOutcome, PopulateReport, WriteError};
