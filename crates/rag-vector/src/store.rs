//! Process-wide access to the loaded index.
//!
//! The snapshot is identical for every caller and read-only once in
//! memory, so it is loaded at most once per process lifetime: the store
//! is an initialize-once handle created at startup and passed to the
//! retrieval side explicitly. Concurrent first callers all await the
//! same load instead of each triggering their own.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::error::SnapshotError;
use crate::snapshot::{self, LoadedIndex};

/// Lazily-loading handle to the persisted index snapshot.
pub struct IndexStore {
    path: PathBuf,
    cell: OnceCell<Arc<LoadedIndex>>,
    loads: AtomicUsize,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cell: OnceCell::new(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Return the in-memory index, loading the snapshot on first use.
    ///
    /// A failed load leaves the cell empty, so a later call retries
    /// (e.g., after the operator restores the artifact).
    pub async fn get_or_load(&self) -> Result<Arc<LoadedIndex>, SnapshotError> {
        self.cell
            .get_or_try_init(|| async {
                self.loads.fetch_add(1, Ordering::SeqCst);
                info!(path = ?self.path, "Loading index snapshot into memory");
                let loaded = snapshot::load(&self.path)?;
                Ok(Arc::new(loaded))
            })
            .await
            .cloned()
    }

    /// How many underlying loads have been attempted.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}
