//! Durable index snapshots.
//!
//! A snapshot is a directory holding the raw usearch index file and a
//! JSON manifest. The manifest makes the artifact self-describing: the
//! similarity metric, the embedding dimension, and every entry
//! (internal key, record id, content, metadata) in insertion order.
//! Nothing outside the directory is needed to reconstruct the index.
//!
//! Writes are atomic at the directory level: the snapshot is staged
//! next to the target and swapped in with renames, so a failed save
//! never leaves a partially-written artifact visible.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{SnapshotError, VectorError};
use crate::hnsw::{HnswConfig, HnswIndex};

/// Raw index file inside a snapshot directory.
pub const INDEX_FILE: &str = "hnsw.usearch";
/// Manifest file inside a snapshot directory.
pub const MANIFEST_FILE: &str = "manifest.json";

const METRIC_COSINE: &str = "cosine";

/// One indexed record as persisted in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Internal usearch key, assigned in submission order
    pub key: u64,
    /// Record identifier, unique within the index
    pub id: String,
    /// Embedded content
    pub content: String,
    /// Source metadata, preserved verbatim
    pub metadata: Map<String, Value>,
}

/// Snapshot manifest: metric configuration plus all entries.
#[derive(Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub metric: String,
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<ManifestEntry>,
}

/// A snapshot reconstructed in memory. Read-only after load; concurrent
/// queries share it without locking.
pub struct LoadedIndex {
    index: HnswIndex,
    entries: Vec<ManifestEntry>,
    by_key: HashMap<u64, usize>,
}

impl LoadedIndex {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> &HnswIndex {
        &self.index
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Look up the manifest entry behind a search hit.
    pub fn entry_for(&self, key: u64) -> Option<&ManifestEntry> {
        self.by_key.get(&key).map(|&i| &self.entries[i])
    }
}

/// Persist an index and its entries as an atomic snapshot at `dir`.
///
/// Entries are written sorted by key, i.e. in insertion order.
pub fn save(
    dir: &Path,
    index: &HnswIndex,
    mut entries: Vec<ManifestEntry>,
) -> Result<(), SnapshotError> {
    entries.sort_by_key(|e| e.key);
    let manifest = Manifest {
        metric: METRIC_COSINE.to_string(),
        dimension: index.dimension(),
        created_at: Utc::now(),
        entries,
    };

    if let Some(parent) = dir.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let staging = sibling(dir, "staging");
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    index.save_file(&staging.join(INDEX_FILE))?;
    fs::write(
        staging.join(MANIFEST_FILE),
        serde_json::to_vec_pretty(&manifest)?,
    )?;

    // Swap the staged directory into place. The two renames cannot be
    // one atomic operation; a crash between them leaves the previous
    // snapshot intact under the "old" sibling, never a partial one at
    // `dir`.
    if dir.exists() {
        let old = sibling(dir, "old");
        if old.exists() {
            fs::remove_dir_all(&old)?;
        }
        fs::rename(dir, &old)?;
        if let Err(e) = fs::rename(&staging, dir) {
            // Put the previous snapshot back before surfacing the error.
            let _ = fs::rename(&old, dir);
            return Err(e.into());
        }
        fs::remove_dir_all(&old)?;
    } else {
        fs::rename(&staging, dir)?;
    }

    info!(path = ?dir, entries = manifest.entries.len(), "Saved index snapshot");
    Ok(())
}

/// Load a snapshot from `dir`.
///
/// A missing directory or manifest is [`SnapshotError::NotFound`];
/// anything unreadable or inconsistent is [`SnapshotError::Corrupt`].
pub fn load(dir: &Path) -> Result<LoadedIndex, SnapshotError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(SnapshotError::NotFound(dir.to_path_buf()));
    }

    let raw = fs::read(&manifest_path)?;
    let manifest: Manifest =
        serde_json::from_slice(&raw).map_err(|e| corrupt(dir, format!("bad manifest: {e}")))?;

    if manifest.metric != METRIC_COSINE {
        return Err(corrupt(
            dir,
            format!("unsupported metric '{}'", manifest.metric),
        ));
    }

    let index_path = dir.join(INDEX_FILE);
    if !index_path.exists() {
        return Err(corrupt(dir, format!("missing {INDEX_FILE}")));
    }

    let config = HnswConfig::new(manifest.dimension, manifest.entries.len());
    let index = match HnswIndex::load_file(config, &index_path) {
        Ok(index) => index,
        Err(VectorError::Index(detail)) => return Err(corrupt(dir, detail)),
        Err(e) => return Err(e.into()),
    };

    if index.len() != manifest.entries.len() {
        return Err(corrupt(
            dir,
            format!(
                "index holds {} vectors but manifest lists {} entries",
                index.len(),
                manifest.entries.len()
            ),
        ));
    }

    let mut entries = manifest.entries;
    entries.sort_by_key(|e| e.key);
    let by_key = entries
        .iter()
        .enumerate()
        .map(|(i, e)| (e.key, i))
        .collect();

    info!(path = ?dir, entries = entries.len(), dim = manifest.dimension, "Loaded index snapshot");
    Ok(LoadedIndex {
        index,
        entries,
        by_key,
    })
}

fn sibling(dir: &Path, suffix: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string());
    dir.with_file_name(format!(".{name}.{suffix}"))
}

fn corrupt(dir: &Path, detail: String) -> SnapshotError {
    SnapshotError::Corrupt {
        path: dir.to_path_buf(),
        detail,
    }
}
