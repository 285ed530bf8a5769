//! Ingestion writer: records in, index entries out.
//!
//! Each record becomes one scheduler unit whose action is "embed the
//! content, insert the vector, record the manifest entry". The
//! scheduler owns admission and retries; this module owns the unit
//! bodies and the per-record accounting. A record whose unit exhausts
//! its retries is reported and omitted from the index; it never aborts
//! the batch.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rag_embeddings::{Embedder, EmbedderError};
use rag_scheduler::{Scheduler, Unit, UnitError};
use rag_types::Record;

use crate::error::{SnapshotError, VectorError};
use crate::hnsw::{HnswConfig, HnswIndex};
use crate::snapshot::{self, ManifestEntry};

/// Failure of a single embed-and-insert attempt.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Embed(#[from] EmbedderError),

    #[error(transparent)]
    Index(#[from] VectorError),
}

/// A fresh index being populated. Exclusively owned by the ingestion
/// process; not safe to query while population is in progress.
pub struct IndexBuilder {
    index: Arc<HnswIndex>,
    entries: Arc<Mutex<Vec<ManifestEntry>>>,
}

impl IndexBuilder {
    /// Create an empty index sized for `capacity` records.
    pub fn create_empty(dimension: usize, capacity: usize) -> Result<Self, VectorError> {
        let index = HnswIndex::new(HnswConfig::new(dimension, capacity))?;
        Ok(Self {
            index: Arc::new(index),
            entries: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Entries successfully written so far.
    pub fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Persist the populated index as an atomic snapshot.
    pub fn save(&self, dir: &std::path::Path) -> Result<(), SnapshotError> {
        let entries = self.entries.lock().unwrap().clone();
        snapshot::save(dir, &self.index, entries)
    }
}

/// Settled outcome for one record.
#[derive(Debug)]
pub struct PopulateOutcome {
    pub id: String,
    pub attempts: u32,
    /// Failed-attempt events recorded for this record
    pub failed_attempts: u32,
    /// Terminal error, if the record was not indexed
    pub error: Option<String>,
}

impl PopulateOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate result of populating an index from a record batch.
#[derive(Debug)]
pub struct PopulateReport {
    /// Records submitted (duplicates excluded)
    pub total: usize,
    /// Records dropped up front because their id was already in the batch
    pub duplicates: usize,
    pub outcomes: Vec<PopulateOutcome>,
}

impl PopulateReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.id.as_str())
            .collect()
    }
}

/// Populate `builder` from `records`, one scheduler unit per record.
///
/// Internal keys are assigned in submission order, which fixes the
/// tie-break order for equally-scored search results later. Records
/// with an id already seen in the batch are skipped before scheduling,
/// keeping identifiers unique within the index.
pub async fn populate(
    builder: &IndexBuilder,
    records: Vec<Record>,
    embedder: Arc<dyn Embedder>,
    scheduler: &Scheduler,
    cancel: CancellationToken,
) -> PopulateReport {
    let mut seen: HashSet<String> = HashSet::new();
    let mut duplicates = 0usize;
    let mut units = Vec::new();

    for record in records {
        if !seen.insert(record.id.clone()) {
            warn!(record = %record.id, "Duplicate record id in batch, skipping");
            duplicates += 1;
            continue;
        }

        let key = units.len() as u64;
        let record = Arc::new(record);
        let embedder = Arc::clone(&embedder);
        let index = Arc::clone(&builder.index);
        let entries = Arc::clone(&builder.entries);
        let label = record.id.clone();

        units.push(Unit::new(label, move || {
            let record = Arc::clone(&record);
            let embedder = Arc::clone(&embedder);
            let index = Arc::clone(&index);
            let entries = Arc::clone(&entries);
            async move {
                let embedding = embedder.embed(&record.content).await?;
                index.add(key, &embedding)?;
                entries.lock().unwrap().push(ManifestEntry {
                    key,
                    id: record.id.clone(),
                    content: record.content.clone(),
                    metadata: record.metadata.clone(),
                });
                info!(record = %record.id, "Indexed record");
                Ok::<String, WriteError>(record.id.clone())
            }
        }));
    }

    let total = units.len();
    let report = scheduler.run(units, cancel).await;

    let outcomes = report
        .outcomes
        .into_iter()
        .map(|outcome| {
            let error = match &outcome.result {
                Ok(_) => None,
                Err(UnitError::Cancelled) => Some("cancelled before start".to_string()),
                Err(e) => {
                    warn!(record = %outcome.label, error = %e, "Record not indexed");
                    Some(e.to_string())
                }
            };
            PopulateOutcome {
                id: outcome.label,
                attempts: outcome.attempts,
                failed_attempts: outcome.failed_attempts,
                error,
            }
        })
        .collect();

    PopulateReport {
        total,
        duplicates,
        outcomes,
    }
}
