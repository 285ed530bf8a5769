//! The retrieval pipeline.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use rag_embeddings::{Embedder, Embedding};
use rag_vector::{IndexStore, SnapshotError};

use crate::error::RetrievalError;

/// One retrieved record, ranked by similarity.
#[derive(Debug, Clone)]
pub struct RetrievedEntry {
    pub id: String,
    pub content: String,
    pub metadata: Map<String, Value>,
    /// Cosine similarity to the query (higher = closer)
    pub score: f32,
}

/// Ranked entries plus the formatted context block built from them.
#[derive(Debug, Clone)]
pub struct RetrievedContext {
    pub entries: Vec<RetrievedEntry>,
    /// Entry contents in rank order, separated by blank lines
    pub context: String,
}

/// Query-time retrieval over the lazily-loaded index.
///
/// The index handle is shared and read-only; concurrent queries go
/// through it without locking.
pub struct RetrievalPipeline {
    store: Arc<IndexStore>,
    embedder: Arc<dyn Embedder>,
    default_k: usize,
}

impl RetrievalPipeline {
    pub fn new(store: Arc<IndexStore>, embedder: Arc<dyn Embedder>, default_k: usize) -> Self {
        Self {
            store,
            embedder,
            default_k,
        }
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Embed the query text.
    pub async fn embed_query(&self, query: &str) -> Result<Embedding, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidInput(
                "query must not be empty".to_string(),
            ));
        }
        Ok(self.embedder.embed(query).await?)
    }

    /// Top-k search with an already-embedded query.
    ///
    /// `k` is clamped to the index size; `k == 0` is rejected. Score
    /// ties are broken by insertion order (internal key).
    pub async fn search(
        &self,
        query: &Embedding,
        k: usize,
    ) -> Result<RetrievedContext, RetrievalError> {
        if k == 0 {
            return Err(RetrievalError::InvalidInput("k must be > 0".to_string()));
        }

        let index = self.store.get_or_load().await?;
        let clamped = k.min(index.len());
        if clamped == 0 {
            debug!("Index is empty, returning no context");
            return Ok(RetrievedContext {
                entries: Vec::new(),
                context: String::new(),
            });
        }

        let mut hits = index
            .index()
            .search(query, clamped)
            .map_err(SnapshotError::from)?;
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.key.cmp(&b.key))
        });

        let mut entries = Vec::with_capacity(hits.len());
        for hit in hits {
            match index.entry_for(hit.key) {
                Some(entry) => entries.push(RetrievedEntry {
                    id: entry.id.clone(),
                    content: entry.content.clone(),
                    metadata: entry.metadata.clone(),
                    score: hit.score,
                }),
                None => warn!(key = hit.key, "Search hit has no manifest entry, dropping"),
            }
        }

        let context = entries
            .iter()
            .map(|e| e.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        debug!(requested = k, returned = entries.len(), "Retrieved context");
        Ok(RetrievedContext { entries, context })
    }

    /// Embed then search in one call.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievedContext, RetrievalError> {
        let embedding = self.embed_query(query).await?;
        self.search(&embedding, k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rag_embeddings::{EmbedderError, MockEmbedder};
    use rag_types::ClubRecord;
    use rag_vector::{snapshot, HnswConfig, HnswIndex, ManifestEntry, SnapshotError};
    use tempfile::TempDir;

    const DIM: usize = 64;

    fn club(id: &str, name: &str, agerange: &str, category: &str) -> ClubRecord {
        ClubRecord {
            id: id.to_string(),
            name: name.to_string(),
            municipality: "Sundsvall".to_string(),
            agerange: agerange.to_string(),
            category: category.to_string(),
            area: String::new(),
            activity: String::new(),
            url: String::new(),
        }
    }

    /// Snapshot with the two scenario clubs: sports for children,
    /// music for teenagers.
    fn write_club_snapshot(dir: &std::path::Path) {
        let embedder = MockEmbedder::new(DIM);
        let index = HnswIndex::new(HnswConfig::new(DIM, 4)).unwrap();
        let clubs = [
            club("club-a", "Club A", "7-12", "sports"),
            club("club-b", "Club B", "13-18", "music"),
        ];
        let mut entries = Vec::new();
        for (key, club) in clubs.into_iter().enumerate() {
            let key = key as u64;
            let record = club.into_record();
            index.add(key, &embedder.embed_sync(&record.content)).unwrap();
            entries.push(ManifestEntry {
                key,
                id: record.id,
                content: record.content,
                metadata: record.metadata,
            });
        }
        snapshot::save(dir, &index, entries).unwrap();
    }

    fn pipeline(dir: &std::path::Path) -> RetrievalPipeline {
        RetrievalPipeline::new(
            Arc::new(IndexStore::new(dir)),
            Arc::new(MockEmbedder::new(DIM)),
            20,
        )
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn dimension(&self) -> usize {
            DIM
        }

        async fn embed(&self, _text: &str) -> Result<Embedding, EmbedderError> {
            Err(EmbedderError::Http("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_music_query_ranks_club_b_first() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("index");
        write_club_snapshot(&dir);

        let retrieved = pipeline(&dir)
            .retrieve("music activities for teenagers", 1)
            .await
            .unwrap();

        assert_eq!(retrieved.entries.len(), 1);
        assert_eq!(retrieved.entries[0].id, "club-b");
        assert_eq!(retrieved.entries[0].metadata["category"], "music");
    }

    #[tokio::test]
    async fn test_k_larger_than_index_returns_all_ranked() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("index");
        write_club_snapshot(&dir);

        let retrieved = pipeline(&dir)
            .retrieve("music activities for teenagers", 50)
            .await
            .unwrap();

        assert_eq!(retrieved.entries.len(), 2);
        assert_eq!(retrieved.entries[0].id, "club-b");
        assert_eq!(retrieved.entries[1].id, "club-a");
        assert!(retrieved.entries[0].score >= retrieved.entries[1].score);
    }

    #[tokio::test]
    async fn test_context_joins_contents_in_rank_order() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("index");
        write_club_snapshot(&dir);

        let retrieved = pipeline(&dir).retrieve("music for teenagers", 2).await.unwrap();
        let expected = format!(
            "{}\n\n{}",
            retrieved.entries[0].content, retrieved.entries[1].content
        );
        assert_eq!(retrieved.context, expected);
    }

    #[tokio::test]
    async fn test_k_zero_rejected_without_remote_calls() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("index");
        write_club_snapshot(&dir);

        let pipeline = pipeline(&dir);
        let embedding = pipeline.embed_query("music").await.unwrap();
        let result = pipeline.search(&embedding, 0).await;
        assert!(matches!(result, Err(RetrievalError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("index");
        write_club_snapshot(&dir);

        let result = pipeline(&dir).retrieve("   ", 5).await;
        assert!(matches!(result, Err(RetrievalError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_missing_index_is_a_distinct_failure() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nowhere");

        let result = pipeline(&dir).retrieve("music", 5).await;
        assert!(matches!(
            result,
            Err(RetrievalError::Index(SnapshotError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_embedder_failure_is_a_distinct_failure() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("index");
        write_club_snapshot(&dir);

        let pipeline = RetrievalPipeline::new(
            Arc::new(IndexStore::new(&dir)),
            Arc::new(FailingEmbedder),
            20,
        );
        let result = pipeline.retrieve("music", 5).await;
        assert!(matches!(result, Err(RetrievalError::Embedding(_))));
    }
}
