//! End-to-end test infrastructure for club-rag.
//!
//! Provides a shared TestHarness and helper doubles for E2E tests
//! covering the full ingest-to-answer pipeline.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use rag_embeddings::{Embedder, EmbedderError, Embedding, MockEmbedder};
use rag_generation::{GenerationError, Generator, TokenStream};
use rag_types::ClubRecord;

/// Embedding dimension used throughout the E2E tests.
pub const DIMENSION: usize = 64;

/// Shared test harness for E2E tests.
///
/// Owns the temp directory holding the index snapshot and the
/// deterministic embedder used on both the ingest and query side.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Directory the index snapshot is written to
    pub index_path: PathBuf,
    /// Deterministic embedder shared across ingest and query
    pub embedder: Arc<MockEmbedder>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let index_path = temp_dir.path().join("index");

        Self {
            _temp_dir: temp_dir,
            index_path,
            embedder: Arc::new(MockEmbedder::new(DIMENSION)),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A small club directory with clearly separable topics, so that
/// retrieval ranking is predictable under the deterministic embedder.
pub fn sample_clubs() -> Vec<ClubRecord> {
    let raw = serde_json::json!([
        {
            "id": "club-chess",
            "name": "Umeå Schacksällskap",
            "municipality": "Umeå",
            "agerange": "7-12",
            "category": "chess",
            "area": "Centrum",
            "activity": "chess tournaments",
            "url": "https://example.se/chess"
        },
        {
            "id": "club-music",
            "name": "Lunds Musikförening",
            "municipality": "Lund",
            "agerange": "13-19",
            "category": "music",
            "area": "Väster",
            "activity": "band practice",
            "url": "https://example.se/music"
        },
        {
            "id": "club-football",
            "name": "Sundsvalls IF",
            "municipality": "Sundsvall",
            "agerange": "6-15",
            "category": "football",
            "area": "Centrum",
            "activity": "football training",
            "url": "https://example.se/football"
        }
    ]);
    serde_json::from_value(raw).expect("Sample clubs should deserialize")
}

/// Embedder that fails with a retryable status a fixed number of times
/// for contents containing a marker substring, then behaves like the
/// wrapped deterministic embedder.
pub struct FlakyEmbedder {
    inner: Arc<MockEmbedder>,
    marker: String,
    failures_remaining: AtomicU32,
}

impl FlakyEmbedder {
    pub fn new(inner: Arc<MockEmbedder>, marker: impl Into<String>, failures: u32) -> Self {
        Self {
            inner,
            marker: marker.into(),
            failures_remaining: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbedderError> {
        if text.contains(&self.marker) {
            let remaining = self.failures_remaining.load(Ordering::SeqCst);
            if remaining > 0
                && self
                    .failures_remaining
                    .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            {
                return Err(EmbedderError::Status {
                    status: 429,
                    body: "rate limited".to_string(),
                });
            }
        }
        self.inner.embed(text).await
    }
}

/// Generator that replays a fixed token script and records the prompt
/// it was asked to answer.
pub struct ScriptedGenerator {
    script: Mutex<Option<Vec<Result<String, GenerationError>>>>,
    pub last_prompt: Mutex<Option<String>>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(Some(script)),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn answering(tokens: &[&str]) -> Self {
        Self::new(tokens.iter().map(|t| Ok(t.to_string())).collect())
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn stream(&self, prompt: &str) -> Result<TokenStream, GenerationError> {
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        let script = self
            .script
            .lock()
            .unwrap()
            .take()
            .expect("Generator script already consumed");
        Ok(Box::pin(futures::stream::iter(script)))
    }
}
