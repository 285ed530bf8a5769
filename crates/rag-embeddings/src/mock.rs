//! Deterministic embedder double for tests.
//!
//! Hashes each whitespace-separated token into a fixed bucket, so texts
//! sharing words get similar vectors. Crude, but it gives similarity
//! search something real to rank without any network or model weights.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::EmbedderError;
use crate::model::{Embedder, Embedding};

/// Bag-of-words hashing embedder. Same text always yields the same
/// vector; texts with overlapping words land close in cosine space.
pub struct MockEmbedder {
    dimension: usize,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of embed calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimension
    }

    /// Synchronous embedding, usable from non-async test setup.
    pub fn embed_sync(&self, text: &str) -> Embedding {
        let mut values = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            values[self.bucket(&token.to_lowercase())] += 1.0;
        }
        Embedding::new(values)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbedderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.embed_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deterministic() {
        let embedder = MockEmbedder::new(64);
        let a = embedder.embed("music for teenagers").await.unwrap();
        let b = embedder.embed("music for teenagers").await.unwrap();
        assert_eq!(a.values, b.values);
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_word_overlap_ranks_higher() {
        let embedder = MockEmbedder::new(64);
        let query = embedder.embed("music activities for teenagers").await.unwrap();
        let music = embedder
            .embed("focuses on music activities")
            .await
            .unwrap();
        let sports = embedder
            .embed("focuses on sports activities")
            .await
            .unwrap();
        assert!(query.cosine_similarity(&music) > query.cosine_similarity(&sports));
    }

    #[tokio::test]
    async fn test_case_insensitive_tokens() {
        let embedder = MockEmbedder::new(64);
        let a = embedder.embed("Music").await.unwrap();
        let b = embedder.embed("music").await.unwrap();
        assert!((a.cosine_similarity(&b) - 1.0).abs() < 0.001);
    }
}
