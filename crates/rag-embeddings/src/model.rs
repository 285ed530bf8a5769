//! Embedding type and the embedder trait.

use async_trait::async_trait;

use crate::error::EmbedderError;

/// Vector embedding - a normalized float array.
#[derive(Debug, Clone)]
pub struct Embedding {
    /// The embedding vector (normalized to unit length)
    pub values: Vec<f32>,
}

impl Embedding {
    /// Create a new embedding from a vector.
    /// Normalizes the vector to unit length.
    pub fn new(values: Vec<f32>) -> Self {
        let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        let normalized = if norm > 0.0 {
            values.iter().map(|x| x / norm).collect()
        } else {
            values
        };
        Self { values: normalized }
    }

    /// Create embedding without normalization (for pre-normalized vectors)
    pub fn from_normalized(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Get the embedding dimension
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Compute cosine similarity with another embedding.
    /// Returns value in [-1, 1] range (1 = identical).
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }
        // Since both are normalized, dot product = cosine similarity
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum()
    }
}

/// Trait for embedders.
///
/// One remote call per text; implementations must be thread-safe
/// (Send + Sync) so concurrent ingestion units can share one client.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedding dimension this embedder produces.
    fn dimension(&self) -> usize;

    /// Generate the embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Embedding, EmbedderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_normalization() {
        let emb = Embedding::new(vec![3.0, 4.0]);
        // 3-4-5 triangle: normalized should be [0.6, 0.8]
        assert!((emb.values[0] - 0.6).abs() < 0.001);
        assert!((emb.values[1] - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_zero_vector_left_alone() {
        let emb = Embedding::new(vec![0.0, 0.0]);
        assert_eq!(emb.values, vec![0.0, 0.0]);
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let emb1 = Embedding::new(vec![1.0, 0.0, 0.0]);
        let emb2 = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert!((emb1.cosine_similarity(&emb2) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let emb1 = Embedding::new(vec![1.0, 0.0]);
        let emb2 = Embedding::new(vec![0.0, 1.0]);
        assert!(emb1.cosine_similarity(&emb2).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_dimension_mismatch_is_zero() {
        let emb1 = Embedding::new(vec![1.0, 0.0]);
        let emb2 = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert_eq!(emb1.cosine_similarity(&emb2), 0.0);
    }
}
