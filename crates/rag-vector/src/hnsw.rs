//! HNSW index wrapper around usearch.
//!
//! Parameters tuned for quality over speed:
//! - M = 16 (connections per layer)
//! - ef_construction = 200 (build-time quality)
//! - ef_search = 100 (search-time quality)

use std::path::Path;
use std::sync::RwLock;

use tracing::debug;
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use rag_embeddings::Embedding;

use crate::error::VectorError;

/// HNSW index configuration
#[derive(Debug, Clone)]
pub struct HnswConfig {
    /// Embedding dimension (must match the embedder)
    pub dimension: usize,
    /// Number of connections per layer (M parameter)
    pub connectivity: usize,
    /// Build-time search depth (ef_construction)
    pub expansion_add: usize,
    /// Query-time search depth (ef_search)
    pub expansion_search: usize,
    /// Maximum capacity (for pre-allocation)
    pub capacity: usize,
}

impl HnswConfig {
    pub fn new(dimension: usize, capacity: usize) -> Self {
        Self {
            dimension,
            connectivity: 16,
            expansion_add: 200,
            expansion_search: 100,
            capacity,
        }
    }

    fn options(&self) -> IndexOptions {
        IndexOptions {
            dimensions: self.dimension,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.expansion_search,
            multi: false, // Single vector per key
        }
    }
}

/// One ranked search result: an internal key plus a cosine similarity
/// score (higher = closer).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub key: u64,
    pub score: f32,
}

/// HNSW index wrapper. Concurrent readers share it freely; inserts go
/// through the write lock.
pub struct HnswIndex {
    index: RwLock<Index>,
    config: HnswConfig,
}

impl HnswIndex {
    /// Create a new empty index.
    pub fn new(config: HnswConfig) -> Result<Self, VectorError> {
        let index = Index::new(&config.options()).map_err(|e| VectorError::Index(e.to_string()))?;
        index
            .reserve(config.capacity.max(1))
            .map_err(|e| VectorError::Index(e.to_string()))?;
        Ok(Self {
            index: RwLock::new(index),
            config,
        })
    }

    /// Load an index previously written with [`HnswIndex::save_file`].
    pub fn load_file(config: HnswConfig, path: &Path) -> Result<Self, VectorError> {
        let index = Index::new(&config.options()).map_err(|e| VectorError::Index(e.to_string()))?;
        let path_str = path
            .to_str()
            .ok_or_else(|| VectorError::Index("Invalid path encoding".to_string()))?;
        index
            .load(path_str)
            .map_err(|e| VectorError::Index(format!("Failed to load: {}", e)))?;
        Ok(Self {
            index: RwLock::new(index),
            config,
        })
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    pub fn len(&self) -> usize {
        self.index.read().unwrap().size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a vector under the given key.
    #[allow(clippy::readonly_write_lock)] // usearch::Index uses interior mutability
    pub fn add(&self, key: u64, embedding: &Embedding) -> Result<(), VectorError> {
        if embedding.dimension() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimension,
                actual: embedding.dimension(),
            });
        }

        let index = self.index.write().unwrap();
        index
            .add(key, &embedding.values)
            .map_err(|e| VectorError::Index(e.to_string()))?;

        debug!(key, "Added vector");
        Ok(())
    }

    /// Search for the k nearest neighbours, best first.
    pub fn search(&self, query: &Embedding, k: usize) -> Result<Vec<SearchHit>, VectorError> {
        if query.dimension() != self.config.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.config.dimension,
                actual: query.dimension(),
            });
        }

        let index = self.index.read().unwrap();
        let results = index
            .search(&query.values, k)
            .map_err(|e| VectorError::Index(e.to_string()))?;

        let hits: Vec<SearchHit> = results
            .keys
            .iter()
            .zip(results.distances.iter())
            .map(|(&key, &dist)| SearchHit {
                key,
                score: 1.0 - dist, // Convert distance to similarity
            })
            .collect();

        debug!(k, found = hits.len(), "Search complete");
        Ok(hits)
    }

    /// Write the raw index to a file.
    pub fn save_file(&self, path: &Path) -> Result<(), VectorError> {
        let index = self.index.read().unwrap();
        let path_str = path
            .to_str()
            .ok_or_else(|| VectorError::Index("Invalid path encoding".to_string()))?;
        index
            .save(path_str)
            .map_err(|e| VectorError::Index(format!("Failed to save: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn random_embedding(dim: usize) -> Embedding {
        use rand::Rng;
        let mut rng = rand::rng();
        let values: Vec<f32> = (0..dim).map(|_| rng.random()).collect();
        Embedding::new(values)
    }

    #[test]
    fn test_create_index() {
        let index = HnswIndex::new(HnswConfig::new(64, 100)).unwrap();
        assert_eq!(index.dimension(), 64);
        assert!(index.is_empty());
    }

    #[test]
    fn test_add_and_search() {
        let index = HnswIndex::new(HnswConfig::new(64, 100)).unwrap();

        for i in 0..10 {
            index.add(i, &random_embedding(64)).unwrap();
        }
        assert_eq!(index.len(), 10);

        let results = index.search(&random_embedding(64), 5).unwrap();
        assert_eq!(results.len(), 5);

        // Results should be sorted by score (descending)
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_search_more_than_size_returns_all() {
        let index = HnswIndex::new(HnswConfig::new(16, 10)).unwrap();
        for i in 0..3 {
            index.add(i, &random_embedding(16)).unwrap();
        }
        let results = index.search(&random_embedding(16), 50).unwrap();
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_dimension_mismatch() {
        let index = HnswIndex::new(HnswConfig::new(64, 10)).unwrap();
        let wrong_dim = random_embedding(32);
        assert!(matches!(
            index.add(0, &wrong_dim),
            Err(VectorError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            index.search(&wrong_dim, 3),
            Err(VectorError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("index.usearch");
        let config = HnswConfig::new(64, 100);

        let index = HnswIndex::new(config.clone()).unwrap();
        for i in 0..5 {
            index.add(i, &random_embedding(64)).unwrap();
        }
        index.save_file(&file).unwrap();

        let reloaded = HnswIndex::load_file(config, &file).unwrap();
        assert_eq!(reloaded.len(), 5);
    }
}
