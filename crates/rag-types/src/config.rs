//! Configuration loading for club-rag.
//!
//! Layered: built-in defaults -> config file -> RAG_* environment
//! variables. The default config file lives at
//! `~/.config/club-rag/config.toml`; binaries may pass an explicit path
//! that takes precedence over the default file.
//!
//! The embedding/generation API key is deliberately not part of the
//! config file: it is read from `OPENAI_API_KEY` via [`RagConfig::api_key`]
//! and held as a [`secrecy::SecretString`] so it never appears in logs.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::RagError;

/// Paths to the ingestion source and the index artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    /// Source records file (JSON array of clubs)
    #[serde(default = "default_records_path")]
    pub records_path: PathBuf,
    /// Directory holding the persisted index snapshot
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
}

fn default_records_path() -> PathBuf {
    PathBuf::from("data/clubs.json")
}

fn default_index_path() -> PathBuf {
    PathBuf::from("data/index")
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            records_path: default_records_path(),
            index_path: default_index_path(),
        }
    }
}

/// Remote embedder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderSettings {
    /// API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Embedding dimension (must match the model)
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Per-request timeout in seconds
    #[serde(default = "default_embed_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_dimension() -> usize {
    1536
}

fn default_embed_timeout() -> u64 {
    30
}

impl Default for EmbedderSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_embedding_model(),
            dimension: default_dimension(),
            timeout_secs: default_embed_timeout(),
        }
    }
}

/// Admission control and retry settings for the ingestion batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Maximum concurrently in-flight units
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Minimum spacing between successive unit starts, in milliseconds
    #[serde(default = "default_min_spacing_ms")]
    pub min_spacing_ms: u64,
    /// Maximum attempts per unit (first try included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base retry delay in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Exponential backoff factor
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_max_concurrent() -> usize {
    5
}

fn default_min_spacing_ms() -> u64 {
    200
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            min_spacing_ms: default_min_spacing_ms(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

/// Query-time retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// How many entries a query retrieves (clamped to index size)
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    20
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

/// Generation model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Chat model name
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,
    /// Per-request timeout in seconds (covers retrieval and the wait for
    /// the stream to open; generous because of LLM latencies)
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

fn default_generation_model() -> String {
    "gpt-4".to_string()
}

fn default_generation_timeout() -> u64 {
    40
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            temperature: 0.0,
            timeout_secs: default_generation_timeout(),
        }
    }
}

/// Top-level configuration for both binaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default)]
    pub data: DataSettings,
    #[serde(default)]
    pub embedder: EmbedderSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    #[serde(default)]
    pub generation: GenerationSettings,
}

impl RagConfig {
    /// Load configuration: defaults -> default config file -> explicit
    /// config file -> `RAG_*` environment variables.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, RagError> {
        let config_dir = ProjectDirs::from("", "", "club-rag")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // RAG_EMBEDDER__MODEL, RAG_SCHEDULER__MAX_CONCURRENT, etc.
        builder = builder.add_source(
            Environment::with_prefix("RAG")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let loaded: RagConfig = config
            .try_deserialize()
            .map_err(|e| RagError::Config(e.to_string()))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.embedder.dimension == 0 {
            return Err(RagError::Config("embedder.dimension must be > 0".into()));
        }
        if self.scheduler.max_concurrent == 0 {
            return Err(RagError::Config(
                "scheduler.max_concurrent must be > 0".into(),
            ));
        }
        if self.scheduler.max_attempts == 0 {
            return Err(RagError::Config("scheduler.max_attempts must be > 0".into()));
        }
        if self.scheduler.backoff_factor < 1.0 {
            return Err(RagError::Config(
                "scheduler.backoff_factor must be >= 1.0".into(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(RagError::Config("retrieval.top_k must be > 0".into()));
        }
        Ok(())
    }

    /// Read the API key from `OPENAI_API_KEY`.
    pub fn api_key(&self) -> Result<SecretString, RagError> {
        std::env::var("OPENAI_API_KEY")
            .map(SecretString::from)
            .map_err(|_| RagError::Config("OPENAI_API_KEY is not set".into()))
    }

    /// Minimum spacing between unit starts as a [`Duration`].
    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.scheduler.min_spacing_ms)
    }

    /// Base retry delay as a [`Duration`].
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.scheduler.base_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RagConfig::default();
        assert_eq!(config.scheduler.max_concurrent, 5);
        assert_eq!(config.scheduler.min_spacing_ms, 200);
        assert_eq!(config.scheduler.max_attempts, 5);
        assert_eq!(config.retrieval.top_k, 20);
        assert_eq!(config.embedder.dimension, 1536);
        assert_eq!(config.generation.model, "gpt-4");
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = RagConfig::default();
        config.scheduler.max_concurrent = 0;
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_shrinking_backoff() {
        let mut config = RagConfig::default();
        config.scheduler.backoff_factor = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rag.toml");
        std::fs::write(
            &path,
            r#"
[scheduler]
max_concurrent = 2
min_spacing_ms = 50

[retrieval]
top_k = 7
"#,
        )
        .unwrap();

        let config = RagConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.scheduler.max_concurrent, 2);
        assert_eq!(config.min_spacing(), Duration::from_millis(50));
        assert_eq!(config.retrieval.top_k, 7);
        // Unset sections keep their defaults
        assert_eq!(config.embedder.model, "text-embedding-ada-002");
    }
}
