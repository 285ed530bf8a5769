//! OpenAI-compatible remote embedder.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use rag_types::EmbedderSettings;

use crate::error::EmbedderError;
use crate::model::{Embedder, Embedding};

/// Configuration for the remote embedder.
#[derive(Debug, Clone)]
pub struct RemoteEmbedderConfig {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,
    /// Model to use (e.g., "text-embedding-ada-002")
    pub model: String,
    /// Expected embedding dimension
    pub dimension: usize,
    /// API key
    pub api_key: SecretString,
    /// Request timeout
    pub timeout: Duration,
}

impl RemoteEmbedderConfig {
    /// Build from the shared settings plus an API key.
    pub fn from_settings(settings: &EmbedderSettings, api_key: SecretString) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
            dimension: settings.dimension,
            api_key,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

/// Embedder calling an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: Client,
    config: RemoteEmbedderConfig,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    /// Create a new remote embedder.
    pub fn new(config: RemoteEmbedderConfig) -> Result<Self, EmbedderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbedderError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbedderError> {
        let url = format!("{}/embeddings", self.config.base_url);
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: text,
        };

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbedderError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbedderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedderError::InvalidResponse(e.to_string()))?;

        let values = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbedderError::InvalidResponse("empty data array".to_string()))?;

        if values.len() != self.config.dimension {
            return Err(EmbedderError::DimensionMismatch {
                expected: self.config.dimension,
                actual: values.len(),
            });
        }

        debug!(chars = text.len(), dim = values.len(), "Embedded text");
        Ok(Embedding::new(values))
    }
}
