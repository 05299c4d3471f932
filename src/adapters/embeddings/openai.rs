//! OpenAI-compatible embedding provider adapter.
//!
//! Talks to any `/embeddings` endpoint that speaks the OpenAI wire format.
//! Used for OpenAI itself and for Mistral, which exposes the same API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adapters::http::{api_key, build_client, status_error, transport_error};
use crate::domain::errors::{RagError, RagResult};
use crate::domain::ports::EmbeddingProvider;

/// Configuration for the OpenAI-compatible embedding provider.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingConfig {
    /// Name reported by the provider ("openai", "mistral").
    pub provider_name: &'static str,
    /// API key. Falls back to `api_key_env`.
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: &'static str,
    /// Base URL for the API.
    pub base_url: String,
    pub model: String,
    /// Expected embedding dimension.
    pub dimension: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum texts per single API request.
    pub max_batch_size: usize,
}

impl Default for OpenAiEmbeddingConfig {
    fn default() -> Self {
        Self {
            provider_name: "openai",
            api_key: None,
            api_key_env: "OPENAI_API_KEY",
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            timeout_secs: 30,
            max_batch_size: 2048,
        }
    }
}

impl OpenAiEmbeddingConfig {
    /// Mistral's embeddings endpoint (`mistral-embed`, 1024 dimensions).
    pub fn mistral() -> Self {
        Self {
            provider_name: "mistral",
            api_key_env: "MISTRAL_API_KEY",
            base_url: "https://api.mistral.ai/v1".to_string(),
            model: "mistral-embed".to_string(),
            dimension: 1024,
            max_batch_size: 512,
            ..Self::default()
        }
    }

    fn get_api_key(&self) -> RagResult<String> {
        api_key(self.api_key.as_ref(), self.api_key_env).ok_or_else(|| {
            RagError::EmbeddingUnavailable(format!(
                "{} API key not set. Set {} or configure embedding.api_key.",
                self.provider_name, self.api_key_env
            ))
        })
    }
}

/// OpenAI-compatible embedding provider.
pub struct OpenAiEmbeddingProvider {
    config: OpenAiEmbeddingConfig,
    client: reqwest::Client,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: OpenAiEmbeddingConfig) -> RagResult<Self> {
        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }

    async fn call_embeddings_api(&self, texts: Vec<String>) -> RagResult<Vec<Vec<f32>>> {
        let api_key = self.config.get_api_key()?;
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let expected = texts.len();

        let request_body = EmbeddingsRequest {
            model: &self.config.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| transport_error(&e, "embedding", RagError::EmbeddingUnavailable))?;

        if !response.status().is_success() {
            return Err(status_error(response, "embedding", RagError::EmbeddingUnavailable).await);
        }

        let result: EmbeddingsResponse = response.json().await.map_err(|e| {
            RagError::EmbeddingUnavailable(format!("failed to parse embedding response: {e}"))
        })?;

        // Sort by index to maintain input order
        let mut data = result.data;
        data.sort_by_key(|d| d.index);

        if data.len() != expected {
            return Err(RagError::EmbeddingUnavailable(format!(
                "provider returned {} embeddings for {expected} inputs",
                data.len()
            )));
        }
        if let Some(bad) = data.iter().find(|d| d.embedding.len() != self.config.dimension) {
            return Err(RagError::EmbeddingUnavailable(format!(
                "model {} returned {} dimensions, configured {}",
                self.config.model,
                bad.embedding.len(),
                self.config.dimension
            )));
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn name(&self) -> &'static str {
        self.config.provider_name
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        let results = self.call_embeddings_api(vec![text.to_string()]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| RagError::EmbeddingUnavailable("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.max_batch_size.max(1)) {
            all.extend(self.call_embeddings_api(batch.to_vec()).await?);
        }
        Ok(all)
    }

    fn max_batch_size(&self) -> usize {
        self.config.max_batch_size
    }
}

// -- OpenAI API request/response types --

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
