//! Ollama embedding provider adapter.
//!
//! `POST {base_url}/api/embeddings` with `{"model", "prompt"}` returns
//! `{"embedding": [...]}`. The endpoint takes one text per call, so batches
//! are sent sequentially.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adapters::http::{build_client, status_error, transport_error};
use crate::domain::errors::{RagError, RagResult};
use crate::domain::ports::EmbeddingProvider;

#[derive(Debug, Clone)]
pub struct OllamaEmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl Default for OllamaEmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimension: 768,
            timeout_secs: 30,
        }
    }
}

pub struct OllamaEmbeddingProvider {
    config: OllamaEmbeddingConfig,
    client: reqwest::Client,
}

impl OllamaEmbeddingProvider {
    pub fn new(config: OllamaEmbeddingConfig) -> RagResult<Self> {
        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&OllamaEmbeddingRequest {
                model: &self.config.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| transport_error(&e, "embedding", RagError::EmbeddingUnavailable))?;

        if !response.status().is_success() {
            return Err(status_error(response, "embedding", RagError::EmbeddingUnavailable).await);
        }

        let body: OllamaEmbeddingResponse = response.json().await.map_err(|e| {
            RagError::EmbeddingUnavailable(format!("failed to parse embedding response: {e}"))
        })?;

        if body.embedding.len() != self.config.dimension {
            return Err(RagError::EmbeddingUnavailable(format!(
                "model {} returned {} dimensions, configured {}",
                self.config.model,
                body.embedding.len(),
                self.config.dimension
            )));
        }
        Ok(body.embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for text in texts {
            all.push(self.embed(text).await?);
        }
        Ok(all)
    }

    fn max_batch_size(&self) -> usize {
        1
    }
}

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}
