//! Google Gemini embedding provider adapter.
//!
//! Single texts go through `:embedContent`, batches through
//! `:batchEmbedContents`. The key is sent in the `x-goog-api-key` header.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::adapters::http::{api_key, build_client, status_error, transport_error};
use crate::domain::errors::{RagError, RagResult};
use crate::domain::ports::EmbeddingProvider;

/// Header carrying the Gemini API key.
pub const GEMINI_KEY_HEADER: &str = "x-goog-api-key";

/// Configuration for the Gemini embedding provider.
#[derive(Debug, Clone)]
pub struct GeminiEmbeddingConfig {
    /// API key. Falls back to `GEMINI_API_KEY`.
    pub api_key: Option<String>,
    pub api_key_env: &'static str,
    /// Base URL including the API version.
    pub base_url: String,
    /// Model resource name, e.g. `models/embedding-001`.
    pub model: String,
    pub dimension: usize,
    pub timeout_secs: u64,
    /// Maximum texts per `:batchEmbedContents` request.
    pub max_batch_size: usize,
}

impl Default for GeminiEmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: "GEMINI_API_KEY",
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "models/embedding-001".to_string(),
            dimension: 768,
            timeout_secs: 30,
            max_batch_size: 100,
        }
    }
}

/// Resource name with the `models/` prefix the API expects.
pub(crate) fn model_resource(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

/// Gemini embedding provider.
pub struct GeminiEmbeddingProvider {
    config: GeminiEmbeddingConfig,
    client: reqwest::Client,
}

impl GeminiEmbeddingProvider {
    pub fn new(config: GeminiEmbeddingConfig) -> RagResult<Self> {
        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }

    fn get_api_key(&self) -> RagResult<String> {
        api_key(self.config.api_key.as_ref(), self.config.api_key_env).ok_or_else(|| {
            RagError::EmbeddingUnavailable(format!(
                "gemini API key not set. Set {} or configure embedding.api_key.",
                self.config.api_key_env
            ))
        })
    }

    fn url(&self, method: &str) -> String {
        format!(
            "{}/{}:{method}",
            self.config.base_url.trim_end_matches('/'),
            model_resource(&self.config.model)
        )
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned + Send>(
        &self,
        method: &str,
        body: &B,
    ) -> RagResult<R> {
        let api_key = self.get_api_key()?;
        let response = self
            .client
            .post(self.url(method))
            .header(GEMINI_KEY_HEADER, api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(&e, "embedding", RagError::EmbeddingUnavailable))?;

        if !response.status().is_success() {
            return Err(status_error(response, "embedding", RagError::EmbeddingUnavailable).await);
        }

        response.json().await.map_err(|e| {
            RagError::EmbeddingUnavailable(format!("failed to parse embedding response: {e}"))
        })
    }

    fn check_dimension(&self, values: &[f32]) -> RagResult<()> {
        if values.len() == self.config.dimension {
            return Ok(());
        }
        Err(RagError::EmbeddingUnavailable(format!(
            "model {} returned {} dimensions, configured {}",
            self.config.model,
            values.len(),
            self.config.dimension
        )))
    }

    async fn embed_chunk(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        let model = model_resource(&self.config.model);
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: &model,
                    content: Content::text(text),
                })
                .collect(),
        };
        let response: BatchEmbedResponse = self.post("batchEmbedContents", &request).await?;

        if response.embeddings.len() != texts.len() {
            return Err(RagError::EmbeddingUnavailable(format!(
                "provider returned {} embeddings for {} inputs",
                response.embeddings.len(),
                texts.len()
            )));
        }
        response
            .embeddings
            .into_iter()
            .map(|e| {
                self.check_dimension(&e.values)?;
                Ok(e.values)
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        let model = model_resource(&self.config.model);
        let request = EmbedRequest {
            model: &model,
            content: Content::text(text),
        };
        let response: EmbedResponse = self.post("embedContent", &request).await?;
        self.check_dimension(&response.embedding.values)?;
        Ok(response.embedding.values)
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.max_batch_size.max(1)) {
            all.extend(self.embed_chunk(batch).await?);
        }
        Ok(all)
    }

    fn max_batch_size(&self) -> usize {
        self.config.max_batch_size
    }
}

// -- Gemini API request/response types --

#[derive(Debug, Serialize)]
pub(crate) struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    pub parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    pub(crate) fn text(text: &'a str) -> Self {
        Self {
            role: None,
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Part<'a> {
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}
