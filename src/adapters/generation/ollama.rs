//! Ollama generation adapter: `POST {base_url}/api/generate`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adapters::http::{build_client, status_error, transport_error};
use crate::domain::errors::{RagError, RagResult};
use crate::domain::ports::GenerationProvider;

#[derive(Debug, Clone)]
pub struct OllamaGenerationConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for OllamaGenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            timeout_secs: 60,
        }
    }
}

pub struct OllamaGenerationProvider {
    config: OllamaGenerationConfig,
    client: reqwest::Client,
}

impl OllamaGenerationProvider {
    pub fn new(config: OllamaGenerationConfig) -> RagResult<Self> {
        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerationProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn generate(&self, prompt: &str) -> RagResult<String> {
        let url = format!("{}/api/generate", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.config.model,
                prompt,
                stream: false,
                options: GenerateOptions {
                    temperature: self.config.temperature,
                    num_predict: self.config.max_tokens,
                },
            })
            .send()
            .await
            .map_err(|e| transport_error(&e, "generation", RagError::GenerationUnavailable))?;

        if !response.status().is_success() {
            return Err(status_error(response, "generation", RagError::GenerationUnavailable).await);
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            RagError::GenerationUnavailable(format!("failed to parse generate response: {e}"))
        })?;
        Ok(body.response)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}
