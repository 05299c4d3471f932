//! OpenAI-compatible chat completion adapter (OpenAI, Mistral).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adapters::http::{api_key, build_client, status_error, transport_error};
use crate::domain::errors::{RagError, RagResult};
use crate::domain::ports::GenerationProvider;

/// System message sent with every completion.
pub const SYSTEM_PROMPT: &str = "You are a stock market analysis expert. Provide accurate and useful \
analysis and insight based on the provided information.";

#[derive(Debug, Clone)]
pub struct ChatCompletionConfig {
    /// Name reported by the provider ("openai", "mistral").
    pub provider_name: &'static str,
    pub api_key: Option<String>,
    pub api_key_env: &'static str,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ChatCompletionConfig {
    fn default() -> Self {
        Self {
            provider_name: "openai",
            api_key: None,
            api_key_env: "OPENAI_API_KEY",
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            timeout_secs: 30,
        }
    }
}

impl ChatCompletionConfig {
    pub fn mistral() -> Self {
        Self {
            provider_name: "mistral",
            api_key_env: "MISTRAL_API_KEY",
            base_url: "https://api.mistral.ai/v1".to_string(),
            model: "mistral-medium".to_string(),
            ..Self::default()
        }
    }
}

/// Generator backed by a `/chat/completions` endpoint.
pub struct ChatCompletionProvider {
    config: ChatCompletionConfig,
    client: reqwest::Client,
}

impl ChatCompletionProvider {
    pub fn new(config: ChatCompletionConfig) -> RagResult<Self> {
        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl GenerationProvider for ChatCompletionProvider {
    fn name(&self) -> &'static str {
        self.config.provider_name
    }

    async fn generate(&self, prompt: &str) -> RagResult<String> {
        let api_key = api_key(self.config.api_key.as_ref(), self.config.api_key_env)
            .ok_or_else(|| {
                RagError::GenerationUnavailable(format!(
                    "{} API key not set. Set {} or configure generation.api_key.",
                    self.config.provider_name, self.config.api_key_env
                ))
            })?;
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&e, "generation", RagError::GenerationUnavailable))?;

        if !response.status().is_success() {
            return Err(status_error(response, "generation", RagError::GenerationUnavailable).await);
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            RagError::GenerationUnavailable(format!("failed to parse completion response: {e}"))
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RagError::GenerationUnavailable("completion had no content".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
