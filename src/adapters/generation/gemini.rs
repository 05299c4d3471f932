//! Google Gemini `:generateContent` adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adapters::embeddings::gemini::{model_resource, Content, Part, GEMINI_KEY_HEADER};
use crate::adapters::http::{api_key, build_client, status_error, transport_error};
use crate::domain::errors::{RagError, RagResult};
use crate::domain::ports::GenerationProvider;

use super::openai::SYSTEM_PROMPT;

/// Configuration for the Gemini generation provider.
#[derive(Debug, Clone)]
pub struct GeminiGenerationConfig {
    pub api_key: Option<String>,
    pub api_key_env: &'static str,
    pub base_url: String,
    /// Model resource name, e.g. `models/gemini-pro`.
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for GeminiGenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: "GEMINI_API_KEY",
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "models/gemini-pro".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            timeout_secs: 30,
        }
    }
}

/// Generator backed by Gemini's `:generateContent`.
pub struct GeminiGenerationProvider {
    config: GeminiGenerationConfig,
    client: reqwest::Client,
}

impl GeminiGenerationProvider {
    pub fn new(config: GeminiGenerationConfig) -> RagResult<Self> {
        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl GenerationProvider for GeminiGenerationProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> RagResult<String> {
        let api_key = api_key(self.config.api_key.as_ref(), self.config.api_key_env)
            .ok_or_else(|| {
                RagError::GenerationUnavailable(format!(
                    "gemini API key not set. Set {} or configure generation.api_key.",
                    self.config.api_key_env
                ))
            })?;
        let url = format!(
            "{}/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model_resource(&self.config.model)
        );

        // gemini-pro has no system role, so the instruction leads the user turn.
        let text = format!("{SYSTEM_PROMPT}\n\n{prompt}");
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &text }],
            }],
            generation_config: GenerationSettings {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .header(GEMINI_KEY_HEADER, api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&e, "generation", RagError::GenerationUnavailable))?;

        if !response.status().is_success() {
            return Err(status_error(response, "generation", RagError::GenerationUnavailable).await);
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            RagError::GenerationUnavailable(format!("failed to parse generation response: {e}"))
        })?;

        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
            .ok_or_else(|| RagError::GenerationUnavailable("generation had no content".to_string()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationSettings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}
