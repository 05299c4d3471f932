//! Generation provider port.
//!
//! A generator turns a fully rendered prompt into answer text. Prompt
//! construction lives in the retrieval pipeline.

use async_trait::async_trait;

use crate::domain::errors::{RagError, RagResult};

/// Trait for text generation providers.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Provider name (e.g., "openai", "ollama", "none").
    fn name(&self) -> &'static str;

    /// Generate a completion for `prompt`.
    ///
    /// # Errors
    /// `GenerationUnavailable` for transport or upstream failures and
    /// `UpstreamTimeout` when the provider's own timeout fires.
    async fn generate(&self, prompt: &str) -> RagResult<String>;
}

/// Generator used when none is configured. Every call fails, so answers
/// degrade to the retrieved context.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGenerationProvider;

#[async_trait]
impl GenerationProvider for NullGenerationProvider {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn generate(&self, _prompt: &str) -> RagResult<String> {
        Err(RagError::GenerationUnavailable(
            "no generation provider configured".to_string(),
        ))
    }
}
