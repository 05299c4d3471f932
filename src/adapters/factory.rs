//! Construct stores and providers from configuration.

use std::sync::Arc;

use super::embeddings::{
    GeminiEmbeddingConfig, GeminiEmbeddingProvider, HashingEmbeddingProvider, OllamaEmbeddingConfig, OllamaEmbeddingProvider,
    OpenAiEmbeddingConfig, OpenAiEmbeddingProvider,
};
use super::generation::{
    ChatCompletionConfig, ChatCompletionProvider, GeminiGenerationConfig, GeminiGenerationProvider, OllamaGenerationConfig,
    OllamaGenerationProvider,
};
use super::sqlite::SqliteVectorStore;
use crate::domain::errors::RagResult;
use crate::domain::models::{
    EmbeddingConfig, EmbeddingProviderKind, GenerationConfig, GenerationProviderKind,
    StoreBackend, StoreConfig,
};
use crate::domain::ports::{
    EmbeddingProvider, GenerationProvider, NullGenerationProvider, VectorStore,
};
use crate::infrastructure::vector::LocalVectorStore;

/// Open the configured vector store backend.
pub async fn open_store(config: &StoreConfig) -> RagResult<Arc<dyn VectorStore>> {
    let store: Arc<dyn VectorStore> = match config.backend {
        StoreBackend::Local => Arc::new(LocalVectorStore::open(config.clone()).await?),
        StoreBackend::Sqlite => Arc::new(SqliteVectorStore::open(config).await?),
    };
    Ok(store)
}

/// Build the configured embedding provider.
pub fn embedding_provider(config: &EmbeddingConfig) -> RagResult<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderKind::Hashing => Arc::new(HashingEmbeddingProvider::new(config.dimension)),
        EmbeddingProviderKind::OpenAi | EmbeddingProviderKind::Mistral => {
            let defaults = if config.provider == EmbeddingProviderKind::Mistral {
                OpenAiEmbeddingConfig::mistral()
            } else {
                OpenAiEmbeddingConfig::default()
            };
            Arc::new(OpenAiEmbeddingProvider::new(OpenAiEmbeddingConfig {
                api_key: config.api_key.clone(),
                base_url: config.base_url.clone().unwrap_or_else(|| defaults.base_url.clone()),
                model: config.model.clone().unwrap_or_else(|| defaults.model.clone()),
                dimension: config.dimension,
                timeout_secs: config.timeout_secs,
                max_batch_size: config.max_batch_size,
                ..defaults
            })?)
        }
        EmbeddingProviderKind::Ollama => {
            let defaults = OllamaEmbeddingConfig::default();
            Arc::new(OllamaEmbeddingProvider::new(OllamaEmbeddingConfig {
                base_url: config.base_url.clone().unwrap_or(defaults.base_url),
                model: config.model.clone().unwrap_or(defaults.model),
                dimension: config.dimension,
                timeout_secs: config.timeout_secs,
            })?)
        }
        EmbeddingProviderKind::Gemini => {
            let defaults = GeminiEmbeddingConfig::default();
            Arc::new(GeminiEmbeddingProvider::new(GeminiEmbeddingConfig {
                api_key: config.api_key.clone(),
                base_url: config.base_url.clone().unwrap_or_else(|| defaults.base_url.clone()),
                model: config.model.clone().unwrap_or_else(|| defaults.model.clone()),
                dimension: config.dimension,
                timeout_secs: config.timeout_secs,
                max_batch_size: config.max_batch_size,
                ..defaults
            })?)
        }
    };
    Ok(provider)
}

/// Build the configured generation provider.
pub fn generation_provider(config: &GenerationConfig) -> RagResult<Arc<dyn GenerationProvider>> {
    let provider: Arc<dyn GenerationProvider> = match config.provider {
        GenerationProviderKind::None => Arc::new(NullGenerationProvider),
        GenerationProviderKind::OpenAi | GenerationProviderKind::Mistral => {
            let defaults = if config.provider == GenerationProviderKind::Mistral {
                ChatCompletionConfig::mistral()
            } else {
                ChatCompletionConfig::default()
            };
            Arc::new(ChatCompletionProvider::new(ChatCompletionConfig {
                api_key: config.api_key.clone(),
                base_url: config.base_url.clone().unwrap_or_else(|| defaults.base_url.clone()),
                model: config.model.clone().unwrap_or_else(|| defaults.model.clone()),
                temperature: config.temperature,
                max_tokens: config.max_tokens,
                timeout_secs: config.timeout_secs,
                ..defaults
            })?)
        }
        GenerationProviderKind::Ollama => {
            let defaults = OllamaGenerationConfig::default();
            Arc::new(OllamaGenerationProvider::new(OllamaGenerationConfig {
                base_url: config.base_url.clone().unwrap_or(defaults.base_url),
                model: config.model.clone().unwrap_or(defaults.model),
                temperature: config.temperature,
                max_tokens: config.max_tokens,
                timeout_secs: config.timeout_secs,
            })?)
        }
        GenerationProviderKind::Gemini => {
            let defaults = GeminiGenerationConfig::default();
            Arc::new(GeminiGenerationProvider::new(GeminiGenerationConfig {
                api_key: config.api_key.clone(),
                base_url: config.base_url.clone().unwrap_or_else(|| defaults.base_url.clone()),
                model: config.model.clone().unwrap_or_else(|| defaults.model.clone()),
                temperature: config.temperature,
                max_tokens: config.max_tokens,
                timeout_secs: config.timeout_secs,
                ..defaults
            })?)
        }
    };
    Ok(provider)
}
