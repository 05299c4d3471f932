//! Embedding provider adapters.

pub mod gemini;
pub mod hashing;
pub mod ollama;
pub mod openai;

pub use gemini::{GeminiEmbeddingConfig, GeminiEmbeddingProvider};
pub use hashing::HashingEmbeddingProvider;
pub use ollama::{OllamaEmbeddingConfig, OllamaEmbeddingProvider};
pub use openai::{OpenAiEmbeddingConfig, OpenAiEmbeddingProvider};
