//! Generation provider adapters.

pub mod gemini;
pub mod ollama;
pub mod openai;

pub use gemini::{GeminiGenerationConfig, GeminiGenerationProvider};
pub use ollama::{OllamaGenerationConfig, OllamaGenerationProvider};
pub use openai::{ChatCompletionConfig, ChatCompletionProvider, SYSTEM_PROMPT};
