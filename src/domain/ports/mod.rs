//! Ports (trait seams) between the domain and its adapters.

pub mod embedding;
pub mod generation;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use generation::{GenerationProvider, NullGenerationProvider};
pub use vector_store::VectorStore;
