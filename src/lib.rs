//! Stockrag - semantic retrieval engine for market notes
//!
//! Stockrag chunks market commentary and trading journals, embeds the chunks,
//! stores them in a persistent vector store and answers questions from the
//! best-matching context.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and the provider/store ports
//! - **Infrastructure Layer** (`infrastructure`): Chunker, vector indexes,
//!   the file-persisted store, configuration and logging
//! - **Adapters** (`adapters`): `SQLite` store, HTTP embedding/generation providers
//! - **Service Layer** (`services`): The retrieval pipeline
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use stockrag::adapters::factory;
//! use stockrag::{ConfigLoader, RagPipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let store = factory::open_store(&config.store).await?;
//!     // build providers and a RagPipeline, then index and ask
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{RagError, RagResult};
pub use domain::models::{
    Answer, Chunk, ChunkingConfig, Config, DistanceMetric, Entry, IndexKind, Metadata,
    RankedContext, Relation, SearchFilter, SearchHit, SourceRef, StoreStats,
};
pub use domain::ports::{EmbeddingProvider, GenerationProvider, VectorStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::vector::{Chunker, LocalVectorStore};
pub use services::RagPipeline;
