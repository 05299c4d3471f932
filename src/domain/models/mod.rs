//! Domain models

pub mod chunking;
pub mod config;
pub mod entry;
pub mod filter;
pub mod retrieval;

pub use chunking::{Chunk, ChunkingConfig};
pub use config::{
    MAX_TIMEOUT_SECS,
    Config, EmbeddingConfig, EmbeddingProviderKind, GenerationConfig, GenerationProviderKind,
    HnswConfig, LoggingConfig, PersistenceRetryConfig, RetrievalConfig, StoreBackend, StoreConfig,
};
pub use entry::{DistanceMetric, Entry, IndexKind, Metadata, SearchHit, StoreStats};
pub use filter::{Relation, RelationFilter, SearchFilter};
pub use retrieval::{Answer, RankedContext, SourceRef};
