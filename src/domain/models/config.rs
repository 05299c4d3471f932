use serde::{Deserialize, Serialize};

use super::chunking::ChunkingConfig;
use super::entry::{DistanceMetric, IndexKind};

/// Upper bound for every configurable timeout, in seconds (one day).
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Main configuration structure for stockrag
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Vector store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Document chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Query-time retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Generation provider configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which vector store backend to open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// File-persisted in-process index
    #[default]
    Local,
    /// `SQLite` tables with relationship links
    Sqlite,
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Snapshot directory (local) or database file (sqlite)
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Vector dimension, fixed for the lifetime of a store
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default)]
    pub metric: DistanceMetric,

    #[serde(default)]
    pub index: IndexKind,

    /// Graph parameters when `index` is `hnsw`
    #[serde(default)]
    pub hnsw: HnswConfig,

    /// Extra candidates fetched beyond `k` to absorb tombstones
    #[serde(default = "default_search_margin")]
    pub search_margin: usize,

    /// Tombstone ratio above which a compaction is due
    #[serde(default = "default_rebuild_threshold")]
    pub rebuild_threshold: f64,

    /// Compact automatically when a delete crosses `rebuild_threshold`
    #[serde(default = "default_true")]
    pub auto_rebuild: bool,

    /// Snapshot write retry policy
    #[serde(default)]
    pub persistence: PersistenceRetryConfig,
}

fn default_store_path() -> String {
    ".stockrag/store".to_string()
}

const fn default_dimension() -> usize {
    384
}

const fn default_search_margin() -> usize {
    10
}

const fn default_rebuild_threshold() -> f64 {
    0.3
}

const fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
            dimension: default_dimension(),
            metric: DistanceMetric::default(),
            index: IndexKind::default(),
            hnsw: HnswConfig::default(),
            search_margin: default_search_margin(),
            rebuild_threshold: default_rebuild_threshold(),
            auto_rebuild: default_true(),
            persistence: PersistenceRetryConfig::default(),
        }
    }
}

/// HNSW graph parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HnswConfig {
    /// Neighbors per node on upper layers (layer 0 keeps twice as many)
    #[serde(default = "default_hnsw_m")]
    pub m: usize,

    /// Beam width while inserting
    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,

    /// Beam width while searching (raised to `k` when smaller)
    #[serde(default = "default_ef_search")]
    pub ef_search: usize,
}

const fn default_hnsw_m() -> usize {
    16
}

const fn default_ef_construction() -> usize {
    200
}

const fn default_ef_search() -> usize {
    64
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: default_hnsw_m(),
            ef_construction: default_ef_construction(),
            ef_search: default_ef_search(),
        }
    }
}

/// Retry policy for snapshot writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PersistenceRetryConfig {
    /// Retries after the first failed attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    10
}

const fn default_max_backoff_ms() -> u64 {
    200
}

impl Default for PersistenceRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Query-time retrieval configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetrievalConfig {
    /// Default number of results
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Maximum characters of rendered context handed to the generator
    #[serde(default = "default_context_char_budget")]
    pub context_char_budget: usize,

    /// Default end-to-end deadline for `answer`, in seconds
    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_top_k() -> usize {
    5
}

const fn default_context_char_budget() -> usize {
    4000
}

const fn default_retrieval_timeout_secs() -> u64 {
    30
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            context_char_budget: default_context_char_budget(),
            timeout_secs: default_retrieval_timeout_secs(),
        }
    }
}

/// Embedding backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Offline feature-hashing embedder
    #[default]
    Hashing,
    OpenAi,
    Mistral,
    Ollama,
    Gemini,
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,

    /// Model name; provider default when unset
    #[serde(default)]
    pub model: Option<String>,

    /// API base URL; provider default when unset
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key; falls back to the provider's environment variable
    #[serde(default)]
    pub api_key: Option<String>,

    /// Output dimension, must equal `store.dimension`
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum texts per request
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

const fn default_provider_timeout_secs() -> u64 {
    30
}

const fn default_max_batch_size() -> usize {
    64
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            model: None,
            base_url: None,
            api_key: None,
            dimension: default_dimension(),
            timeout_secs: default_provider_timeout_secs(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

/// Generation backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProviderKind {
    /// No generator; answers are always degraded
    #[default]
    None,
    OpenAi,
    Mistral,
    Ollama,
    Gemini,
}

/// Generation provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GenerationConfig {
    #[serde(default)]
    pub provider: GenerationProviderKind,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

const fn default_temperature() -> f32 {
    0.3
}

const fn default_max_tokens() -> u32 {
    1000
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationProviderKind::default(),
            model: None,
            base_url: None,
            api_key: None,
            timeout_secs: default_provider_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation for file logs: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
