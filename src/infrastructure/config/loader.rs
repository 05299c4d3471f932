use std::path::Path;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::errors::RagError;
use crate::domain::models::config::{Config, StoreBackend, MAX_TIMEOUT_SECS};

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_LOG_FORMATS: [&str; 2] = ["json", "pretty"];
const VALID_ROTATIONS: [&str; 3] = ["daily", "hourly", "never"];

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    #[error("Invalid dimension: {0}. Must be at least 1")]
    InvalidDimension(usize),

    #[error("Store path cannot be empty")]
    EmptyStorePath,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Invalid rebuild_threshold: {0}. Must be in (0, 1]")]
    InvalidRebuildThreshold(f64),

    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid top_k: {0}. Must be at least 1")]
    InvalidTopK(usize),

    #[error("Invalid context_char_budget: {0}. Must be at least 1")]
    InvalidContextBudget(usize),

    #[error("Invalid {field}: {value}. Must be between 1 and {MAX_TIMEOUT_SECS}")]
    InvalidTimeout { field: &'static str, value: u64 },

    #[error("Embedding dimension ({embedding}) must match store dimension ({store})")]
    ProviderDimension { embedding: usize, store: usize },

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Extract(Box::new(err))
    }
}

impl From<ConfigError> for RagError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .stockrag/config.yaml (project config)
    /// 3. .stockrag/local.yaml (local overrides, optional)
    /// 4. Environment variables (STOCKRAG_* prefix, `__` for nesting)
    pub fn load() -> Result<Config, ConfigError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".stockrag/config.yaml"))
            .merge(Yaml::file(".stockrag/local.yaml"))
            .merge(Env::prefixed("STOCKRAG_").split("__"))
            .extract()?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("STOCKRAG_").split("__"))
            .extract()?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let store = &config.store;
        if store.dimension == 0 {
            return Err(ConfigError::InvalidDimension(store.dimension));
        }

        if store.path.trim().is_empty() {
            return Err(ConfigError::EmptyStorePath);
        }

        if !(store.rebuild_threshold > 0.0 && store.rebuild_threshold <= 1.0) {
            return Err(ConfigError::InvalidRebuildThreshold(store.rebuild_threshold));
        }

        if store.persistence.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(store.persistence.max_retries));
        }

        if store.persistence.initial_backoff_ms >= store.persistence.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                store.persistence.initial_backoff_ms,
                store.persistence.max_backoff_ms,
            ));
        }

        if store.hnsw.m == 0 || store.hnsw.ef_construction == 0 || store.hnsw.ef_search == 0 {
            return Err(ConfigError::ValidationFailed(
                "store.hnsw m, ef_construction and ef_search must be at least 1".to_string(),
            ));
        }

        if store.backend == StoreBackend::Sqlite && Path::new(&store.path).is_dir() {
            return Err(ConfigError::ValidationFailed(format!(
                "store.path '{}' is a directory; the sqlite backend needs a database file",
                store.path
            )));
        }

        config
            .chunking
            .validate()
            .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;

        if config.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidTopK(config.retrieval.top_k));
        }

        if config.retrieval.context_char_budget == 0 {
            return Err(ConfigError::InvalidContextBudget(
                config.retrieval.context_char_budget,
            ));
        }

        for (field, value) in [
            ("retrieval.timeout_secs", config.retrieval.timeout_secs),
            ("embedding.timeout_secs", config.embedding.timeout_secs),
            ("generation.timeout_secs", config.generation.timeout_secs),
        ] {
            if value == 0 || value > MAX_TIMEOUT_SECS {
                return Err(ConfigError::InvalidTimeout { field, value });
            }
        }

        if config.embedding.dimension != store.dimension {
            return Err(ConfigError::ProviderDimension {
                embedding: config.embedding.dimension,
                store: store.dimension,
            });
        }

        if config.embedding.max_batch_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "embedding.max_batch_size must be at least 1".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if !VALID_LOG_FORMATS.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if !VALID_ROTATIONS.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}
