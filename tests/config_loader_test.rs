//! Configuration loading from files and environment overrides.

mod common;

use std::fs;

use common::temp_dir;
use stockrag::domain::models::{
    DistanceMetric, EmbeddingProviderKind, GenerationProviderKind, IndexKind, StoreBackend,
};
use stockrag::{ConfigError, ConfigLoader};

const OVERRIDES: [&str; 3] = [
    "STOCKRAG_EMBEDDING__DIMENSION",
    "STOCKRAG_RETRIEVAL__TOP_K",
    "STOCKRAG_LOGGING__LEVEL",
];

#[test]
fn test_load_from_file_with_env_override() {
    let dir = temp_dir();
    let path = dir.path().join("config.yaml");
    fs::write(
        &path,
        r"
store:
  backend: local
  dimension: 1024
  metric: l2
  index: hnsw
embedding:
  provider: mistral
  dimension: 1024
generation:
  provider: ollama
  model: llama3
retrieval:
  top_k: 8
",
    )
    .unwrap();

    temp_env::with_vars(
        [
            ("STOCKRAG_RETRIEVAL__TOP_K", Some("3")),
            ("STOCKRAG_LOGGING__LEVEL", Some("debug")),
        ],
        || {
            let config = ConfigLoader::load_from_file(&path).unwrap();
            assert_eq!(config.store.backend, StoreBackend::Local);
            assert_eq!(config.store.dimension, 1024);
            assert_eq!(config.store.metric, DistanceMetric::L2);
            assert_eq!(config.store.index, IndexKind::Hnsw);
            assert_eq!(config.embedding.provider, EmbeddingProviderKind::Mistral);
            assert_eq!(config.generation.provider, GenerationProviderKind::Ollama);
            assert_eq!(config.generation.model.as_deref(), Some("llama3"));
            assert_eq!(config.retrieval.top_k, 3, "environment wins over file");
            assert_eq!(config.logging.level, "debug");
            assert_eq!(config.chunking.max_size, 1000, "defaults fill the gaps");
        },
    );
}

#[test]
fn test_gemini_providers_parse() {
    let dir = temp_dir();
    let path = dir.path().join("config.yaml");
    fs::write(
        &path,
        "store:\n  dimension: 768\nembedding:\n  provider: gemini\n  dimension: 768\ngeneration:\n  provider: gemini\n",
    )
    .unwrap();

    temp_env::with_vars_unset(OVERRIDES, || {
        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Gemini);
        assert_eq!(config.generation.provider, GenerationProviderKind::Gemini);
    });
}

#[test]
fn test_env_dimension_mismatch_is_rejected() {
    let dir = temp_dir();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "store:\n  dimension: 16\n").unwrap();

    temp_env::with_vars([("STOCKRAG_EMBEDDING__DIMENSION", Some("16"))], || {
        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.store.dimension, 16);
    });

    temp_env::with_vars([("STOCKRAG_EMBEDDING__DIMENSION", None::<&str>)], || {
        let err = ConfigLoader::load_from_file(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ProviderDimension {
                embedding: 384,
                store: 16
            }
        ));
    });
}

#[test]
fn test_invalid_values_fail_extraction() {
    let dir = temp_dir();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "store:\n  metric: manhattan\n").unwrap();

    temp_env::with_vars_unset(OVERRIDES, || {
        let err = ConfigLoader::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Extract(_)));
    });
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = temp_dir();
    temp_env::with_vars_unset(OVERRIDES, || {
        let config = ConfigLoader::load_from_file(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.store.path, ".stockrag/store");
        assert_eq!(config.retrieval.context_char_budget, 4000);
    });
}
