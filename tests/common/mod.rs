//! Common test utilities for integration tests
//!
//! Provides shared fixtures, helpers, and mock providers used across
//! multiple integration test files.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;

use stockrag::domain::models::{DistanceMetric, IndexKind, Metadata, StoreConfig};
use stockrag::{EmbeddingProvider, GenerationProvider, LocalVectorStore, RagError, RagResult};

/// Create a temporary directory for test isolation
///
/// Returns a TempDir that will be cleaned up when dropped.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Store configuration rooted at `dir` with auto-rebuild disabled
pub fn store_config(dir: &Path, dimension: usize, index: IndexKind) -> StoreConfig {
    StoreConfig {
        path: dir.join("store").display().to_string(),
        dimension,
        metric: DistanceMetric::Cosine,
        index,
        auto_rebuild: false,
        ..StoreConfig::default()
    }
}

/// Open a local store under `dir`
pub async fn open_local_store(dir: &Path, dimension: usize, index: IndexKind) -> LocalVectorStore {
    LocalVectorStore::open(store_config(dir, dimension, index))
        .await
        .expect("Failed to open local store")
}

/// Metadata with a single `tag` field
pub fn tagged(tag: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("tag".to_string(), json!(tag));
    metadata
}

/// Deterministic pseudo-random vectors (xorshift), reproducible across runs
pub fn random_vectors(count: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut state = seed.max(1);
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state % 10_000) as f32 / 5_000.0 - 1.0
    };
    (0..count)
        .map(|_| (0..dimension).map(|_| next()).collect())
        .collect()
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Embedder mapping known keywords onto fixed axes.
///
/// Text containing `axes[i]` gets weight on dimension `i`; anything else
/// lands on the last dimension.
pub struct KeywordEmbedder {
    pub axes: Vec<&'static str>,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(axes: Vec<&'static str>) -> Self {
        Self {
            axes,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(axes: Vec<&'static str>, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(axes)
        }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut vector = vec![0.0; self.axes.len() + 1];
        let mut any = false;
        for (i, keyword) in self.axes.iter().enumerate() {
            if lower.contains(keyword) {
                vector[i] = 1.0;
                any = true;
            }
        }
        if !any {
            vector[self.axes.len()] = 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn dimension(&self) -> usize {
        self.axes.len() + 1
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.vector_for(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn max_batch_size(&self) -> usize {
        2
    }
}

/// Generator returning a canned answer, optionally after a delay
pub struct ScriptedGenerator {
    pub reply: Result<String, String>,
    pub delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn answering(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            delay: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            reply: Err(reason.to_string()),
            delay: None,
        }
    }

    pub fn slow(reply: &str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::answering(reply)
        }
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, _prompt: &str) -> RagResult<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Ok(reply) => Ok(reply.clone()),
            Err(reason) => Err(RagError::GenerationUnavailable(reason.clone())),
        }
    }
}
