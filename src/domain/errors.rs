//! Domain errors for the stockrag retrieval engine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the vector store, the retrieval pipeline and providers.
///
/// A missing entry is never an error: lookups return `Option` and deletes
/// return `bool`.
#[derive(Debug, Error)]
pub enum RagError {
    /// Caller supplied a vector (or batch) of the wrong shape.
    #[error("Dimension mismatch in {field}: expected {expected}, got {actual}")]
    DimensionMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Caller supplied a vector containing NaN or an infinity.
    #[error("Non-finite value in {field} at component {component}")]
    NonFiniteVector {
        field: &'static str,
        component: usize,
    },

    /// Invalid configuration detected at construction time.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An upstream provider did not answer before the deadline.
    #[error("Upstream timeout during {operation}")]
    UpstreamTimeout { operation: &'static str },

    #[error("Embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Generation provider unavailable: {0}")]
    GenerationUnavailable(String),

    /// Persisted snapshot cannot be trusted; the store refuses to start.
    #[error("Corrupt snapshot at {}: {reason}", path.display())]
    CorruptSnapshot { path: PathBuf, reason: String },

    /// Snapshot write kept failing after bounded retries.
    #[error("Failed to write snapshot {} after {attempts} attempts: {source}", path.display())]
    SnapshotWrite {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(String),
}

pub type RagResult<T> = Result<T, RagError>;

impl RagError {
    /// Whether retrying the same call may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::UpstreamTimeout { .. }
                | Self::EmbeddingUnavailable(_)
                | Self::GenerationUnavailable(_)
        )
    }
}

impl From<sqlx::Error> for RagError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RagError::UpstreamTimeout { operation: "embedding" }.is_transient());
        assert!(RagError::EmbeddingUnavailable("down".into()).is_transient());
        assert!(!RagError::Config("bad".into()).is_transient());
        assert!(!RagError::DimensionMismatch {
            field: "vector",
            expected: 4,
            actual: 3
        }
        .is_transient());
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = RagError::DimensionMismatch {
            field: "vector",
            expected: 4,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Dimension mismatch in vector: expected 4, got 3"
        );
    }
}
