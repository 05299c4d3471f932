//! Vector store entry models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Arbitrary JSON payload attached to an entry.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A stored vector with its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    /// Raw vector as supplied to `add` (never normalized).
    pub vector: Vec<f32>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub deleted: bool,
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: Uuid,
    /// Similarity in `[0, 1]`, higher is closer.
    pub score: f32,
    pub metadata: Metadata,
}

/// Distance metric used by an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Vectors normalized at insertion, ranked by inner product.
    #[default]
    Cosine,
    /// Euclidean distance.
    L2,
}

impl DistanceMetric {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
        }
    }

    /// Map a raw distance to a similarity score in `[0, 1]`. An undefined
    /// distance scores 0.
    pub fn score(self, distance: f32) -> f32 {
        if distance.is_nan() {
            return 0.0;
        }
        let score = match self {
            // distance = 1 - cos, so (1 + cos) / 2 = (2 - distance) / 2
            Self::Cosine => (2.0 - distance) / 2.0,
            Self::L2 => 1.0 / (1.0 + distance.max(0.0)),
        };
        score.clamp(0.0, 1.0)
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "l2" | "euclidean" => Ok(Self::L2),
            other => Err(format!("unknown distance metric: {other}")),
        }
    }
}

/// Which ANN structure backs the local store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Exact brute-force scan.
    #[default]
    Flat,
    /// Hierarchical navigable small-world graph.
    Hnsw,
}

impl IndexKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Hnsw => "hnsw",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store-level counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub backend: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub index: Option<IndexKind>,
    /// Entries ever added and not yet purged by a rebuild.
    pub total: usize,
    pub live: usize,
    pub tombstoned: usize,
}

impl StoreStats {
    /// Fraction of stored entries that are tombstoned.
    pub fn tombstone_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.tombstoned as f64 / self.total as f64
        }
    }
}
