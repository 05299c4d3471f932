//! In-process nearest-neighbor index.
//!
//! Indexes only know dense positions `0..len`; mapping positions to entry
//! ids is the metadata store's job. Positions are assigned in insertion
//! order, so ordering results by `(distance, position)` gives the
//! insertion-order tie-break for free.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::flat_index::FlatIndex;
use super::hnsw_index::HnswIndex;
use crate::domain::errors::{RagError, RagResult};
use crate::domain::models::{DistanceMetric, HnswConfig, IndexKind};

/// A ranked index hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

impl Eq for Neighbor {}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.position.cmp(&other.position))
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Append-only ANN structure over fixed-dimension vectors.
///
/// There is no delete or update: callers tombstone at a higher level and
/// rebuild from live vectors.
pub trait VectorIndex: Send + Sync {
    fn dimension(&self) -> usize;

    fn metric(&self) -> DistanceMetric;

    /// Number of indexed vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append vectors and return their positions.
    ///
    /// The whole batch is validated before anything is inserted.
    fn add(&mut self, vectors: &[Vec<f32>]) -> RagResult<Vec<usize>>;

    /// Up to `k` nearest positions, ordered by `(distance, position)`.
    fn search(&self, query: &[f32], k: usize) -> RagResult<Vec<Neighbor>>;

    /// Drop every position `>= len`. Used to undo a failed add.
    fn truncate(&mut self, len: usize);
}

/// The index variants a local store can be configured with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AnnIndex {
    Flat(FlatIndex),
    Hnsw(HnswIndex),
}

impl AnnIndex {
    pub fn new(kind: IndexKind, dimension: usize, metric: DistanceMetric, hnsw: HnswConfig) -> Self {
        match kind {
            IndexKind::Flat => Self::Flat(FlatIndex::new(dimension, metric)),
            IndexKind::Hnsw => Self::Hnsw(HnswIndex::new(dimension, metric, hnsw)),
        }
    }

    pub const fn kind(&self) -> IndexKind {
        match self {
            Self::Flat(_) => IndexKind::Flat,
            Self::Hnsw(_) => IndexKind::Hnsw,
        }
    }

    /// Structural check run on an index read back from disk.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Flat(index) => index.validate(),
            Self::Hnsw(index) => index.validate(),
        }
    }

    fn inner(&self) -> &dyn VectorIndex {
        match self {
            Self::Flat(index) => index,
            Self::Hnsw(index) => index,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn VectorIndex {
        match self {
            Self::Flat(index) => index,
            Self::Hnsw(index) => index,
        }
    }
}

impl VectorIndex for AnnIndex {
    fn dimension(&self) -> usize {
        self.inner().dimension()
    }

    fn metric(&self) -> DistanceMetric {
        self.inner().metric()
    }

    fn len(&self) -> usize {
        self.inner().len()
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> RagResult<Vec<usize>> {
        self.inner_mut().add(vectors)
    }

    fn search(&self, query: &[f32], k: usize) -> RagResult<Vec<Neighbor>> {
        self.inner().search(query, k)
    }

    fn truncate(&mut self, len: usize) {
        self.inner_mut().truncate(len);
    }
}

/// Reject a vector whose length differs from `dimension` or that holds a
/// non-finite component.
pub fn check_vector(dimension: usize, vector: &[f32]) -> RagResult<()> {
    if vector.len() != dimension {
        return Err(RagError::DimensionMismatch {
            field: "vector",
            expected: dimension,
            actual: vector.len(),
        });
    }
    match vector.iter().position(|x| !x.is_finite()) {
        Some(component) => Err(RagError::NonFiniteVector {
            field: "vector",
            component,
        }),
        None => Ok(()),
    }
}

/// Transform a vector into the form the index stores and compares.
///
/// Cosine vectors are L2-normalized so inner product equals cosine
/// similarity. Zero vectors are left as-is.
pub fn prepare(metric: DistanceMetric, vector: &[f32]) -> Vec<f32> {
    match metric {
        DistanceMetric::L2 => vector.to_vec(),
        DistanceMetric::Cosine => {
            let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                vector.iter().map(|x| x / norm).collect()
            } else {
                vector.to_vec()
            }
        }
    }
}

/// Distance between two prepared vectors.
pub fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => 1.0 - a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
        DistanceMetric::L2 => a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
    }
}
