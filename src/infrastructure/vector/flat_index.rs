//! Exact brute-force index.

use serde::{Deserialize, Serialize};

use super::index::{check_vector, distance, prepare, Neighbor, VectorIndex};
use crate::domain::errors::RagResult;
use crate::domain::models::DistanceMetric;

/// Row-major flat index. Every search scans all vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    metric: DistanceMetric,
    data: Vec<f32>,
}

impl FlatIndex {
    pub const fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            data: Vec::new(),
        }
    }

    /// Structural check of a deserialized index.
    pub fn validate(&self) -> Result<(), String> {
        if self.dimension == 0 {
            return Err("flat index has dimension 0".to_string());
        }
        if self.data.len() % self.dimension != 0 {
            return Err(format!(
                "flat index holds {} values, not a multiple of dimension {}",
                self.data.len(),
                self.dimension
            ));
        }
        if self.data.iter().any(|x| !x.is_finite()) {
            return Err("flat index holds non-finite values".to_string());
        }
        Ok(())
    }

    fn row(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.data[start..start + self.dimension]
    }
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> RagResult<Vec<usize>> {
        for vector in vectors {
            check_vector(self.dimension, vector)?;
        }

        let first = self.len();
        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend(prepare(self.metric, vector));
        }
        Ok((first..first + vectors.len()).collect())
    }

    fn search(&self, query: &[f32], k: usize) -> RagResult<Vec<Neighbor>> {
        check_vector(self.dimension, query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let query = prepare(self.metric, query);
        let mut hits: Vec<Neighbor> = (0..self.len())
            .map(|position| Neighbor {
                position,
                distance: distance(self.metric, &query, self.row(position)),
            })
            .collect();

        if k < hits.len() {
            hits.select_nth_unstable(k - 1);
            hits.truncate(k);
        }
        hits.sort_unstable();
        Ok(hits)
    }

    fn truncate(&mut self, len: usize) {
        self.data.truncate(len * self.dimension);
    }
}
