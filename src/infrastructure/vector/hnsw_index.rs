//! Approximate index: hierarchical navigable small-world graph.
//!
//! Standard construction: greedy descent through the upper layers, beam
//! search of width `ef_construction` on each layer the new node joins,
//! neighbor lists capped at `m` (`2m` on layer 0). Node levels come from a
//! hash of the position instead of an RNG, so the same inserts always build
//! the same graph.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use serde::{Deserialize, Serialize};

use super::index::{check_vector, distance, prepare, Neighbor, VectorIndex};
use crate::domain::errors::RagResult;
use crate::domain::models::{DistanceMetric, HnswConfig};

const MAX_LEVEL: usize = 16;
const LEVEL_SEED: u64 = 0x5EED_0F_1E7E15;

/// HNSW graph over prepared vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswIndex {
    dimension: usize,
    metric: DistanceMetric,
    params: HnswConfig,
    vectors: Vec<Vec<f32>>,
    /// `links[node][layer]` is the neighbor list of `node` on `layer`.
    links: Vec<Vec<Vec<usize>>>,
    entry_point: Option<usize>,
    max_level: usize,
}

impl HnswIndex {
    pub fn new(dimension: usize, metric: DistanceMetric, params: HnswConfig) -> Self {
        Self {
            dimension,
            metric,
            params,
            vectors: Vec::new(),
            links: Vec::new(),
            entry_point: None,
            max_level: 0,
        }
    }

    /// Structural check of a deserialized graph: every node has a layer 0,
    /// every edge points at a node present on that layer, and the entry
    /// point sits on the top layer.
    pub fn validate(&self) -> Result<(), String> {
        let len = self.vectors.len();
        if self.links.len() != len {
            return Err(format!("{} link lists for {len} vectors", self.links.len()));
        }
        if let Some(position) = self
            .vectors
            .iter()
            .position(|v| v.len() != self.dimension || v.iter().any(|x| !x.is_finite()))
        {
            return Err(format!("vector {position} is malformed"));
        }
        for (node, layers) in self.links.iter().enumerate() {
            if layers.is_empty() || layers.len() > MAX_LEVEL + 1 {
                return Err(format!("node {node} has {} layers", layers.len()));
            }
            for (layer, neighbors) in layers.iter().enumerate() {
                if let Some(&bad) = neighbors
                    .iter()
                    .find(|&&n| n >= len || self.links[n].len() <= layer)
                {
                    return Err(format!("node {node} links to {bad} on layer {layer}"));
                }
            }
        }
        match self.entry_point {
            None if len == 0 => Ok(()),
            None => Err(format!("no entry point for {len} nodes")),
            Some(entry) if entry >= len => Err(format!("entry point {entry} out of range")),
            Some(entry) if self.level_of(entry) != self.max_level => Err(format!(
                "entry point {entry} is not on the top layer {}",
                self.max_level
            )),
            Some(_) => Ok(()),
        }
    }

    fn max_connections(&self, layer: usize) -> usize {
        if layer == 0 {
            self.params.m * 2
        } else {
            self.params.m
        }
    }

    fn level_of(&self, node: usize) -> usize {
        self.links[node].len() - 1
    }

    fn dist(&self, query: &[f32], node: usize) -> f32 {
        distance(self.metric, query, &self.vectors[node])
    }

    fn insert(&mut self, vector: Vec<f32>) -> usize {
        let node = self.vectors.len();
        let level = assign_level(node, self.params.m);
        self.vectors.push(vector);
        self.links.push(vec![Vec::new(); level + 1]);

        let Some(entry) = self.entry_point else {
            self.entry_point = Some(node);
            self.max_level = level;
            return node;
        };

        let query = self.vectors[node].clone();
        let mut current = entry;
        for layer in (level + 1..=self.max_level).rev() {
            current = self.greedy_closest(&query, current, layer);
        }

        for layer in (0..=level.min(self.max_level)).rev() {
            let candidates = self.search_layer(&query, current, self.params.ef_construction, layer);
            let max_conn = self.max_connections(layer);
            let selected: Vec<usize> = candidates
                .iter()
                .filter(|n| n.position != node)
                .take(max_conn)
                .map(|n| n.position)
                .collect();

            for &neighbor in &selected {
                self.links[neighbor][layer].push(node);
                if self.links[neighbor][layer].len() > max_conn {
                    self.prune(neighbor, layer, max_conn);
                }
            }
            self.links[node][layer] = selected;

            if let Some(best) = candidates.first() {
                current = best.position;
            }
        }

        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(node);
        }
        node
    }

    /// Keep the `max_conn` closest neighbors of `node` on `layer`.
    fn prune(&mut self, node: usize, layer: usize, max_conn: usize) {
        let mut ranked: Vec<Neighbor> = self.links[node][layer]
            .iter()
            .map(|&position| Neighbor {
                position,
                distance: distance(self.metric, &self.vectors[node], &self.vectors[position]),
            })
            .collect();
        ranked.sort_unstable();
        ranked.truncate(max_conn);
        self.links[node][layer] = ranked.into_iter().map(|n| n.position).collect();
    }

    /// Walk to the closest node on `layer`, one improving hop at a time.
    fn greedy_closest(&self, query: &[f32], start: usize, layer: usize) -> usize {
        let mut best = Neighbor {
            position: start,
            distance: self.dist(query, start),
        };
        loop {
            let mut improved = false;
            for &neighbor in &self.links[best.position][layer] {
                let candidate = Neighbor {
                    position: neighbor,
                    distance: self.dist(query, neighbor),
                };
                if candidate < best {
                    best = candidate;
                    improved = true;
                }
            }
            if !improved {
                return best.position;
            }
        }
    }

    /// Beam search on one layer; returns up to `ef` nodes, closest first.
    fn search_layer(&self, query: &[f32], entry: usize, ef: usize, layer: usize) -> Vec<Neighbor> {
        let ef = ef.max(1);
        let start = Neighbor {
            position: entry,
            distance: self.dist(query, entry),
        };
        let mut visited = HashSet::from([entry]);
        let mut candidates = BinaryHeap::from([Reverse(start)]);
        let mut results = BinaryHeap::from([start]);

        while let Some(Reverse(current)) = candidates.pop() {
            if results.len() >= ef && results.peek().is_some_and(|worst| current > *worst) {
                break;
            }
            for &neighbor in &self.links[current.position][layer] {
                if !visited.insert(neighbor) {
                    continue;
                }
                let candidate = Neighbor {
                    position: neighbor,
                    distance: self.dist(query, neighbor),
                };
                if results.len() < ef || results.peek().is_some_and(|worst| candidate < *worst) {
                    candidates.push(Reverse(candidate));
                    results.push(candidate);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec()
    }
}

impl VectorIndex for HnswIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> RagResult<Vec<usize>> {
        for vector in vectors {
            check_vector(self.dimension, vector)?;
        }
        Ok(vectors
            .iter()
            .map(|vector| self.insert(prepare(self.metric, vector)))
            .collect())
    }

    fn search(&self, query: &[f32], k: usize) -> RagResult<Vec<Neighbor>> {
        check_vector(self.dimension, query)?;
        let Some(entry) = self.entry_point else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = prepare(self.metric, query);
        let mut current = entry;
        for layer in (1..=self.max_level).rev() {
            current = self.greedy_closest(&query, current, layer);
        }
        let mut hits = self.search_layer(&query, current, self.params.ef_search.max(k), 0);
        hits.truncate(k);
        Ok(hits)
    }

    /// Edges pruned in favor of removed nodes are not restored.
    fn truncate(&mut self, len: usize) {
        if len >= self.vectors.len() {
            return;
        }
        self.vectors.truncate(len);
        self.links.truncate(len);
        for node_links in &mut self.links {
            for layer in node_links.iter_mut() {
                layer.retain(|&neighbor| neighbor < len);
            }
        }

        // Highest level wins, lowest position among equals.
        self.entry_point = (0..len).max_by_key(|&node| (self.level_of(node), Reverse(node)));
        self.max_level = self.entry_point.map_or(0, |node| self.level_of(node));
    }
}

/// Deterministic level draw: `floor(-ln(u) / ln(m))` with `u` hashed from
/// the position.
fn assign_level(position: usize, m: usize) -> usize {
    let bits = splitmix64(position as u64 ^ LEVEL_SEED) >> 11;
    // Uniform in (0, 1].
    let uniform = (bits as f64 + 1.0) / (1u64 << 53) as f64;
    let scale = 1.0 / (m.max(2) as f64).ln();
    let level = (-uniform.ln() * scale).floor();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let level = level as usize;
    level.min(MAX_LEVEL)
}

const fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}
