//! Flat vs HNSW search latency.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stockrag::domain::models::{DistanceMetric, HnswConfig, IndexKind};
use stockrag::infrastructure::vector::{AnnIndex, VectorIndex};

const DIMENSION: usize = 128;

fn vectors(count: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut state = seed.max(1);
    (0..count)
        .map(|_| {
            (0..DIMENSION)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    (state % 2_000) as f32 / 1_000.0 - 1.0
                })
                .collect()
        })
        .collect()
}

fn build(kind: IndexKind, data: &[Vec<f32>]) -> AnnIndex {
    let mut index = AnnIndex::new(kind, DIMENSION, DistanceMetric::Cosine, HnswConfig::default());
    index.add(data).expect("vectors have the index dimension");
    index
}

fn search_benchmark(c: &mut Criterion) {
    let queries = vectors(32, 7);
    let mut group = c.benchmark_group("search_top10");

    for size in [1_000, 10_000] {
        let data = vectors(size, 42);
        for kind in [IndexKind::Flat, IndexKind::Hnsw] {
            let index = build(kind, &data);
            group.bench_with_input(BenchmarkId::new(kind.as_str(), size), &index, |b, index| {
                let mut i = 0;
                b.iter(|| {
                    i = (i + 1) % queries.len();
                    black_box(index.search(black_box(&queries[i]), 10))
                });
            });
        }
    }
    group.finish();
}

fn insert_benchmark(c: &mut Criterion) {
    let data = vectors(1_000, 3);
    let mut group = c.benchmark_group("build_1000");
    group.sample_size(10);
    for kind in [IndexKind::Flat, IndexKind::Hnsw] {
        group.bench_function(kind.as_str(), |b| b.iter(|| build(kind, black_box(&data))));
    }
    group.finish();
}

criterion_group!(benches, search_benchmark, insert_benchmark);
criterion_main!(benches);
