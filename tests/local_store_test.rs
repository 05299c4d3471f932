//! Integration tests for the file-persisted vector store.

mod common;

use std::fs;

use common::{open_local_store, random_vectors, store_config, tagged, temp_dir};
use serde_json::json;
use stockrag::domain::models::{IndexKind, Metadata, StoreConfig};
use stockrag::domain::ports::VectorStore;
use stockrag::{LocalVectorStore, RagError, SearchFilter};
use uuid::Uuid;

fn abc_vectors() -> (Vec<Vec<f32>>, Vec<Metadata>) {
    (
        vec![
            vec![1.0, 0.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.0],
            vec![0.9, 0.1, 0.0, 0.0],
        ],
        vec![tagged("A"), tagged("B"), tagged("C")],
    )
}

fn tags(hits: &[stockrag::SearchHit]) -> Vec<String> {
    hits.iter()
        .map(|h| h.metadata["tag"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_add_get_round_trip() {
    let dir = temp_dir();
    let store = open_local_store(dir.path(), 4, IndexKind::Flat).await;

    let mut metadata = tagged("A");
    metadata.insert("symbol".to_string(), json!("AAPL"));
    let ids = store
        .add(vec![vec![0.5, 0.25, 0.0, 1.0]], vec![metadata.clone()])
        .await
        .unwrap();
    assert_eq!(ids.len(), 1);

    let entry = store.get(ids[0]).await.unwrap().expect("entry should exist");
    assert_eq!(entry.id, ids[0]);
    assert_eq!(entry.vector, vec![0.5, 0.25, 0.0, 1.0]);
    assert_eq!(entry.metadata, metadata);
    assert!(!entry.deleted);
}

#[tokio::test]
async fn test_nearest_neighbors_scenario() {
    for kind in [IndexKind::Flat, IndexKind::Hnsw] {
        let dir = temp_dir();
        let store = open_local_store(dir.path(), 4, kind).await;
        let (vectors, metadata) = abc_vectors();
        store.add(vectors, metadata).await.unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0, 0.0], 2, None).await.unwrap();
        assert_eq!(tags(&hits), vec!["A", "C"], "index {kind}");
        assert!(hits[0].score >= hits[1].score);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }
}

#[tokio::test]
async fn test_deleted_entries_never_returned() {
    let dir = temp_dir();
    let store = open_local_store(dir.path(), 4, IndexKind::Flat).await;
    let (vectors, metadata) = abc_vectors();
    let ids = store.add(vectors, metadata).await.unwrap();

    assert!(store.delete(ids[0]).await.unwrap());
    assert!(store.get(ids[0]).await.unwrap().is_none());

    let hits = store.search(&[1.0, 0.0, 0.0, 0.0], 3, None).await.unwrap();
    assert_eq!(tags(&hits), vec!["C", "B"]);
    assert!(hits.iter().all(|h| h.id != ids[0]));

    // Second delete is a no-op.
    assert!(!store.delete(ids[0]).await.unwrap());
}

#[tokio::test]
async fn test_delete_unknown_id() {
    let dir = temp_dir();
    let store = open_local_store(dir.path(), 4, IndexKind::Flat).await;
    let (vectors, metadata) = abc_vectors();
    store.add(vectors, metadata).await.unwrap();

    assert!(!store.delete(Uuid::new_v4()).await.unwrap());
    assert_eq!(store.len().await, 3);
    assert_eq!(store.stats().await.unwrap().tombstoned, 0);
}

#[tokio::test]
async fn test_dimension_mismatch_leaves_store_unchanged() {
    let dir = temp_dir();
    let store = open_local_store(dir.path(), 4, IndexKind::Flat).await;
    store
        .add(vec![vec![1.0, 0.0, 0.0, 0.0]], vec![tagged("A")])
        .await
        .unwrap();

    let err = store
        .add(
            vec![vec![1.0, 0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]],
            vec![tagged("B"), tagged("C")],
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RagError::DimensionMismatch {
            field: "vector",
            expected: 4,
            actual: 3
        }
    ));

    let err = store
        .add(vec![vec![0.0; 4]], vec![tagged("B"), tagged("C")])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RagError::DimensionMismatch {
            field: "metadata_list",
            ..
        }
    ));

    let err = store.search(&[1.0, 0.0], 1, None).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { .. }));

    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_non_finite_vectors_rejected() {
    let dir = temp_dir();
    let store = open_local_store(dir.path(), 4, IndexKind::Flat).await;
    let (vectors, metadata) = abc_vectors();
    store.add(vectors, metadata).await.unwrap();

    let err = store
        .add(vec![vec![f32::NAN, 0.0, 0.0, 0.0]], vec![tagged("nan")])
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::NonFiniteVector { component: 0, .. }));
    assert_eq!(store.len().await, 3);

    let err = store
        .search(&[0.0, f32::INFINITY, 0.0, 0.0], 3, None)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::NonFiniteVector { component: 1, .. }));

    let hits = store.search(&[1.0, 0.0, 0.0, 0.0], 3, None).await.unwrap();
    assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.score)));
}

#[tokio::test]
async fn test_top_k_bound_and_empty_cases() {
    let dir = temp_dir();
    let store = open_local_store(dir.path(), 8, IndexKind::Flat).await;
    assert!(store.search(&[0.1; 8], 5, None).await.unwrap().is_empty());

    let vectors = random_vectors(20, 8, 7);
    store.add(vectors, vec![Metadata::new(); 20]).await.unwrap();

    assert_eq!(store.search(&[0.1; 8], 5, None).await.unwrap().len(), 5);
    assert_eq!(store.search(&[0.1; 8], 50, None).await.unwrap().len(), 20);
    assert!(store.search(&[0.1; 8], 0, None).await.unwrap().is_empty());
    assert!(store.add(vec![], vec![]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ties_break_by_insertion_order() {
    let dir = temp_dir();
    let store = open_local_store(dir.path(), 2, IndexKind::Flat).await;
    let ids = store
        .add(
            vec![vec![1.0, 1.0], vec![2.0, 2.0], vec![4.0, 4.0]],
            vec![tagged("first"), tagged("second"), tagged("third")],
        )
        .await
        .unwrap();

    for _ in 0..3 {
        let hits = store.search(&[1.0, 1.0], 3, None).await.unwrap();
        let order: Vec<Uuid> = hits.iter().map(|h| h.id).collect();
        assert_eq!(order, ids);
    }
}

#[tokio::test]
async fn test_rebuild_idempotent() {
    let dir = temp_dir();
    let store = open_local_store(dir.path(), 8, IndexKind::Hnsw).await;
    let ids = store
        .add(random_vectors(50, 8, 11), vec![Metadata::new(); 50])
        .await
        .unwrap();
    for id in &ids[..10] {
        store.delete(*id).await.unwrap();
    }

    store.rebuild().await.unwrap();
    let query = random_vectors(1, 8, 99).remove(0);
    let first = store.search(&query, 10, None).await.unwrap();

    store.rebuild().await.unwrap();
    let second = store.search(&query, 10, None).await.unwrap();

    assert_eq!(first, second);
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total, 40);
    assert_eq!(stats.tombstoned, 0);
    for id in &ids[10..] {
        assert!(store.get(*id).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn test_metadata_filter() {
    let dir = temp_dir();
    let store = open_local_store(dir.path(), 4, IndexKind::Flat).await;
    let (vectors, metadata) = abc_vectors();
    store.add(vectors, metadata).await.unwrap();

    let filter = SearchFilter::new().with_metadata("tag", "B");
    let hits = store
        .search(&[1.0, 0.0, 0.0, 0.0], 2, Some(&filter))
        .await
        .unwrap();
    assert_eq!(tags(&hits), vec!["B"]);
}

#[tokio::test]
async fn test_relation_filter_matches_symbol() {
    let dir = temp_dir();
    let store = open_local_store(dir.path(), 4, IndexKind::Flat).await;
    let mut apple = tagged("apple");
    apple.insert("symbol".to_string(), json!("AAPL"));
    let mut samsung = tagged("samsung");
    samsung.insert("symbol".to_string(), json!("005930"));
    store
        .add(
            vec![vec![1.0, 0.0, 0.0, 0.0], vec![0.99, 0.01, 0.0, 0.0]],
            vec![apple, samsung],
        )
        .await
        .unwrap();

    let filter = SearchFilter::new().related_to(stockrag::Relation::About, "aapl");
    let hits = store
        .search(&[0.0, 1.0, 0.0, 0.0], 5, Some(&filter))
        .await
        .unwrap();
    assert_eq!(tags(&hits), vec!["apple"]);
}

#[tokio::test]
async fn test_filter_scans_past_search_margin() {
    let dir = temp_dir();
    let store = LocalVectorStore::open(StoreConfig {
        search_margin: 1,
        ..store_config(dir.path(), 2, IndexKind::Flat)
    })
    .await
    .unwrap();

    let mut vectors = vec![vec![1.0, 0.0]; 30];
    let mut metadata = vec![tagged("near"); 30];
    vectors.push(vec![0.0, 1.0]);
    metadata.push(tagged("far"));
    store.add(vectors, metadata).await.unwrap();

    let filter = SearchFilter::new().with_metadata("tag", "far");
    let hits = store.search(&[1.0, 0.0], 1, Some(&filter)).await.unwrap();
    assert_eq!(tags(&hits), vec!["far"]);
}

#[tokio::test]
async fn test_reopen_returns_same_results() {
    let dir = temp_dir();
    let query = random_vectors(1, 8, 3).remove(0);
    let (ids, before) = {
        let store = open_local_store(dir.path(), 8, IndexKind::Hnsw).await;
        let ids = store
            .add(random_vectors(40, 8, 5), vec![tagged("x"); 40])
            .await
            .unwrap();
        store.delete(ids[3]).await.unwrap();
        (ids, store.search(&query, 5, None).await.unwrap())
    };

    let reopened = open_local_store(dir.path(), 8, IndexKind::Hnsw).await;
    let after = reopened.search(&query, 5, None).await.unwrap();
    assert_eq!(before, after);
    assert!(reopened.get(ids[3]).await.unwrap().is_none());
    assert_eq!(reopened.len().await, 39);
}

#[tokio::test]
async fn test_missing_index_is_replayed_from_raw_vectors() {
    let dir = temp_dir();
    let query = [1.0, 0.0, 0.0, 0.0];
    let before = {
        let store = open_local_store(dir.path(), 4, IndexKind::Flat).await;
        let (vectors, metadata) = abc_vectors();
        store.add(vectors, metadata).await.unwrap();
        store.rebuild().await.unwrap();
        store.search(&query, 3, None).await.unwrap()
    };

    fs::remove_file(dir.path().join("store").join("index.json")).unwrap();

    let reopened = open_local_store(dir.path(), 4, IndexKind::Flat).await;
    assert_eq!(reopened.search(&query, 3, None).await.unwrap(), before);
}

#[tokio::test]
async fn test_stale_index_is_discarded() {
    let dir = temp_dir();
    let index_path = dir.path().join("store").join("index.json");
    let query = [1.0, 0.0, 0.0, 0.0];

    let before = {
        let store = open_local_store(dir.path(), 4, IndexKind::Flat).await;
        let (vectors, metadata) = abc_vectors();
        let ids = store.add(vectors, metadata).await.unwrap();
        store.rebuild().await.unwrap();
        let stale = fs::read(&index_path).unwrap();

        store.delete(ids[0]).await.unwrap();
        store.rebuild().await.unwrap();
        let results = store.search(&query, 3, None).await.unwrap();

        // Simulate a crash that left the previous generation's index behind.
        fs::write(&index_path, stale).unwrap();
        results
    };

    let reopened = open_local_store(dir.path(), 4, IndexKind::Flat).await;
    let after = reopened.search(&query, 3, None).await.unwrap();
    assert_eq!(tags(&after), vec!["C", "B"]);
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_stale_id_map_is_regenerated() {
    let dir = temp_dir();
    let id_map_path = dir.path().join("store").join("id_map.json");
    {
        let store = open_local_store(dir.path(), 4, IndexKind::Flat).await;
        let (vectors, metadata) = abc_vectors();
        store.add(vectors, metadata).await.unwrap();
    }
    fs::write(&id_map_path, "{}").unwrap();

    let reopened = open_local_store(dir.path(), 4, IndexKind::Flat).await;
    assert_eq!(reopened.len().await, 3);
    let repaired: serde_json::Value =
        serde_json::from_slice(&fs::read(&id_map_path).unwrap()).unwrap();
    assert_eq!(repaired.as_object().unwrap().len(), 3);
}

#[tokio::test]
async fn test_corrupt_metadata_refuses_to_open() {
    let dir = temp_dir();
    {
        let store = open_local_store(dir.path(), 4, IndexKind::Flat).await;
        let (vectors, metadata) = abc_vectors();
        store.add(vectors, metadata).await.unwrap();
    }
    fs::write(dir.path().join("store").join("metadata.json"), b"{ not json").unwrap();

    let err = LocalVectorStore::open(store_config(dir.path(), 4, IndexKind::Flat))
        .await
        .err()
        .expect("open should fail");
    assert!(matches!(err, RagError::CorruptSnapshot { .. }));
}

#[tokio::test]
async fn test_damaged_index_graph_refuses_to_open() {
    let dir = temp_dir();
    let index_path = dir.path().join("store").join("index.json");
    {
        let store = open_local_store(dir.path(), 4, IndexKind::Hnsw).await;
        let (vectors, metadata) = abc_vectors();
        store.add(vectors, metadata).await.unwrap();
        store.rebuild().await.unwrap();
    }

    let mut file: serde_json::Value = serde_json::from_slice(&fs::read(&index_path).unwrap()).unwrap();
    file["index"]["links"][0][0] = json!([999]);
    fs::write(&index_path, serde_json::to_vec(&file).unwrap()).unwrap();

    let err = LocalVectorStore::open(store_config(dir.path(), 4, IndexKind::Hnsw))
        .await
        .err()
        .expect("open should fail");
    assert!(matches!(err, RagError::CorruptSnapshot { .. }));
}

#[tokio::test]
async fn test_failed_persistence_rolls_back() {
    let dir = temp_dir();
    let store_dir = dir.path().join("store");
    let store = open_local_store(dir.path(), 4, IndexKind::Flat).await;
    let (vectors, metadata) = abc_vectors();
    let ids = store.add(vectors, metadata).await.unwrap();
    let query = [1.0, 0.0, 0.0, 0.0];
    let before = store.search(&query, 3, None).await.unwrap();

    // Replace the snapshot directory with a plain file so every write fails.
    fs::remove_dir_all(&store_dir).unwrap();
    fs::write(&store_dir, b"blocked").unwrap();

    let err = store
        .add(vec![vec![1.0, 0.0, 0.0, 0.0]], vec![tagged("D")])
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::SnapshotWrite { attempts: 4, .. }));
    assert_eq!(store.len().await, 3);
    assert_eq!(store.search(&query, 3, None).await.unwrap(), before);

    assert!(store.delete(ids[0]).await.is_err());
    assert!(store.get(ids[0]).await.unwrap().is_some());
    assert_eq!(store.search(&query, 3, None).await.unwrap(), before);

    assert!(store.rebuild().await.is_err());
    assert_eq!(store.search(&query, 3, None).await.unwrap(), before);
}

#[tokio::test]
async fn test_failed_add_is_not_resurrected_on_reopen() {
    let dir = temp_dir();
    let id_map_path = dir.path().join("store").join("id_map.json");
    {
        let store = open_local_store(dir.path(), 4, IndexKind::Flat).await;
        store
            .add(vec![vec![1.0, 0.0, 0.0, 0.0]], vec![tagged("A")])
            .await
            .unwrap();

        // A directory in place of the id map makes its replacement fail.
        fs::remove_file(&id_map_path).unwrap();
        fs::create_dir(&id_map_path).unwrap();

        let result = store
            .add(vec![vec![0.0, 1.0, 0.0, 0.0]], vec![tagged("B")])
            .await;
        assert!(matches!(result, Err(RagError::SnapshotWrite { .. })));
        assert_eq!(store.len().await, 1);
    }
    fs::remove_dir(&id_map_path).unwrap();

    let reopened = open_local_store(dir.path(), 4, IndexKind::Flat).await;
    assert_eq!(reopened.len().await, 1);
    let hits = reopened.search(&[0.0, 1.0, 0.0, 0.0], 5, None).await.unwrap();
    assert_eq!(tags(&hits), vec!["A"]);
}

#[tokio::test]
async fn test_failed_rebuild_keeps_committed_records() {
    let dir = temp_dir();
    let id_map_path = dir.path().join("store").join("id_map.json");
    let query = [1.0, 0.0, 0.0, 0.0];
    let before = {
        let store = open_local_store(dir.path(), 4, IndexKind::Hnsw).await;
        let (vectors, metadata) = abc_vectors();
        let ids = store.add(vectors, metadata).await.unwrap();
        store.delete(ids[1]).await.unwrap();

        fs::remove_file(&id_map_path).unwrap();
        fs::create_dir(&id_map_path).unwrap();
        assert!(store.rebuild().await.is_err());

        let stats = store.stats().await.unwrap();
        assert_eq!((stats.total, stats.tombstoned), (3, 1));
        store.search(&query, 3, None).await.unwrap()
    };
    fs::remove_dir(&id_map_path).unwrap();

    // The new index reached disk but its records did not; it is replayed.
    let reopened = open_local_store(dir.path(), 4, IndexKind::Hnsw).await;
    let stats = reopened.stats().await.unwrap();
    assert_eq!((stats.total, stats.tombstoned), (3, 1));
    assert_eq!(reopened.search(&query, 3, None).await.unwrap(), before);
}

#[tokio::test]
async fn test_concurrent_readers_and_writer() {
    let dir = temp_dir();
    let store = std::sync::Arc::new(open_local_store(dir.path(), 8, IndexKind::Flat).await);
    store
        .add(random_vectors(20, 8, 1), vec![Metadata::new(); 20])
        .await
        .unwrap();

    let mut handles = Vec::new();
    for seed in 0..4_u64 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            for query in random_vectors(10, 8, seed + 100) {
                let hits = store.search(&query, 5, None).await.unwrap();
                assert_eq!(hits.len(), 5);
            }
        }));
    }
    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for batch in 0..5_u64 {
                store
                    .add(random_vectors(4, 8, batch + 500), vec![Metadata::new(); 4])
                    .await
                    .unwrap();
            }
        })
    };

    for handle in handles {
        handle.await.unwrap();
    }
    writer.await.unwrap();
    assert_eq!(store.len().await, 40);
}
