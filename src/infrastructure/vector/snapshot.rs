//! Snapshot files of the local store.
//!
//! Layout of a store directory:
//! - `metadata.json`: header plus `{id -> record}`, raw vectors included
//! - `id_map.json`: `{live id -> position}`
//! - `index.json`: serialized index, rewritten on rebuild only
//!
//! Every file is replaced atomically (temp file in the same directory,
//! fsync, rename). Writes are retried with exponential backoff.
//!
//! `metadata.json` is the commit point and is always written last. A write
//! that fails before it leaves the previous records in place; the id map and
//! index written ahead of it no longer match and are regenerated on load.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{error, warn};
use uuid::Uuid;

use super::index::AnnIndex;
use super::metadata_store::{EntryRecord, MetadataStore};
use crate::domain::errors::{RagError, RagResult};
use crate::domain::models::{DistanceMetric, PersistenceRetryConfig};

pub const METADATA_FILE: &str = "metadata.json";
pub const ID_MAP_FILE: &str = "id_map.json";
pub const INDEX_FILE: &str = "index.json";
const FORMAT_VERSION: u32 = 1;

/// Store-wide facts recorded alongside the entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub dimension: usize,
    pub metric: DistanceMetric,
    /// Bumped by every rebuild; ties `index.json` to `metadata.json`.
    pub generation: u64,
}

#[derive(Serialize)]
struct MetadataFileRef<'a> {
    version: u32,
    dimension: usize,
    metric: DistanceMetric,
    generation: u64,
    entries: BTreeMap<&'a Uuid, &'a EntryRecord>,
}

#[derive(Deserialize)]
struct MetadataFile {
    version: u32,
    dimension: usize,
    metric: DistanceMetric,
    generation: u64,
    entries: HashMap<Uuid, EntryRecord>,
}

#[derive(Serialize, Deserialize)]
struct IndexFile<I> {
    version: u32,
    generation: u64,
    index: I,
}

/// Result of reading a store directory.
#[derive(Debug)]
pub struct LoadedSnapshot {
    pub header: SnapshotHeader,
    pub records: MetadataStore,
    /// Persisted index with the generation it was built for.
    pub index: Option<(u64, AnnIndex)>,
    /// `id_map.json` was missing or stale and has been regenerated.
    pub id_map_repaired: bool,
}

/// Reads and writes the snapshot files of one store directory.
#[derive(Debug, Clone)]
pub struct SnapshotDir {
    root: PathBuf,
    retry: PersistenceRetryConfig,
}

impl SnapshotDir {
    pub fn new(root: impl Into<PathBuf>, retry: PersistenceRetryConfig) -> Self {
        Self {
            root: root.into(),
            retry,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(METADATA_FILE)
    }

    pub fn id_map_path(&self) -> PathBuf {
        self.root.join(ID_MAP_FILE)
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    /// Persist the live id map, then commit the records.
    pub async fn write_records(
        &self,
        header: &SnapshotHeader,
        records: &MetadataStore,
    ) -> RagResult<()> {
        let metadata = serde_json::to_vec(&MetadataFileRef {
            version: FORMAT_VERSION,
            dimension: header.dimension,
            metric: header.metric,
            generation: header.generation,
            entries: records.records().iter().collect(),
        })?;
        let id_map: BTreeMap<&Uuid, &usize> = records.id_map().iter().collect();
        let id_map = serde_json::to_vec(&id_map)?;

        self.write_with_retry(&self.id_map_path(), &id_map).await?;
        self.write_with_retry(&self.metadata_path(), &metadata).await
    }

    pub async fn write_index(&self, generation: u64, index: &AnnIndex) -> RagResult<()> {
        let bytes = serde_json::to_vec(&IndexFile {
            version: FORMAT_VERSION,
            generation,
            index,
        })?;
        self.write_with_retry(&self.index_path(), &bytes).await
    }

    /// Atomic replace of `path`, retried with exponential backoff.
    async fn write_with_retry(&self, path: &Path, bytes: &[u8]) -> RagResult<()> {
        let attempts = self.retry.max_retries + 1;
        let mut backoff_ms = self.retry.initial_backoff_ms;
        let mut attempt = 1;

        loop {
            match write_atomic(path, bytes) {
                Ok(()) => return Ok(()),
                Err(source) if attempt >= attempts => {
                    error!(path = %path.display(), attempts, error = %source, "snapshot write failed");
                    return Err(RagError::SnapshotWrite {
                        path: path.to_path_buf(),
                        attempts,
                        source,
                    });
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        attempt,
                        backoff_ms,
                        error = %err,
                        "snapshot write failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms * 2).min(self.retry.max_backoff_ms);
                    attempt += 1;
                }
            }
        }
    }

    /// Read the directory. `Ok(None)` for a store that was never written.
    ///
    /// # Errors
    /// `CorruptSnapshot` when a file cannot be parsed, the records are
    /// inconsistent, or the persisted index is structurally invalid.
    pub fn load(&self) -> RagResult<Option<LoadedSnapshot>> {
        let metadata_path = self.metadata_path();
        let id_map_path = self.id_map_path();

        let Some(file) = read_json::<MetadataFile>(&metadata_path)? else {
            if id_map_path.exists() {
                // Left by a first write that never committed.
                warn!(path = %id_map_path.display(), "ignoring id map without metadata.json");
            }
            return Ok(None);
        };

        if file.version != FORMAT_VERSION {
            return Err(corrupt(
                &metadata_path,
                format!("unsupported format version {}", file.version),
            ));
        }

        let header = SnapshotHeader {
            dimension: file.dimension,
            metric: file.metric,
            generation: file.generation,
        };
        let records = MetadataStore::from_records(file.entries, file.dimension)
            .map_err(|reason| corrupt(&metadata_path, reason))?;

        // Records are authoritative; the id map may belong to a write that
        // never committed.
        let id_map_repaired = match read_json::<HashMap<Uuid, usize>>(&id_map_path)? {
            Some(id_map) if &id_map == records.id_map() => false,
            Some(_) => {
                warn!(path = %id_map_path.display(), "id map disagrees with records, regenerating");
                true
            }
            None => {
                warn!(path = %id_map_path.display(), "id map missing, regenerating");
                true
            }
        };

        let index_path = self.index_path();
        let index = match read_json::<IndexFile<AnnIndex>>(&index_path)? {
            Some(file) => {
                file.index
                    .validate()
                    .map_err(|reason| corrupt(&index_path, reason))?;
                Some((file.generation, file.index))
            }
            None => None,
        };

        Ok(Some(LoadedSnapshot {
            header,
            records,
            index,
            id_map_repaired,
        }))
    }
}

/// Write `bytes` to a temp file next to `path`, fsync, then rename over it.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> RagResult<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| corrupt(path, e.to_string()))
}

fn corrupt(path: &Path, reason: impl Into<String>) -> RagError {
    RagError::CorruptSnapshot {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{HnswConfig, IndexKind, Metadata};
    use crate::infrastructure::vector::index::VectorIndex;
    use chrono::Utc;

    fn header() -> SnapshotHeader {
        SnapshotHeader {
            dimension: 2,
            metric: DistanceMetric::L2,
            generation: 0,
        }
    }

    fn fast_retry() -> PersistenceRetryConfig {
        PersistenceRetryConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    #[test]
    fn test_write_atomic_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.json");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"two");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_round_trip_records_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = SnapshotDir::new(dir.path(), fast_retry());
        assert!(snapshots.load().unwrap().is_none());

        let mut records = MetadataStore::new();
        let id = Uuid::new_v4();
        records.put(id, vec![1.0, 2.0], Metadata::new(), Utc::now());
        records.put(Uuid::new_v4(), vec![3.0, 4.0], Metadata::new(), Utc::now());
        records.delete(id);
        snapshots.write_records(&header(), &records).await.unwrap();

        let mut index = AnnIndex::new(IndexKind::Flat, 2, DistanceMetric::L2, HnswConfig::default());
        index.add(&records.vectors_from(0)).unwrap();
        snapshots.write_index(0, &index).await.unwrap();

        let loaded = snapshots.load().unwrap().unwrap();
        assert_eq!(loaded.header, header());
        assert!(!loaded.id_map_repaired);
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.records.live_len(), 1);
        assert_eq!(loaded.records.records()[&id].vector, vec![1.0, 2.0]);
        let (generation, index) = loaded.index.unwrap();
        assert_eq!(generation, 0);
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_id_map_is_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = SnapshotDir::new(dir.path(), fast_retry());
        let mut records = MetadataStore::new();
        records.put(Uuid::new_v4(), vec![1.0, 2.0], Metadata::new(), Utc::now());
        snapshots.write_records(&header(), &records).await.unwrap();
        std::fs::write(snapshots.id_map_path(), b"{}").unwrap();

        let loaded = snapshots.load().unwrap().unwrap();
        assert!(loaded.id_map_repaired);
        assert_eq!(loaded.records.live_len(), 1);
    }

    #[test]
    fn test_garbage_metadata_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = SnapshotDir::new(dir.path(), fast_retry());
        std::fs::write(snapshots.metadata_path(), b"{not json").unwrap();
        assert!(matches!(
            snapshots.load().unwrap_err(),
            RagError::CorruptSnapshot { .. }
        ));
    }

    #[test]
    fn test_uncommitted_id_map_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = SnapshotDir::new(dir.path(), fast_retry());
        std::fs::write(snapshots.id_map_path(), b"{}").unwrap();
        assert!(snapshots.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_previous_records() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = SnapshotDir::new(dir.path(), fast_retry());
        let mut records = MetadataStore::new();
        records.put(Uuid::new_v4(), vec![1.0, 2.0], Metadata::new(), Utc::now());
        snapshots.write_records(&header(), &records).await.unwrap();

        // The id map can no longer be replaced, so nothing after it is written.
        std::fs::remove_file(snapshots.id_map_path()).unwrap();
        std::fs::create_dir(snapshots.id_map_path()).unwrap();
        records.put(Uuid::new_v4(), vec![3.0, 4.0], Metadata::new(), Utc::now());
        let err = snapshots.write_records(&header(), &records).await.unwrap_err();
        assert!(matches!(err, RagError::SnapshotWrite { .. }));

        std::fs::remove_dir(snapshots.id_map_path()).unwrap();
        let loaded = snapshots.load().unwrap().unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert!(loaded.id_map_repaired);
    }

    #[tokio::test]
    async fn test_write_gives_up_after_bounded_retries() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        // A regular file where the store directory should be.
        std::fs::write(&blocked, b"").unwrap();
        let snapshots = SnapshotDir::new(&blocked, fast_retry());

        let err = snapshots
            .write_records(&header(), &MetadataStore::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::SnapshotWrite { attempts: 3, .. }));
    }
}
