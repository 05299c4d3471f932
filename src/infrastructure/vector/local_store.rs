//! File-persisted vector store.
//!
//! Composes an in-process index with the metadata store behind one
//! reader/writer lock. Searches and lookups share the lock; add, delete and
//! rebuild hold it exclusively, including while the snapshot is written.
//! A write that still fails after its retries rolls the in-memory state back
//! to what the last good snapshot describes.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::index::{check_vector, AnnIndex, VectorIndex};
use super::metadata_store::MetadataStore;
use super::snapshot::{LoadedSnapshot, SnapshotDir, SnapshotHeader};
use crate::domain::errors::{RagError, RagResult};
use crate::domain::models::{
    Entry, Metadata, SearchFilter, SearchHit, StoreConfig, StoreStats,
};
use crate::domain::ports::VectorStore;

struct StoreState {
    index: AnnIndex,
    records: MetadataStore,
    generation: u64,
}

/// Local vector store persisted as JSON snapshots in one directory.
pub struct LocalVectorStore {
    config: StoreConfig,
    snapshots: SnapshotDir,
    state: RwLock<StoreState>,
}

impl LocalVectorStore {
    /// Open (or create) the store at `config.path`.
    ///
    /// The index is restored from `index.json` when it matches the records,
    /// then any positions it is missing are replayed from the raw vectors.
    ///
    /// # Errors
    /// * `Config` when the snapshot was written with another dimension or metric
    /// * `CorruptSnapshot` when the snapshot files cannot be trusted
    pub async fn open(config: StoreConfig) -> RagResult<Self> {
        if config.dimension == 0 {
            return Err(RagError::Config("store.dimension must be greater than 0".into()));
        }
        std::fs::create_dir_all(&config.path)?;
        let snapshots = SnapshotDir::new(&config.path, config.persistence);

        let (state, repaired) = match snapshots.load()? {
            Some(loaded) => Self::restore(&config, &snapshots, loaded)?,
            None => (
                StoreState {
                    index: Self::empty_index(&config),
                    records: MetadataStore::new(),
                    generation: 0,
                },
                false,
            ),
        };

        let store = Self {
            config,
            snapshots,
            state: RwLock::new(state),
        };

        if repaired {
            let state = store.state.read().await;
            store.persist(&state).await?;
        }

        {
            let state = store.state.read().await;
            info!(
                path = %store.config.path,
                index = %store.config.index,
                metric = %store.config.metric,
                live = state.records.live_len(),
                tombstoned = state.records.tombstoned(),
                "opened local vector store"
            );
        }
        Ok(store)
    }

    fn restore(
        config: &StoreConfig,
        snapshots: &SnapshotDir,
        loaded: LoadedSnapshot,
    ) -> RagResult<(StoreState, bool)> {
        let LoadedSnapshot {
            header,
            records,
            index,
            id_map_repaired,
        } = loaded;

        if header.dimension != config.dimension {
            return Err(RagError::Config(format!(
                "store at {} has dimension {}, configured {}",
                snapshots.root().display(),
                header.dimension,
                config.dimension
            )));
        }
        if header.metric != config.metric {
            return Err(RagError::Config(format!(
                "store at {} uses metric {}, configured {}",
                snapshots.root().display(),
                header.metric,
                config.metric
            )));
        }

        let mut index = match index {
            Some((generation, index))
                if generation == header.generation
                    && index.kind() == config.index
                    && index.dimension() == config.dimension
                    && index.metric() == config.metric
                    && index.len() <= records.len() =>
            {
                index
            }
            Some(_) => {
                warn!(
                    path = %snapshots.index_path().display(),
                    "persisted index does not match records, rebuilding from raw vectors"
                );
                Self::empty_index(config)
            }
            None => Self::empty_index(config),
        };

        let replay = records.vectors_from(index.len());
        if !replay.is_empty() {
            debug!(count = replay.len(), "replaying vectors into index");
            index.add(&replay)?;
        }

        Ok((
            StoreState {
                index,
                records,
                generation: header.generation,
            },
            id_map_repaired,
        ))
    }

    fn empty_index(config: &StoreConfig) -> AnnIndex {
        AnnIndex::new(config.index, config.dimension, config.metric, config.hnsw)
    }

    const fn header(&self, generation: u64) -> SnapshotHeader {
        SnapshotHeader {
            dimension: self.config.dimension,
            metric: self.config.metric,
            generation,
        }
    }

    async fn persist(&self, state: &StoreState) -> RagResult<()> {
        self.snapshots
            .write_records(&self.header(state.generation), &state.records)
            .await
    }

    /// Directory holding the snapshot files.
    pub fn path(&self) -> &Path {
        self.snapshots.root()
    }

    /// Configuration the store was opened with.
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        self.state.read().await.records.live_len()
    }

    /// Whether no live entries remain.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Tombstoned entries as a fraction of all stored entries.
    pub async fn tombstone_ratio(&self) -> f64 {
        self.state.read().await.records.tombstone_ratio()
    }

    /// Whether the tombstone ratio exceeds `rebuild_threshold`.
    pub async fn needs_rebuild(&self) -> bool {
        self.tombstone_ratio().await > self.config.rebuild_threshold
    }

    /// Rebuild while the caller holds the write lock. State is swapped only
    /// after the new snapshot is on disk.
    async fn rebuild_locked(&self, state: &mut StoreState) -> RagResult<()> {
        let records = state.records.compacted();
        let mut index = Self::empty_index(&self.config);
        index.add(&records.vectors_from(0))?;
        let generation = state.generation + 1;

        self.snapshots.write_index(generation, &index).await?;
        self.snapshots
            .write_records(&self.header(generation), &records)
            .await?;

        let purged = state.records.tombstoned();
        state.index = index;
        state.records = records;
        state.generation = generation;
        info!(purged, live = state.records.live_len(), generation, "rebuilt vector index");
        Ok(())
    }

    fn collect_hits(
        &self,
        state: &StoreState,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> RagResult<Vec<SearchHit>> {
        let total = state.index.len();
        let margin = self.config.search_margin.max(state.records.tombstoned());
        let mut fetch = (k + margin).min(total);

        loop {
            let hits: Vec<SearchHit> = state
                .index
                .search(query, fetch)?
                .into_iter()
                .filter_map(|n| {
                    let (id, record) = state.records.live_at(n.position)?;
                    filter
                        .is_none_or(|f| f.matches(&record.metadata))
                        .then(|| SearchHit {
                            id,
                            score: self.config.metric.score(n.distance),
                            metadata: record.metadata.clone(),
                        })
                })
                .take(k)
                .collect();

            if hits.len() >= k || fetch >= total {
                return Ok(hits);
            }
            fetch = (fetch * 2).min(total);
        }
    }
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    #[instrument(skip_all, fields(count = vectors.len()))]
    async fn add(&self, vectors: Vec<Vec<f32>>, metadata: Vec<Metadata>) -> RagResult<Vec<Uuid>> {
        if vectors.len() != metadata.len() {
            return Err(RagError::DimensionMismatch {
                field: "metadata_list",
                expected: vectors.len(),
                actual: metadata.len(),
            });
        }
        for vector in &vectors {
            check_vector(self.config.dimension, vector)?;
        }
        if vectors.is_empty() {
            return Ok(Vec::new());
        }

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let base = state.records.len();
        state.index.add(&vectors)?;

        let created_at = Utc::now();
        let ids: Vec<Uuid> = vectors
            .into_iter()
            .zip(metadata)
            .map(|(vector, metadata)| {
                let id = Uuid::new_v4();
                state.records.put(id, vector, metadata, created_at);
                id
            })
            .collect();

        if let Err(err) = self.persist(state).await {
            state.index.truncate(base);
            state.records.truncate(base);
            warn!(count = ids.len(), "add rolled back after snapshot failure");
            return Err(err);
        }

        debug!(count = ids.len(), live = state.records.live_len(), "added entries");
        Ok(ids)
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> RagResult<Vec<SearchHit>> {
        check_vector(self.config.dimension, query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let state = self.state.read().await;
        if state.records.live_len() == 0 {
            return Ok(Vec::new());
        }
        let hits = self.collect_hits(&state, query, k, filter)?;
        debug!(k, returned = hits.len(), filtered = filter.is_some(), "searched local store");
        Ok(hits)
    }

    async fn delete(&self, id: Uuid) -> RagResult<bool> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        if !state.records.delete(id) {
            return Ok(false);
        }

        if let Err(err) = self.persist(state).await {
            state.records.restore(id);
            warn!(%id, "delete rolled back after snapshot failure");
            return Err(err);
        }
        debug!(%id, "tombstoned entry");

        if self.config.auto_rebuild
            && state.records.tombstone_ratio() > self.config.rebuild_threshold
        {
            // The delete itself is durable; a failed compaction is retried later.
            if let Err(err) = self.rebuild_locked(state).await {
                warn!(error = %err, "automatic rebuild failed");
            }
        }
        Ok(true)
    }

    async fn get(&self, id: Uuid) -> RagResult<Option<Entry>> {
        let state = self.state.read().await;
        Ok(state.records.get(id).map(|record| record.to_entry(id)))
    }

    async fn rebuild(&self) -> RagResult<()> {
        let mut guard = self.state.write().await;
        self.rebuild_locked(&mut guard).await
    }

    async fn stats(&self) -> RagResult<StoreStats> {
        let state = self.state.read().await;
        Ok(StoreStats {
            backend: "local".to_string(),
            dimension: self.config.dimension,
            metric: self.config.metric,
            index: Some(state.index.kind()),
            total: state.records.len(),
            live: state.records.live_len(),
            tombstoned: state.records.tombstoned(),
        })
    }
}
