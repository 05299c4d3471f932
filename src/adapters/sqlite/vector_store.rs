//! SQLite-backed vector store with relationship links.
//!
//! Raw vectors live in a BLOB column (little-endian `f32`), metadata as JSON.
//! Each entry is linked to the entities its metadata names (`symbol` ->
//! `ABOUT`, `market` -> `BELONGS_TO`) and more links can be added with
//! [`SqliteVectorStore::link`]. Similarity is computed in Rust over the live
//! rows, narrowed first by the link table when a relation filter is given.
//!
//! Writers are serialized by an in-process reader/writer lock, the same
//! model as the local store: `SQLite` cannot upgrade concurrent deferred
//! transactions and would fail them with `SQLITE_BUSY` instead of waiting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::connection::create_pool;
use super::migrations::run_migrations;
use crate::domain::errors::{RagError, RagResult};
use crate::domain::models::{
    DistanceMetric, Entry, Metadata, Relation, SearchFilter, SearchHit, StoreConfig, StoreStats,
};
use crate::domain::ports::VectorStore;
use crate::infrastructure::vector::index::{check_vector, distance, prepare};

/// Vector store persisted in `SQLite`.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    dimension: usize,
    metric: DistanceMetric,
    /// Held exclusively by add, delete, link and rebuild.
    lock: RwLock<()>,
}

type CandidateRow = (String, i64, Vec<u8>, String);

impl SqliteVectorStore {
    /// Open the database at `config.path`.
    pub async fn open(config: &StoreConfig) -> RagResult<Self> {
        let pool = create_pool(&config.path, 5).await?;
        let store = Self::with_pool(pool, config.dimension, config.metric).await?;
        info!(path = %config.path, dimension = config.dimension, "opened sqlite vector store");
        Ok(store)
    }

    /// Wrap an existing pool, applying migrations and pinning the
    /// dimension and metric on first use.
    ///
    /// # Errors
    /// `Config` when the database was created with another dimension or metric.
    pub async fn with_pool(
        pool: SqlitePool,
        dimension: usize,
        metric: DistanceMetric,
    ) -> RagResult<Self> {
        if dimension == 0 {
            return Err(RagError::Config("store.dimension must be greater than 0".into()));
        }
        run_migrations(&pool).await?;

        sqlx::query("INSERT OR IGNORE INTO vector_store_meta (key, value) VALUES ('dimension', ?), ('metric', ?)")
            .bind(dimension.to_string())
            .bind(metric.as_str())
            .execute(&pool)
            .await?;

        let pinned: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM vector_store_meta WHERE key IN ('dimension', 'metric')")
                .fetch_all(&pool)
                .await?;
        for (key, value) in pinned {
            let expected = if key == "dimension" {
                dimension.to_string()
            } else {
                metric.as_str().to_string()
            };
            if value != expected {
                return Err(RagError::Config(format!(
                    "sqlite store has {key} {value}, configured {expected}"
                )));
            }
        }

        Ok(Self {
            pool,
            dimension,
            metric,
            lock: RwLock::new(()),
        })
    }

    /// Link a live entry to `target`. `false` when the entry is not live.
    pub async fn link(&self, id: Uuid, relation: &Relation, target: &str) -> RagResult<bool> {
        let _guard = self.lock.write().await;
        let result = sqlx::query(
            "INSERT OR IGNORE INTO vector_links (entry_id, relation, target)
             SELECT id, ?, ? FROM vector_entries WHERE id = ? AND deleted = 0",
        )
        .bind(relation.label())
        .bind(target)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        // Already linked counts as success for a live entry.
        Ok(self.fetch_live(id).await?.is_some())
    }

    /// All `(relation, target)` links of an entry.
    pub async fn links(&self, id: Uuid) -> RagResult<Vec<(String, String)>> {
        let _guard = self.lock.read().await;
        Ok(sqlx::query_as(
            "SELECT relation, target FROM vector_links WHERE entry_id = ? ORDER BY relation, target",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn fetch_live(&self, id: Uuid) -> RagResult<Option<Entry>> {
        let row: Option<(Vec<u8>, String, String)> = sqlx::query_as(
            "SELECT embedding, metadata, created_at FROM vector_entries WHERE id = ? AND deleted = 0",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(blob, metadata, created_at)| {
            Ok(Entry {
                id,
                vector: decode_vector(&blob)?,
                metadata: serde_json::from_str(&metadata)?,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|e| RagError::Serialization(e.to_string()))?
                    .with_timezone(&Utc),
                deleted: false,
            })
        })
        .transpose()
    }

    async fn candidates(&self, filter: Option<&SearchFilter>) -> RagResult<Vec<CandidateRow>> {
        let rows = match filter.and_then(|f| f.related_to.as_ref()) {
            Some(rel) => {
                sqlx::query_as(
                    "SELECT e.id, e.seq, e.embedding, e.metadata
                     FROM vector_entries e
                     JOIN vector_links l ON l.entry_id = e.id
                     WHERE e.deleted = 0 AND l.relation = ? AND l.target = ? COLLATE NOCASE
                     ORDER BY e.seq",
                )
                .bind(rel.relation.label())
                .bind(rel.target.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT id, seq, embedding, metadata FROM vector_entries
                     WHERE deleted = 0 ORDER BY seq",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
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
            check_vector(self.dimension, vector)?;
        }
        if vectors.is_empty() {
            return Ok(Vec::new());
        }

        let _guard = self.lock.write().await;
        let mut tx = self.pool.begin().await?;
        let mut seq: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(seq), -1) + 1 FROM vector_entries")
            .fetch_one(&mut *tx)
            .await?;
        let created_at = Utc::now().to_rfc3339();
        let mut ids = Vec::with_capacity(vectors.len());

        for (vector, metadata) in vectors.iter().zip(&metadata) {
            let id = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO vector_entries (id, seq, embedding, metadata, created_at, deleted)
                 VALUES (?, ?, ?, ?, ?, 0)",
            )
            .bind(id.to_string())
            .bind(seq)
            .bind(encode_vector(vector))
            .bind(serde_json::to_string(metadata)?)
            .bind(created_at.as_str())
            .execute(&mut *tx)
            .await?;

            for (relation, target) in Relation::derive_links(metadata) {
                sqlx::query(
                    "INSERT OR IGNORE INTO vector_links (entry_id, relation, target) VALUES (?, ?, ?)",
                )
                .bind(id.to_string())
                .bind(relation.label())
                .bind(target)
                .execute(&mut *tx)
                .await?;
            }

            ids.push(id);
            seq += 1;
        }

        tx.commit().await?;
        debug!(count = ids.len(), "added entries");
        Ok(ids)
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> RagResult<Vec<SearchHit>> {
        check_vector(self.dimension, query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let query = prepare(self.metric, query);
        let rows = {
            let _guard = self.lock.read().await;
            self.candidates(filter).await?
        };
        let mut scored = Vec::new();
        for (id, seq, blob, metadata) in rows {
            let metadata: Metadata = serde_json::from_str(&metadata)?;
            if filter.is_some_and(|f| !f.matches_metadata(&metadata)) {
                continue;
            }
            let vector = prepare(self.metric, &decode_vector(&blob)?);
            scored.push((distance(self.metric, &query, &vector), seq, id, metadata));
        }

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(distance, _, id, metadata)| {
                Ok(SearchHit {
                    id: parse_uuid(&id)?,
                    score: self.metric.score(distance),
                    metadata,
                })
            })
            .collect()
    }

    async fn delete(&self, id: Uuid) -> RagResult<bool> {
        let _guard = self.lock.write().await;
        let result = sqlx::query("UPDATE vector_entries SET deleted = 1 WHERE id = ? AND deleted = 0")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, id: Uuid) -> RagResult<Option<Entry>> {
        let _guard = self.lock.read().await;
        self.fetch_live(id).await
    }

    /// Purges tombstoned rows; their links go with them.
    async fn rebuild(&self) -> RagResult<()> {
        let _guard = self.lock.write().await;
        let purged = sqlx::query("DELETE FROM vector_entries WHERE deleted = 1")
            .execute(&self.pool)
            .await?
            .rows_affected();
        sqlx::query("VACUUM").execute(&self.pool).await?;
        info!(purged, "rebuilt sqlite vector store");
        Ok(())
    }

    async fn stats(&self) -> RagResult<StoreStats> {
        let _guard = self.lock.read().await;
        let (total, tombstoned): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(deleted), 0) FROM vector_entries",
        )
        .fetch_one(&self.pool)
        .await?;
        let total = usize::try_from(total).unwrap_or_default();
        let tombstoned = usize::try_from(tombstoned).unwrap_or_default();
        Ok(StoreStats {
            backend: "sqlite".to_string(),
            dimension: self.dimension,
            metric: self.metric,
            index: None,
            total,
            live: total.saturating_sub(tombstoned),
            tombstoned,
        })
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(blob: &[u8]) -> RagResult<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(RagError::Serialization(format!(
            "embedding blob of {} bytes is not a whole number of f32s",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn parse_uuid(s: &str) -> RagResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| RagError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_blob_round_trip() {
        let v = vec![1.5, -0.25, 0.0, f32::MAX];
        assert_eq!(decode_vector(&encode_vector(&v)).unwrap(), v);
        assert!(decode_vector(&[0, 1, 2]).is_err());
    }
}
