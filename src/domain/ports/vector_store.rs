//! Vector store port.
//!
//! Both the file-persisted local store and the `SQLite` store implement this
//! contract, so the retrieval pipeline never knows which one it talks to.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::RagResult;
use crate::domain::models::{Entry, Metadata, SearchFilter, SearchHit, StoreStats};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Dimension every stored and queried vector must have.
    fn dimension(&self) -> usize;

    /// Add a batch of vectors with one metadata map each.
    ///
    /// # Returns
    /// * One freshly allocated id per vector, in input order
    ///
    /// # Errors
    /// `DimensionMismatch` when the batch lengths differ or any vector has
    /// the wrong dimension; nothing is stored in that case.
    async fn add(&self, vectors: Vec<Vec<f32>>, metadata: Vec<Metadata>) -> RagResult<Vec<Uuid>>;

    /// Return at most `k` live entries closest to `query`, best first.
    ///
    /// Ties are broken by insertion order. Fewer than `k` live matches is
    /// not an error.
    async fn search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> RagResult<Vec<SearchHit>>;

    /// Tombstone an entry. `false` when the id is unknown or already deleted.
    async fn delete(&self, id: Uuid) -> RagResult<bool>;

    /// Fetch a live entry.
    async fn get(&self, id: Uuid) -> RagResult<Option<Entry>>;

    /// Purge tombstones and rebuild the search structure from live entries.
    async fn rebuild(&self) -> RagResult<()>;

    async fn stats(&self) -> RagResult<StoreStats>;
}
