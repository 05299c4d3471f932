//! Vector infrastructure components
//!
//! Text chunking, the in-process nearest-neighbor indexes, the metadata
//! store with its snapshot files, and the local store that composes them.

pub mod chunker;
pub mod flat_index;
pub mod hnsw_index;
pub mod index;
pub mod local_store;
pub mod metadata_store;
pub mod snapshot;

pub use chunker::{chunk, Chunker};
pub use flat_index::FlatIndex;
pub use hnsw_index::HnswIndex;
pub use index::{AnnIndex, Neighbor, VectorIndex};
pub use local_store::LocalVectorStore;
pub use metadata_store::{EntryRecord, MetadataStore};
pub use snapshot::{SnapshotDir, SnapshotHeader};
