//! Adapters for external systems: `SQLite`, HTTP model providers.

pub mod embeddings;
pub mod factory;
pub mod generation;
pub mod http;
pub mod sqlite;
