//! SQLite adapters: connection pool, schema migrations and the vector store.

pub mod connection;
pub mod migrations;
pub mod vector_store;

pub use connection::{create_pool, create_test_pool, ConnectionError};
pub use migrations::{all_embedded_migrations, run_migrations, Migration, MigrationError};
pub use vector_store::SqliteVectorStore;
