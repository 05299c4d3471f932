//! SQLite schema migrations for the vector store tables.

use sqlx::SqlitePool;
use thiserror::Error;

use crate::domain::errors::RagError;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to execute migration {version}: {source}")]
    ExecutionError {
        version: i64,
        #[source]
        source: sqlx::Error,
    },
    #[error("Failed to get schema version: {0}")]
    VersionCheckError(#[source] sqlx::Error),
}

impl From<MigrationError> for RagError {
    fn from(err: MigrationError) -> Self {
        Self::Database(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

pub fn all_embedded_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Vector entries, links and store settings",
        sql: include_str!("../../../migrations/001_vector_store.sql"),
    }]
}

/// Apply every embedded migration newer than the recorded schema version.
///
/// # Returns
/// * Number of migrations applied
pub async fn run_migrations(pool: &SqlitePool) -> Result<usize, MigrationError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now')),
            description TEXT
        )",
    )
    .execute(pool)
    .await
    .map_err(|e| MigrationError::ExecutionError {
        version: 0,
        source: e,
    })?;

    let current: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
        .fetch_one(pool)
        .await
        .map_err(MigrationError::VersionCheckError)?;

    let pending: Vec<Migration> = all_embedded_migrations()
        .into_iter()
        .filter(|m| m.version > current)
        .collect();

    for migration in &pending {
        let exec_err = |source| MigrationError::ExecutionError {
            version: migration.version,
            source,
        };
        sqlx::raw_sql(migration.sql)
            .execute(pool)
            .await
            .map_err(exec_err)?;
        sqlx::query("INSERT INTO schema_migrations (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(pool)
            .await
            .map_err(exec_err)?;
        tracing::debug!(version = migration.version, "applied migration");
    }

    Ok(pending.len())
}
