//! Catalog store — the durable, transactional mapping from
//! path to file identity and the per-(file, processor) parse state machine.
//!
//! All writes that combine a read with a dependent write (e.g. "upsert a
//! parse row, then decide what else becomes ready") are serialized through
//! [`CatalogStore::write_lock`], an in-process mutex. Plain reads may run
//! concurrently; SQLite's own WAL mode lets them proceed alongside a writer.

pub mod approval;
pub mod error;
pub mod files;
pub mod hashing;
pub mod parses;
pub mod processor_config;
mod schema;
pub mod settings;
pub mod types;

pub use error::{CatalogError, Result};
pub use types::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tokio::sync::Mutex;

/// The catalog store. Cloning is cheap — it's a handle over a shared pool.
#[derive(Clone)]
pub struct CatalogStore {
    pool: SqlitePool,
    write_lock: std::sync::Arc<Mutex<()>>,
}

impl CatalogStore {
    /// Open (creating if absent) the SQLite database at `path` and ensure
    /// the schema exists.
    pub async fn connect(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(CatalogError::Sqlx)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self {
            pool,
            write_lock: std::sync::Arc::new(Mutex::new(())),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Open an in-memory database. Useful for tests.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_in_memory_creates_schema() {
        let store = CatalogStore::connect_in_memory().await.unwrap();
        let files = store.list_files().await.unwrap();
        assert!(files.is_empty());
    }
}
