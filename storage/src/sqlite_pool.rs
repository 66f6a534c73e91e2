//! SQLite connection pool wrapper for the storage crate.

use std::path::Path;

use log::info;
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};

/// Manages the single SQLite pool backing one database file; creates the file if missing.
#[derive(Clone)]
pub struct SqlitePoolManager {
    pool: SqlitePool,
}

impl SqlitePoolManager {
    /// Creates a pool for the database file at `path`.
    pub async fn new(path: &Path) -> Result<Self, sqlx::Error> {
        info!("Initializing SQLite pool: {}", path.display());

        let options = SqliteConnectOptions::new()
            .create_if_missing(true)
            .filename(path);

        let pool = SqlitePool::connect_with(options).await?;

        Ok(Self { pool })
    }

    /// Returns the underlying pool for running queries.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every connection; later acquires fail with `PoolClosed`.
    pub async fn close(&self) {
        info!("Closing SQLite pool");
        self.pool.close().await;
    }
}
