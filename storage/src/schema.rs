//! Versioned schema: opening the database and the one-time upgrade that creates the
//! collections and their indexes.

use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::sqlite_pool::SqlitePoolManager;
use crate::transaction::Collection;

/// Default database name.
pub const DB_NAME: &str = "AuraCompanionDB";
/// Schema version this crate creates.
pub const DB_VERSION: u32 = 1;

/// Opens the database described by `config`, upgrading it to `config.version` if it is
/// older. Reading the stored version, creating missing collections, and recording the
/// new version commit together or not at all.
pub async fn open(config: &StorageConfig) -> Result<SqlitePoolManager, StorageError> {
    config.validate()?;

    let path = config.database_path();
    let pool_manager = SqlitePoolManager::new(&path)
        .await
        .map_err(|e| StorageError::Open(format!("{}: {}", path.display(), e)))?;

    if let Err(e) = upgrade(&pool_manager, config.version).await {
        pool_manager.close().await;
        return Err(e);
    }

    Ok(pool_manager)
}

async fn upgrade(pool_manager: &SqlitePoolManager, requested: u32) -> Result<(), StorageError> {
    let mut conn = pool_manager.pool().acquire().await.map_err(open_error)?;

    // IMMEDIATE takes the write lock up front, so a concurrent opener waits on the busy
    // timeout instead of failing on the read-to-write lock upgrade.
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *conn)
        .await
        .map_err(open_error)?;

    match migrate(&mut conn, requested).await {
        Ok(()) => {
            sqlx::query("COMMIT")
                .execute(&mut *conn)
                .await
                .map_err(open_error)?;
            Ok(())
        }
        Err(e) => {
            let rollback = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            if let Err(rollback_error) = rollback {
                warn!(error = %rollback_error, "Rollback of schema upgrade failed");
                conn.detach();
            }
            Err(e)
        }
    }
}

fn open_error(e: sqlx::Error) -> StorageError {
    StorageError::Open(format!("schema upgrade failed: {}", e))
}

/// Brings the schema from the stored version up to `requested`; runs inside the upgrade
/// transaction.
async fn migrate(conn: &mut SqliteConnection, requested: u32) -> Result<(), StorageError> {
    let stored: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(&mut *conn)
        .await
        .map_err(open_error)?;
    let requested_version = i64::from(requested);

    if stored > requested_version {
        warn!(stored, requested, "Refusing to open database at a lower version");
        return Err(StorageError::Open(format!(
            "requested version {} is lower than stored version {}",
            requested, stored
        )));
    }

    if stored == requested_version {
        info!(version = stored, "Database schema up to date");
        return Ok(());
    }

    info!(from = stored, to = requested, "Upgrading database schema");
    for collection in Collection::ALL {
        create_collection(&mut *conn, collection)
            .await
            .map_err(open_error)?;
    }

    // PRAGMA does not accept bound parameters; the value is a u32.
    sqlx::query(&format!("PRAGMA user_version = {}", requested))
        .execute(&mut *conn)
        .await
        .map_err(open_error)?;

    info!(version = requested, "Database schema upgraded");
    Ok(())
}

/// Creates the collection table and its secondary index unless they already exist.
async fn create_collection(
    conn: &mut SqliteConnection,
    collection: Collection,
) -> Result<(), sqlx::Error> {
    let index = collection.index();
    let table = collection.name();

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
            id TEXT PRIMARY KEY NOT NULL, \
            {column} TEXT NOT NULL, \
            value TEXT NOT NULL\
        )",
        table = table,
        column = index.column,
    ))
    .execute(&mut *conn)
    .await?;

    sqlx::query(&format!(
        "CREATE {unique}INDEX IF NOT EXISTS idx_{table}_{column} ON {table}({column})",
        unique = if index.unique { "UNIQUE " } else { "" },
        table = table,
        column = index.column,
    ))
    .execute(&mut *conn)
    .await?;

    Ok(())
}
