//! Collections, access modes, and the single-request units of work run inside one
//! transaction.
//!
//! Each collection is a table `(id TEXT PRIMARY KEY, <index column> TEXT, value TEXT)`
//! where `value` is the record's JSON document. Requests only ever touch the collection
//! they are executed against.

use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::SqliteConnection;
use thiserror::Error;

use crate::record::StoredRecord;

/// Secondary index of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    /// Index name as seen by callers (the record field it covers).
    pub name: &'static str,
    /// Table column holding the indexed value.
    pub column: &'static str,
    pub unique: bool,
}

/// The record collections of the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Messages,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Users, Collection::Messages];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Messages => "messages",
        }
    }

    pub fn index(self) -> IndexSpec {
        match self {
            Collection::Users => IndexSpec {
                name: "username",
                column: "username",
                unique: true,
            },
            Collection::Messages => IndexSpec {
                name: "userId",
                column: "user_id",
                unique: false,
            },
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Access mode of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionMode::ReadOnly => f.write_str("readonly"),
            TransactionMode::ReadWrite => f.write_str("readwrite"),
        }
    }
}

/// Failure of a single request, before it is mapped to a [`StorageError`](crate::StorageError).
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("{0}")]
    Engine(#[from] sqlx::Error),
    #[error("invalid stored document: {0}")]
    Data(#[from] serde_json::Error),
    #[error("index key '{key}' already taken")]
    UniqueViolation { key: String },
    #[error("extra field '{field}' shadows a typed field of '{collection}'")]
    ShadowedField {
        collection: Collection,
        field: &'static str,
    },
    #[error("record belongs to '{expected}', not '{actual}'")]
    WrongCollection {
        expected: Collection,
        actual: Collection,
    },
}

/// One engine request, executed on the connection of an open transaction.
#[async_trait]
pub trait StoreRequest: Send {
    type Output: Send;

    /// Whether the request modifies the collection; such requests need
    /// [`TransactionMode::ReadWrite`].
    const WRITES: bool;

    async fn execute(
        self,
        collection: Collection,
        conn: &mut SqliteConnection,
    ) -> Result<Self::Output, RequestError>;
}

fn ensure_collection<R: StoredRecord>(collection: Collection) -> Result<(), RequestError> {
    if R::COLLECTION != collection {
        return Err(RequestError::WrongCollection {
            expected: R::COLLECTION,
            actual: collection,
        });
    }
    Ok(())
}

/// Inserts the record, or overwrites the one with the same primary key.
pub struct Put<'a, R> {
    record: &'a R,
}

impl<'a, R: StoredRecord> Put<'a, R> {
    pub fn new(record: &'a R) -> Self {
        Self { record }
    }
}

#[async_trait]
impl<'a, R: StoredRecord> StoreRequest for Put<'a, R> {
    type Output = ();
    const WRITES: bool = true;

    async fn execute(
        self,
        collection: Collection,
        conn: &mut SqliteConnection,
    ) -> Result<(), RequestError> {
        ensure_collection::<R>(collection)?;
        // A duplicate key would serialize fine but never deserialize again.
        if let Some(field) = self.record.shadowed_field() {
            return Err(RequestError::ShadowedField { collection, field });
        }
        let value = serde_json::to_string(self.record)?;
        let column = collection.index().column;
        let index_key = self.record.index_key();

        let sql = format!(
            "INSERT INTO {table} (id, {column}, value) VALUES (?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET {column} = excluded.{column}, value = excluded.value",
            table = collection.name(),
            column = column,
        );

        sqlx::query(&sql)
            .bind(self.record.primary_key())
            .bind(index_key)
            .bind(&value)
            .execute(conn)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    RequestError::UniqueViolation {
                        key: index_key.to_string(),
                    }
                }
                e => RequestError::Engine(e),
            })?;

        Ok(())
    }
}

/// First record whose index value equals `key`, in primary-key order.
pub struct GetByIndex<R> {
    key: String,
    _record: PhantomData<fn() -> R>,
}

impl<R: StoredRecord> GetByIndex<R> {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            _record: PhantomData,
        }
    }
}

#[async_trait]
impl<R: StoredRecord> StoreRequest for GetByIndex<R> {
    type Output = Option<R>;
    const WRITES: bool = false;

    async fn execute(
        self,
        collection: Collection,
        conn: &mut SqliteConnection,
    ) -> Result<Option<R>, RequestError> {
        ensure_collection::<R>(collection)?;
        let sql = format!(
            "SELECT value FROM {} WHERE {} = ? ORDER BY id LIMIT 1",
            collection.name(),
            collection.index().column
        );

        let value: Option<String> = sqlx::query_scalar(&sql)
            .bind(&self.key)
            .fetch_optional(conn)
            .await?;

        match value {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }
}

/// Every record whose index value equals `key`, in primary-key order.
pub struct GetAllByIndex<R> {
    key: String,
    _record: PhantomData<fn() -> R>,
}

impl<R: StoredRecord> GetAllByIndex<R> {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            _record: PhantomData,
        }
    }
}

#[async_trait]
impl<R: StoredRecord> StoreRequest for GetAllByIndex<R> {
    type Output = Vec<R>;
    const WRITES: bool = false;

    async fn execute(
        self,
        collection: Collection,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<R>, RequestError> {
        ensure_collection::<R>(collection)?;
        let sql = format!(
            "SELECT value FROM {} WHERE {} = ? ORDER BY id",
            collection.name(),
            collection.index().column
        );

        let values: Vec<String> = sqlx::query_scalar(&sql)
            .bind(&self.key)
            .fetch_all(conn)
            .await?;

        values
            .iter()
            .map(|value| serde_json::from_str(value).map_err(RequestError::from))
            .collect()
    }
}
