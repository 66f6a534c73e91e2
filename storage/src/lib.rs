//! Storage crate: typed persistence of user profiles and chat messages in a local,
//! versioned SQLite database.
//!
//! ## Modules
//!
//! - [`error`] – Storage error types
//! - [`config`] – StorageConfig
//! - [`schema`] – Versioned open and collection setup
//! - [`transaction`] – Collections, access modes, single-request units of work
//! - [`record`] – StoredRecord binding for User and ChatMessage
//! - [`adapter`] – StorageAdapter (lifecycle and CRUD)
//! - [`sqlite_pool`] – SqlitePoolManager

mod adapter;
mod config;
mod error;
mod record;
mod schema;
mod sqlite_pool;
mod transaction;

#[cfg(test)]
mod adapter_test;

pub use adapter::{AdapterState, StorageAdapter};
pub use companion_core::{ChatMessage, User};
pub use config::StorageConfig;
pub use error::StorageError;
pub use record::StoredRecord;
pub use schema::{DB_NAME, DB_VERSION};
pub use sqlite_pool::SqlitePoolManager;
pub use transaction::{Collection, IndexSpec, TransactionMode};
