//! Storage error types.
//!
//! Every adapter operation fails with exactly one of these kinds; callers match on the
//! variant, the message is for humans.

use thiserror::Error;

/// Errors that can occur when using storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database could not be opened or its schema upgrade failed.
    #[error("Failed to open database: {0}")]
    Open(String),
    /// Operation issued before a successful `init`.
    #[error("Database not initialized")]
    NotInitialized,
    #[error("Unique constraint violated: {collection}.{index} already has key '{key}'")]
    UniqueConstraint {
        collection: String,
        index: String,
        key: String,
    },
    /// Engine-level failure during a read or write.
    #[error("Transaction failed: {0}")]
    Transaction(String),
}
