//! Unit tests for StorageAdapter.
//!
//! Covers the lifecycle state machine and the transaction helper's mode and collection checks.

use tempfile::TempDir;

use crate::adapter::{AdapterState, StorageAdapter};
use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::transaction::{Collection, GetByIndex, Put, TransactionMode};
use companion_core::{ChatMessage, User};

async fn ready_adapter(dir: &TempDir) -> StorageAdapter {
    let adapter = StorageAdapter::new(StorageConfig::in_dir(dir.path()));
    adapter.init().await.expect("Failed to init adapter");
    adapter
}

#[tokio::test]
async fn test_state_moves_from_uninitialized_to_ready() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let adapter = StorageAdapter::new(StorageConfig::in_dir(dir.path()));

    assert_eq!(adapter.state(), AdapterState::Uninitialized);
    adapter.init().await.expect("Failed to init adapter");
    assert_eq!(adapter.state(), AdapterState::Ready);
}

#[tokio::test]
async fn test_init_twice_is_noop() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let adapter = ready_adapter(&dir).await;

    adapter
        .save_user(&User::new("a", "alice"))
        .await
        .expect("Failed to save user");
    adapter.init().await.expect("Second init should succeed");

    assert_eq!(adapter.state(), AdapterState::Ready);
    assert!(adapter.get_user("alice").await.unwrap().is_some());
}

#[tokio::test]
async fn test_failed_init_returns_to_uninitialized() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = StorageConfig {
        version: 0,
        ..StorageConfig::in_dir(dir.path())
    };
    let adapter = StorageAdapter::new(config);

    let result = adapter.init().await;
    assert!(matches!(result, Err(StorageError::Open(_))));
    assert_eq!(adapter.state(), AdapterState::Uninitialized);

    let result = adapter.get_user("alice").await;
    assert!(matches!(result, Err(StorageError::NotInitialized)));
}

#[tokio::test]
async fn test_close_moves_to_failed() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let adapter = ready_adapter(&dir).await;

    adapter.close().await;
    assert_eq!(
        adapter.state(),
        AdapterState::Failed("database closed".to_string())
    );

    let result = adapter.save_user(&User::new("a", "alice")).await;
    assert!(matches!(result, Err(StorageError::Transaction(_))));
    let result = adapter.get_chat_history("u1").await;
    assert!(matches!(result, Err(StorageError::Transaction(_))));
    let result = adapter.init().await;
    assert!(matches!(result, Err(StorageError::Open(_))));
}

#[tokio::test]
async fn test_close_before_init_is_noop() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let adapter = StorageAdapter::new(StorageConfig::in_dir(dir.path()));

    adapter.close().await;

    assert_eq!(adapter.state(), AdapterState::Uninitialized);
    adapter.init().await.expect("Init after noop close should succeed");
}

#[tokio::test]
async fn test_write_request_refused_in_readonly_transaction() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let adapter = ready_adapter(&dir).await;
    let user = User::new("a", "alice");

    let result = adapter
        .perform_transaction(Collection::Users, TransactionMode::ReadOnly, Put::new(&user))
        .await;

    assert!(matches!(result, Err(StorageError::Transaction(_))));
    assert!(adapter.get_user("alice").await.unwrap().is_none());
    assert_eq!(adapter.state(), AdapterState::Ready);
}

#[tokio::test]
async fn test_request_on_wrong_collection_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let adapter = ready_adapter(&dir).await;
    let message = ChatMessage::with_id("m1", "u1", 1);

    let result = adapter
        .perform_transaction(
            Collection::Users,
            TransactionMode::ReadWrite,
            Put::new(&message),
        )
        .await;
    assert!(matches!(result, Err(StorageError::Transaction(_))));

    let result = adapter
        .perform_transaction(
            Collection::Messages,
            TransactionMode::ReadOnly,
            GetByIndex::<User>::new("alice"),
        )
        .await;
    assert!(matches!(result, Err(StorageError::Transaction(_))));
}

#[tokio::test]
async fn test_unique_violation_names_collection_and_index() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let adapter = ready_adapter(&dir).await;

    adapter
        .save_user(&User::new("a", "alice"))
        .await
        .expect("Failed to save user");
    let result = adapter.save_user(&User::new("b", "alice")).await;

    match result {
        Err(StorageError::UniqueConstraint {
            collection,
            index,
            key,
        }) => {
            assert_eq!(collection, "users");
            assert_eq!(index, "username");
            assert_eq!(key, "alice");
        }
        other => panic!("expected UniqueConstraint, got {:?}", other),
    }
    assert_eq!(adapter.state(), AdapterState::Ready);
}

#[tokio::test]
async fn test_lost_connection_moves_to_failed() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let adapter = ready_adapter(&dir).await;

    // Close the pool behind the adapter's back; the state still says Ready.
    adapter
        .pool_manager()
        .expect("Adapter should be ready")
        .close()
        .await;
    assert_eq!(adapter.state(), AdapterState::Ready);

    let result = adapter.get_user("alice").await;
    assert!(matches!(result, Err(StorageError::Transaction(_))));
    assert!(matches!(adapter.state(), AdapterState::Failed(_)));

    let result = adapter.save_message(&ChatMessage::new("u1")).await;
    assert!(matches!(result, Err(StorageError::Transaction(_))));
    assert!(matches!(adapter.init().await, Err(StorageError::Open(_))));
}

#[tokio::test]
async fn test_dropped_init_returns_to_uninitialized() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let adapter = StorageAdapter::new(StorageConfig::in_dir(dir.path()));

    // Poll init once (it parks on the connection worker), then drop it.
    tokio::select! {
        biased;
        _ = adapter.init() => panic!("init should not finish on its first poll"),
        _ = std::future::ready(()) => {}
    }

    assert_eq!(adapter.state(), AdapterState::Uninitialized);
    adapter.init().await.expect("Init after a dropped init should succeed");
    assert_eq!(adapter.state(), AdapterState::Ready);
}
