//! Storage adapter: lifecycle of the database handle and the typed CRUD operations.
//!
//! Every CRUD operation is exactly one request run through [`StorageAdapter::perform_transaction`]:
//! one collection, one request, no retries. External: SQLite via sqlx; callers construct the
//! adapter, `init` it once, then share it by reference.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use companion_core::{ChatMessage, User};
use tracing::{debug, info, instrument, warn};

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::schema;
use crate::sqlite_pool::SqlitePoolManager;
use crate::transaction::{
    Collection, GetAllByIndex, GetByIndex, Put, RequestError, StoreRequest, TransactionMode,
};

/// Observable lifecycle state of a [`StorageAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterState {
    Uninitialized,
    Initializing,
    Ready,
    /// The connection was lost or closed; the adapter must be rebuilt.
    Failed(String),
}

enum Lifecycle {
    Uninitialized,
    Initializing,
    Ready(SqlitePoolManager),
    Failed(String),
}

pub struct StorageAdapter {
    config: StorageConfig,
    state: RwLock<Lifecycle>,
}

impl StorageAdapter {
    /// Creates an uninitialized adapter; nothing is opened until [`init`](Self::init).
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            state: RwLock::new(Lifecycle::Uninitialized),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn state(&self) -> AdapterState {
        match &*self.read_state() {
            Lifecycle::Uninitialized => AdapterState::Uninitialized,
            Lifecycle::Initializing => AdapterState::Initializing,
            Lifecycle::Ready(_) => AdapterState::Ready,
            Lifecycle::Failed(reason) => AdapterState::Failed(reason.clone()),
        }
    }

    /// Opens the database and creates the collections on first use.
    ///
    /// A no-op once ready. On failure, or if the future is dropped before completing, the
    /// adapter goes back to uninitialized.
    pub async fn init(&self) -> Result<(), StorageError> {
        {
            let mut state = self.write_state();
            match &*state {
                Lifecycle::Ready(_) => return Ok(()),
                Lifecycle::Initializing => {
                    return Err(StorageError::Open(
                        "initialization already in progress".to_string(),
                    ))
                }
                Lifecycle::Failed(reason) => {
                    return Err(StorageError::Open(format!(
                        "adapter failed ({}); construct a new one",
                        reason
                    )))
                }
                Lifecycle::Uninitialized => {}
            }
            *state = Lifecycle::Initializing;
        }
        let mut pending = PendingInit {
            adapter: self,
            armed: true,
        };

        info!(
            path = %self.config.database_path().display(),
            version = self.config.version,
            "Opening database"
        );

        match schema::open(&self.config).await {
            Ok(pool_manager) => {
                pending.armed = false;
                *self.write_state() = Lifecycle::Ready(pool_manager);
                info!("Database ready");
                Ok(())
            }
            Err(e) => {
                drop(pending);
                warn!(error = %e, "Failed to open database");
                Err(e)
            }
        }
    }

    /// Closes the database handle. The adapter ends in [`AdapterState::Failed`]; a no-op
    /// unless ready.
    pub async fn close(&self) {
        let pool_manager = {
            let mut state = self.write_state();
            match std::mem::replace(&mut *state, Lifecycle::Failed("database closed".to_string()))
            {
                Lifecycle::Ready(pool_manager) => pool_manager,
                previous => {
                    *state = previous;
                    return;
                }
            }
        };
        pool_manager.close().await;
        info!("Database closed");
    }

    /// Inserts the user or overwrites the one with the same id.
    ///
    /// Fails with [`StorageError::UniqueConstraint`] if another user already has the username.
    pub async fn save_user(&self, user: &User) -> Result<(), StorageError> {
        self.perform_transaction(Collection::Users, TransactionMode::ReadWrite, Put::new(user))
            .await?;
        info!("Saved user: id={}, username={}", user.id, user.username);
        Ok(())
    }

    /// Looks a user up by username; `Ok(None)` when nobody has it.
    pub async fn get_user(&self, username: &str) -> Result<Option<User>, StorageError> {
        let user = self
            .perform_transaction(
                Collection::Users,
                TransactionMode::ReadOnly,
                GetByIndex::<User>::new(username),
            )
            .await?;
        debug!(username, found = user.is_some(), "Looked up user");
        Ok(user)
    }

    /// Inserts the message or overwrites the one with the same id.
    pub async fn save_message(&self, message: &ChatMessage) -> Result<(), StorageError> {
        self.perform_transaction(
            Collection::Messages,
            TransactionMode::ReadWrite,
            Put::new(message),
        )
        .await?;
        info!(
            "Saved message: id={}, user_id={}",
            message.id, message.user_id
        );
        Ok(())
    }

    /// All messages of `user_id`, oldest first. Equal timestamps keep id order.
    pub async fn get_chat_history(&self, user_id: &str) -> Result<Vec<ChatMessage>, StorageError> {
        let mut messages = self
            .perform_transaction(
                Collection::Messages,
                TransactionMode::ReadOnly,
                GetAllByIndex::<ChatMessage>::new(user_id),
            )
            .await?;
        messages.sort_by_key(|message| message.timestamp);

        info!(
            "Retrieved {} messages for user {}",
            messages.len(),
            user_id
        );
        Ok(messages)
    }

    /// Runs one request in one transaction scoped to `collection`.
    ///
    /// Commits on success, rolls back on failure. Writing requests are refused in
    /// [`TransactionMode::ReadOnly`] before reaching the engine.
    #[instrument(skip_all, fields(collection = %collection, mode = %mode))]
    pub(crate) async fn perform_transaction<Q: StoreRequest>(
        &self,
        collection: Collection,
        mode: TransactionMode,
        request: Q,
    ) -> Result<Q::Output, StorageError> {
        let pool_manager = self.ready_pool()?;

        if Q::WRITES && mode == TransactionMode::ReadOnly {
            return Err(StorageError::Transaction(format!(
                "write request on '{}' in a readonly transaction",
                collection
            )));
        }

        let mut tx = pool_manager
            .pool()
            .begin()
            .await
            .map_err(|e| self.engine_failure(e))?;

        match request.execute(collection, &mut *tx).await {
            Ok(output) => {
                tx.commit().await.map_err(|e| self.engine_failure(e))?;
                Ok(output)
            }
            Err(e) => {
                if let Err(rollback_error) = tx.rollback().await {
                    warn!(error = %rollback_error, "Rollback failed");
                }
                Err(self.request_failure(collection, e))
            }
        }
    }

    fn ready_pool(&self) -> Result<SqlitePoolManager, StorageError> {
        match &*self.read_state() {
            Lifecycle::Ready(pool_manager) => Ok(pool_manager.clone()),
            Lifecycle::Uninitialized | Lifecycle::Initializing => Err(StorageError::NotInitialized),
            Lifecycle::Failed(reason) => Err(StorageError::Transaction(format!(
                "connection lost: {}",
                reason
            ))),
        }
    }

    fn request_failure(&self, collection: Collection, error: RequestError) -> StorageError {
        match error {
            RequestError::Engine(e) => self.engine_failure(e),
            RequestError::UniqueViolation { key } => StorageError::UniqueConstraint {
                collection: collection.name().to_string(),
                index: collection.index().name.to_string(),
                key,
            },
            e => StorageError::Transaction(e.to_string()),
        }
    }

    /// Maps an engine error; a lost connection moves the adapter to `Failed`.
    fn engine_failure(&self, error: sqlx::Error) -> StorageError {
        let connection_lost = matches!(
            error,
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed
        );
        if connection_lost {
            let mut state = self.write_state();
            if matches!(*state, Lifecycle::Ready(_)) {
                warn!(error = %error, "Database connection lost");
                *state = Lifecycle::Failed(error.to_string());
            }
        }
        StorageError::Transaction(error.to_string())
    }

    #[cfg(test)]
    pub(crate) fn pool_manager(&self) -> Option<SqlitePoolManager> {
        match &*self.read_state() {
            Lifecycle::Ready(pool_manager) => Some(pool_manager.clone()),
            _ => None,
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, Lifecycle> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, Lifecycle> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the adapter to `Uninitialized` unless disarmed, so a failed or dropped `init`
/// does not leave it stuck in `Initializing`.
struct PendingInit<'a> {
    adapter: &'a StorageAdapter,
    armed: bool,
}

impl Drop for PendingInit<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.adapter.write_state();
        if matches!(*state, Lifecycle::Initializing) {
            *state = Lifecycle::Uninitialized;
        }
    }
}
