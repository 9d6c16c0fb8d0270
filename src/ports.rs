//! Storage ports. Services depend on these traits; `adapters` provides the
//! Postgres and in-memory implementations.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    AssetRecord, IncomingTransaction, OutgoingTransaction, TransactionStatus, UserDirectoryEntry,
    WatchedAccount,
};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Ingestion progress per watched account.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get_cursor(&self, account_id: &str) -> RepositoryResult<Option<String>>;

    /// Moves the cursor from `expected` to `next`. Returns `false` without
    /// writing when the stored cursor no longer equals `expected`.
    async fn advance_cursor(
        &self,
        account_id: &str,
        expected: Option<&str>,
        next: &str,
    ) -> RepositoryResult<bool>;
}

#[async_trait]
pub trait WatchedAccountRepository: Send + Sync {
    async fn list(&self) -> RepositoryResult<Vec<WatchedAccount>>;

    async fn get_default(&self, network: &str) -> RepositoryResult<Option<WatchedAccount>>;

    /// Inserts or updates configuration fields. Never touches the cursor.
    async fn upsert(&self, account: &WatchedAccount) -> RepositoryResult<WatchedAccount>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_or_create(&self, user_id: &str, account_id: &str)
        -> RepositoryResult<UserDirectoryEntry>;

    async fn find_by_account_id(&self, account_id: &str)
        -> RepositoryResult<Option<UserDirectoryEntry>>;
}

#[async_trait]
pub trait AssetRepository: Send + Sync {
    async fn find(&self, code: &str, account_id: &str) -> RepositoryResult<Option<AssetRecord>>;

    /// Returns the stored record and whether this call created it.
    async fn insert_if_absent(&self, asset: &AssetRecord) -> RepositoryResult<(AssetRecord, bool)>;
}

#[async_trait]
pub trait IncomingTransactionRepository: Send + Sync {
    /// Returns `None` when a record with the same `external_id` already exists.
    async fn insert_if_absent(
        &self,
        tx: &IncomingTransaction,
    ) -> RepositoryResult<Option<IncomingTransaction>>;

    async fn get_by_external_id(&self, external_id: &str)
        -> RepositoryResult<Option<IncomingTransaction>>;

    async fn update_status(
        &self,
        external_id: &str,
        status: TransactionStatus,
    ) -> RepositoryResult<IncomingTransaction>;

    async fn set_platform_code(&self, external_id: &str, code: &str) -> RepositoryResult<()>;

    /// Reportable records the platform has not yet assigned a code to,
    /// oldest first.
    async fn list_unsynced(&self, limit: i64) -> RepositoryResult<Vec<IncomingTransaction>>;
}

#[async_trait]
pub trait OutgoingTransactionRepository: Send + Sync {
    /// Returns the stored record and whether this call created it.
    async fn insert_if_absent(
        &self,
        tx: &OutgoingTransaction,
    ) -> RepositoryResult<(OutgoingTransaction, bool)>;

    async fn get(&self, tx_code: &str) -> RepositoryResult<Option<OutgoingTransaction>>;

    async fn update_status(
        &self,
        tx_code: &str,
        status: TransactionStatus,
    ) -> RepositoryResult<OutgoingTransaction>;

    /// Takes a pending send for execution. Returns `false` when the record
    /// is no longer pending or another worker already claimed it.
    async fn claim(&self, tx_code: &str) -> RepositoryResult<bool>;

    /// Pending sends nobody has claimed yet, oldest first.
    async fn list_pending(&self) -> RepositoryResult<Vec<OutgoingTransaction>>;

    /// Flags the record as reported. Returns `false` if it already was.
    async fn mark_reported(&self, tx_code: &str) -> RepositoryResult<bool>;
}
