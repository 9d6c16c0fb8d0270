pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

use sqlx::PgPool;
use std::sync::Arc;

use crate::ports::{
    AssetRepository, CursorStore, IncomingTransactionRepository, OutgoingTransactionRepository,
    UserDirectory, WatchedAccountRepository,
};

/// Every storage port, backed by one store.
#[derive(Clone)]
pub struct Storage {
    pub cursors: Arc<dyn CursorStore>,
    pub accounts: Arc<dyn WatchedAccountRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub assets: Arc<dyn AssetRepository>,
    pub incoming: Arc<dyn IncomingTransactionRepository>,
    pub outgoing: Arc<dyn OutgoingTransactionRepository>,
}

impl Storage {
    pub fn postgres(pool: PgPool) -> Self {
        Self::from_store(Arc::new(PostgresStore::new(pool)))
    }

    pub fn in_memory() -> Self {
        Self::from_store(Arc::new(InMemoryStore::new()))
    }

    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: CursorStore
            + WatchedAccountRepository
            + UserDirectory
            + AssetRepository
            + IncomingTransactionRepository
            + OutgoingTransactionRepository
            + 'static,
    {
        Self {
            cursors: store.clone(),
            accounts: store.clone(),
            users: store.clone(),
            assets: store.clone(),
            incoming: store.clone(),
            outgoing: store,
        }
    }
}
