//! In-memory store. Backs the test suite and `--in-memory` runs.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{
    AssetRecord, IncomingTransaction, OutgoingTransaction, TransactionStatus, UserDirectoryEntry,
    WatchedAccount,
};
use crate::ports::{
    AssetRepository, CursorStore, IncomingTransactionRepository, OutgoingTransactionRepository,
    RepositoryError, RepositoryResult, UserDirectory, WatchedAccountRepository,
};

#[derive(Default)]
struct State {
    accounts: HashMap<String, WatchedAccount>,
    users: HashMap<String, UserDirectoryEntry>,
    assets: HashMap<(String, String), AssetRecord>,
    incoming: HashMap<String, IncomingTransaction>,
    outgoing: HashMap<String, OutgoingTransaction>,
}

/// A thread-safe store implementing every storage port.
///
/// All tables sit behind one `RwLock` so compare-and-set operations are
/// atomic with respect to each other.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn incoming_count(&self) -> usize {
        self.state.read().await.incoming.len()
    }

    pub async fn asset_count(&self) -> usize {
        self.state.read().await.assets.len()
    }
}

#[async_trait]
impl CursorStore for InMemoryStore {
    async fn get_cursor(&self, account_id: &str) -> RepositoryResult<Option<String>> {
        let state = self.state.read().await;
        state
            .accounts
            .get(account_id)
            .map(|account| account.cursor.clone())
            .ok_or_else(|| RepositoryError::NotFound(account_id.to_string()))
    }

    async fn advance_cursor(
        &self,
        account_id: &str,
        expected: Option<&str>,
        next: &str,
    ) -> RepositoryResult<bool> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| RepositoryError::NotFound(account_id.to_string()))?;

        if account.cursor.as_deref() != expected {
            return Ok(false);
        }
        account.cursor = Some(next.to_string());
        Ok(true)
    }
}

#[async_trait]
impl WatchedAccountRepository for InMemoryStore {
    async fn list(&self) -> RepositoryResult<Vec<WatchedAccount>> {
        let state = self.state.read().await;
        let mut accounts: Vec<_> = state.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(accounts)
    }

    async fn get_default(&self, network: &str) -> RepositoryResult<Option<WatchedAccount>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .find(|a| a.is_default && a.network == network)
            .cloned())
    }

    async fn upsert(&self, account: &WatchedAccount) -> RepositoryResult<WatchedAccount> {
        let mut state = self.state.write().await;

        if account.is_default {
            let clash = state.accounts.values().any(|existing| {
                existing.is_default
                    && existing.network == account.network
                    && existing.account_id != account.account_id
            });
            if clash {
                return Err(RepositoryError::Conflict(format!(
                    "network {} already has a default account",
                    account.network
                )));
            }
        }

        let stored = match state.accounts.get(&account.account_id) {
            Some(existing) => WatchedAccount {
                cursor: existing.cursor.clone(),
                ..account.clone()
            },
            None => account.clone(),
        };
        state
            .accounts
            .insert(stored.account_id.clone(), stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn get_or_create(
        &self,
        user_id: &str,
        account_id: &str,
    ) -> RepositoryResult<UserDirectoryEntry> {
        let mut state = self.state.write().await;
        let entry = state
            .users
            .entry(account_id.to_string())
            .or_insert_with(|| UserDirectoryEntry::new(user_id, account_id));
        Ok(entry.clone())
    }

    async fn find_by_account_id(
        &self,
        account_id: &str,
    ) -> RepositoryResult<Option<UserDirectoryEntry>> {
        Ok(self.state.read().await.users.get(account_id).cloned())
    }
}

#[async_trait]
impl AssetRepository for InMemoryStore {
    async fn find(&self, code: &str, account_id: &str) -> RepositoryResult<Option<AssetRecord>> {
        let state = self.state.read().await;
        Ok(state
            .assets
            .get(&(code.to_string(), account_id.to_string()))
            .cloned())
    }

    async fn insert_if_absent(&self, asset: &AssetRecord) -> RepositoryResult<(AssetRecord, bool)> {
        let mut state = self.state.write().await;
        let key = (asset.code.clone(), asset.account_id.clone());
        if let Some(existing) = state.assets.get(&key) {
            return Ok((existing.clone(), false));
        }
        state.assets.insert(key, asset.clone());
        Ok((asset.clone(), true))
    }
}

#[async_trait]
impl IncomingTransactionRepository for InMemoryStore {
    async fn insert_if_absent(
        &self,
        tx: &IncomingTransaction,
    ) -> RepositoryResult<Option<IncomingTransaction>> {
        let mut state = self.state.write().await;
        if state.incoming.contains_key(&tx.external_id) {
            return Ok(None);
        }
        state.incoming.insert(tx.external_id.clone(), tx.clone());
        Ok(Some(tx.clone()))
    }

    async fn get_by_external_id(
        &self,
        external_id: &str,
    ) -> RepositoryResult<Option<IncomingTransaction>> {
        Ok(self.state.read().await.incoming.get(external_id).cloned())
    }

    async fn update_status(
        &self,
        external_id: &str,
        status: TransactionStatus,
    ) -> RepositoryResult<IncomingTransaction> {
        let mut state = self.state.write().await;
        let tx = state
            .incoming
            .get_mut(external_id)
            .ok_or_else(|| RepositoryError::NotFound(external_id.to_string()))?;
        tx.status = status;
        tx.updated_at = Utc::now();
        Ok(tx.clone())
    }

    async fn set_platform_code(&self, external_id: &str, code: &str) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        let tx = state
            .incoming
            .get_mut(external_id)
            .ok_or_else(|| RepositoryError::NotFound(external_id.to_string()))?;
        tx.platform_code = Some(code.to_string());
        tx.updated_at = Utc::now();
        Ok(())
    }

    async fn list_unsynced(&self, limit: i64) -> RepositoryResult<Vec<IncomingTransaction>> {
        let state = self.state.read().await;
        let mut unsynced: Vec<_> = state
            .incoming
            .values()
            .filter(|tx| tx.platform_code.is_none() && tx.status.is_reportable())
            .cloned()
            .collect();
        unsynced.sort_by_key(|tx| tx.created_at);
        unsynced.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(unsynced)
    }
}

#[async_trait]
impl OutgoingTransactionRepository for InMemoryStore {
    async fn insert_if_absent(
        &self,
        tx: &OutgoingTransaction,
    ) -> RepositoryResult<(OutgoingTransaction, bool)> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.outgoing.get(&tx.tx_code) {
            return Ok((existing.clone(), false));
        }
        state.outgoing.insert(tx.tx_code.clone(), tx.clone());
        Ok((tx.clone(), true))
    }

    async fn get(&self, tx_code: &str) -> RepositoryResult<Option<OutgoingTransaction>> {
        Ok(self.state.read().await.outgoing.get(tx_code).cloned())
    }

    async fn update_status(
        &self,
        tx_code: &str,
        status: TransactionStatus,
    ) -> RepositoryResult<OutgoingTransaction> {
        let mut state = self.state.write().await;
        let tx = state
            .outgoing
            .get_mut(tx_code)
            .ok_or_else(|| RepositoryError::NotFound(tx_code.to_string()))?;
        tx.status = status;
        tx.updated_at = Utc::now();
        Ok(tx.clone())
    }

    async fn claim(&self, tx_code: &str) -> RepositoryResult<bool> {
        let mut state = self.state.write().await;
        let tx = state
            .outgoing
            .get_mut(tx_code)
            .ok_or_else(|| RepositoryError::NotFound(tx_code.to_string()))?;
        if tx.claimed || tx.status != TransactionStatus::Pending {
            return Ok(false);
        }
        tx.claimed = true;
        tx.updated_at = Utc::now();
        Ok(true)
    }

    async fn list_pending(&self) -> RepositoryResult<Vec<OutgoingTransaction>> {
        let state = self.state.read().await;
        let mut pending: Vec<_> = state
            .outgoing
            .values()
            .filter(|tx| tx.status == TransactionStatus::Pending && !tx.claimed)
            .cloned()
            .collect();
        pending.sort_by_key(|tx| tx.created_at);
        Ok(pending)
    }

    async fn mark_reported(&self, tx_code: &str) -> RepositoryResult<bool> {
        let mut state = self.state.write().await;
        let tx = state
            .outgoing
            .get_mut(tx_code)
            .ok_or_else(|| RepositoryError::NotFound(tx_code.to_string()))?;
        if tx.reported {
            return Ok(false);
        }
        tx.reported = true;
        Ok(true)
    }
}
