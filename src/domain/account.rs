//! Accounts the adapter watches on the ledger and the user directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A ledger account monitored for incoming payments. Accounts carrying a
/// secret can also sign outgoing transactions.
#[derive(Clone, Serialize, Deserialize)]
pub struct WatchedAccount {
    pub account_id: String,
    pub name: String,
    pub network: String,
    #[serde(skip_serializing, default)]
    pub secret: Option<String>,
    /// Paging token of the last processed payment.
    pub cursor: Option<String>,
    pub is_default: bool,
}

impl WatchedAccount {
    pub fn new(account_id: impl Into<String>, name: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            name: name.into(),
            network: network.into(),
            secret: None,
            cursor: None,
            is_default: false,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn can_send(&self) -> bool {
        self.secret.as_deref().is_some_and(|s| !s.is_empty())
    }
}

impl fmt::Debug for WatchedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchedAccount")
            .field("account_id", &self.account_id)
            .field("name", &self.name)
            .field("network", &self.network)
            .field("secret", &self.secret.as_ref().map(|_| "***"))
            .field("cursor", &self.cursor)
            .field("is_default", &self.is_default)
            .finish()
    }
}

/// Maps a platform user to the federated deposit address they receive on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDirectoryEntry {
    pub user_id: String,
    pub account_id: String,
    pub created_at: DateTime<Utc>,
}

impl UserDirectoryEntry {
    pub fn new(user_id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            account_id: account_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Builds the deposit address `username*domain`. The memo on an incoming
/// payment is the username part.
pub fn deposit_account_id(username: &str, wallet_domain: &str) -> String {
    format!("{}*{}", username, wallet_domain)
}
