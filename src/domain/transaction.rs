//! Transaction domain entities.
//! Framework-agnostic records of payments received from and sent to the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle of a transaction as reported to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    Waiting,
    Pending,
    Complete,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Waiting => "Waiting",
            TransactionStatus::Pending => "Pending",
            TransactionStatus::Complete => "Complete",
            TransactionStatus::Failed => "Failed",
        }
    }

    /// Statuses the platform accepts a receive record for.
    pub fn is_reportable(&self) -> bool {
        matches!(self, TransactionStatus::Pending | TransactionStatus::Complete)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "waiting" => Ok(TransactionStatus::Waiting),
            "pending" => Ok(TransactionStatus::Pending),
            "complete" | "completed" => Ok(TransactionStatus::Complete),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

/// A payment received on a watched account and attributed to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingTransaction {
    pub id: Uuid,
    /// Ledger operation id of the payment. Unique across all incoming
    /// records; one ledger transaction may carry several payments.
    pub external_id: String,
    pub user_id: String,
    /// Transaction code assigned by the platform once the receive is uploaded.
    pub platform_code: Option<String>,
    pub recipient: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub issuer: String,
    pub status: TransactionStatus,
    pub data: serde_json::Value,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IncomingTransaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        external_id: String,
        user_id: String,
        recipient: String,
        amount: i64,
        currency: String,
        issuer: String,
        data: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            external_id,
            user_id,
            platform_code: None,
            recipient,
            amount,
            currency,
            issuer,
            status: TransactionStatus::Pending,
            data,
            metadata: serde_json::json!({ "type": "stellar" }),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A send requested by the platform and executed against the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingTransaction {
    pub id: Uuid,
    /// Platform transaction code. Unique across all outgoing records.
    pub tx_code: String,
    pub recipient: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub issuer: Option<String>,
    pub status: TransactionStatus,
    /// Set once a worker has taken the send for execution.
    pub claimed: bool,
    /// Set once the final status has been handed to the platform.
    pub reported: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutgoingTransaction {
    pub fn new(
        tx_code: String,
        recipient: String,
        amount: i64,
        currency: String,
        issuer: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tx_code,
            recipient,
            amount,
            currency,
            issuer,
            status: TransactionStatus::Pending,
            claimed: false,
            reported: false,
            created_at: now,
            updated_at: now,
        }
    }
}
