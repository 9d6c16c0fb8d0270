use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A non-native asset the sending account holds a trust line for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: Uuid,
    pub code: String,
    /// Issuer as the operator supplied it: raw address, federation address or anchor domain.
    pub issuer: String,
    /// Canonical issuing account on the ledger.
    pub account_id: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AssetRecord {
    pub fn new(
        code: impl Into<String>,
        issuer: impl Into<String>,
        account_id: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            issuer: issuer.into(),
            account_id: account_id.into(),
            metadata,
            created_at: Utc::now(),
        }
    }
}
