//! Transaction envelopes and signing.
//!
//! The envelope is the adapter's own structured form of a ledger
//! transaction. Encoding to the network's wire format and the signature
//! scheme live behind [`TransactionSigner`]; the ledger gateway receives the
//! signed envelope as a base64 JSON document.

use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Longest text memo the ledger accepts, in bytes.
pub const MAX_TEXT_MEMO_LEN: usize = 28;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction already carries a memo")]
    MemoAlreadySet,
    #[error("transaction has no operations")]
    NoOperations,
    #[error("invalid memo: {0}")]
    InvalidMemo(String),
    #[error("signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Memo {
    Text(String),
    Id(u64),
    Hash(String),
}

impl Memo {
    pub fn text(value: &str) -> Result<Self, TransactionError> {
        if value.len() > MAX_TEXT_MEMO_LEN {
            return Err(TransactionError::InvalidMemo(format!(
                "text memo longer than {} bytes",
                MAX_TEXT_MEMO_LEN
            )));
        }
        Ok(Memo::Text(value.to_string()))
    }

    pub fn id(value: &str) -> Result<Self, TransactionError> {
        value
            .trim()
            .parse::<u64>()
            .map(Memo::Id)
            .map_err(|_| TransactionError::InvalidMemo(format!("id memo '{}' is not a u64", value)))
    }

    /// Hash memos are 32 bytes, hex encoded.
    pub fn hash(value: &str) -> Result<Self, TransactionError> {
        let decoded = hex::decode(value.trim())
            .map_err(|_| TransactionError::InvalidMemo("hash memo is not hex".to_string()))?;
        if decoded.len() != 32 {
            return Err(TransactionError::InvalidMemo(
                "hash memo must be 32 bytes".to_string(),
            ));
        }
        Ok(Memo::Hash(value.trim().to_ascii_lowercase()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Memo::Text(_) => "text",
            Memo::Id(_) => "id",
            Memo::Hash(_) => "hash",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Asset {
    Native,
    Credit { code: String, issuer: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Payment {
        destination: String,
        asset: Asset,
        amount: String,
    },
    CreateAccount {
        destination: String,
        starting_balance: String,
    },
    ChangeTrust {
        code: String,
        issuer: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub source_account: String,
    pub network: String,
    pub memo: Option<Memo>,
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    source_account: String,
    network: String,
    memo: Option<Memo>,
    operations: Vec<Operation>,
}

impl TransactionBuilder {
    pub fn new(source_account: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            source_account: source_account.into(),
            network: network.into(),
            memo: None,
            operations: Vec::new(),
        }
    }

    /// A transaction carries at most one memo.
    pub fn add_memo(&mut self, memo: Memo) -> Result<&mut Self, TransactionError> {
        if self.memo.is_some() {
            return Err(TransactionError::MemoAlreadySet);
        }
        self.memo = Some(memo);
        Ok(self)
    }

    pub fn append_payment_op(&mut self, destination: &str, asset: Asset, amount: &str) -> &mut Self {
        self.operations.push(Operation::Payment {
            destination: destination.to_string(),
            asset,
            amount: amount.to_string(),
        });
        self
    }

    pub fn append_create_account_op(&mut self, destination: &str, starting_balance: &str) -> &mut Self {
        self.operations.push(Operation::CreateAccount {
            destination: destination.to_string(),
            starting_balance: starting_balance.to_string(),
        });
        self
    }

    pub fn append_trust_op(&mut self, code: &str, issuer: &str) -> &mut Self {
        self.operations.push(Operation::ChangeTrust {
            code: code.to_string(),
            issuer: issuer.to_string(),
        });
        self
    }

    pub fn build(self) -> Result<TransactionEnvelope, TransactionError> {
        if self.operations.is_empty() {
            return Err(TransactionError::NoOperations);
        }
        Ok(TransactionEnvelope {
            source_account: self.source_account,
            network: self.network,
            memo: self.memo,
            operations: self.operations,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub envelope: TransactionEnvelope,
    pub signature: String,
}

impl SignedTransaction {
    /// Base64 of the JSON document posted to the ledger gateway.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }
}

pub trait TransactionSigner: Send + Sync {
    fn sign(&self, envelope: TransactionEnvelope, secret: &str)
        -> Result<SignedTransaction, TransactionError>;
}

/// HMAC-SHA256 over the canonical JSON envelope, keyed by the account secret.
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacSigner;

impl TransactionSigner for HmacSigner {
    fn sign(
        &self,
        envelope: TransactionEnvelope,
        secret: &str,
    ) -> Result<SignedTransaction, TransactionError> {
        let payload =
            serde_json::to_vec(&envelope).map_err(|e| TransactionError::Signing(e.to_string()))?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| TransactionError::Signing(e.to_string()))?;
        mac.update(&payload);
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(SignedTransaction { envelope, signature })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memo_can_only_be_set_once() {
        let mut builder = TransactionBuilder::new("GSOURCE", "testnet");
        builder.add_memo(Memo::Id(7)).unwrap();
        assert_eq!(
            builder.add_memo(Memo::Text("x".into())).unwrap_err(),
            TransactionError::MemoAlreadySet
        );
    }

    #[test]
    fn test_build_requires_operations() {
        let builder = TransactionBuilder::new("GSOURCE", "testnet");
        assert_eq!(builder.build().unwrap_err(), TransactionError::NoOperations);
    }

    #[test]
    fn test_memo_validation() {
        assert!(Memo::text("alice").is_ok());
        assert!(Memo::text(&"x".repeat(29)).is_err());
        assert_eq!(Memo::id("42").unwrap(), Memo::Id(42));
        assert!(Memo::id("-1").is_err());
        assert!(Memo::hash(&"ab".repeat(32)).is_ok());
        assert!(Memo::hash("abcd").is_err());
    }

    #[test]
    fn test_signature_is_deterministic_and_keyed() {
        let mut builder = TransactionBuilder::new("GSOURCE", "testnet");
        builder.append_trust_op("USD", "GISSUER");
        let envelope = builder.build().unwrap();

        let a = HmacSigner.sign(envelope.clone(), "secret-a").unwrap();
        let b = HmacSigner.sign(envelope.clone(), "secret-a").unwrap();
        let c = HmacSigner.sign(envelope, "secret-b").unwrap();

        assert_eq!(a.signature, b.signature);
        assert_ne!(a.signature, c.signature);
        assert_eq!(a.signature.len(), 64);
        assert!(!a.encode().unwrap().contains("secret-a"));
    }
}
