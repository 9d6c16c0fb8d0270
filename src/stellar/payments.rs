//! Validated views of Horizon payment history.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::client::HorizonError;
use crate::domain::amount::parse_amount;

/// Asset carried by a payment operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentAsset {
    Native,
    Credit { code: String, issuer: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentKind {
    Payment,
    CreateAccount,
}

/// One record of an account's payment history.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRecord {
    pub kind: PaymentKind,
    /// Operation id. Unique per payment, unlike `hash`.
    pub id: String,
    pub paging_token: String,
    /// Hash of the enclosing ledger transaction.
    pub hash: String,
    pub from: String,
    pub to: String,
    pub amount: BigDecimal,
    pub asset: PaymentAsset,
    /// Link to the enclosing transaction's details, which carry the memo.
    pub detail_link: String,
    /// The record exactly as Horizon returned it.
    pub raw: serde_json::Value,
}

/// A page of payment history.
#[derive(Debug, Clone, Default)]
pub struct PaymentPage {
    pub records: Vec<PaymentRecord>,
    /// Paging token of the last record on the page, including records of
    /// operation types the adapter does not ingest.
    pub last_paging_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    id: Option<String>,
    paging_token: String,
    transaction_hash: String,
    #[serde(rename = "_links")]
    links: RawLinks,
    #[serde(flatten)]
    kind: RawKind,
}

#[derive(Debug, Deserialize)]
struct RawLinks {
    transaction: RawLink,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    href: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawKind {
    Payment {
        from: String,
        to: String,
        amount: String,
        asset_type: String,
        asset_code: Option<String>,
        asset_issuer: Option<String>,
    },
    CreateAccount {
        funder: String,
        account: String,
        starting_balance: String,
    },
    #[serde(other)]
    Unsupported,
}

impl PaymentPage {
    /// Validates a Horizon `/payments` response body. Any malformed record
    /// rejects the whole page so the cursor never moves past it.
    pub fn from_horizon(body: serde_json::Value) -> Result<Self, HorizonError> {
        let records = body
            .pointer("/_embedded/records")
            .and_then(|r| r.as_array())
            .ok_or_else(|| HorizonError::InvalidResponse("missing _embedded.records".to_string()))?;

        let mut page = PaymentPage::default();
        for value in records {
            let raw: RawRecord = serde_json::from_value(value.clone())
                .map_err(|e| HorizonError::InvalidResponse(format!("malformed payment record: {}", e)))?;

            page.last_paging_token = Some(raw.paging_token.clone());
            if let Some(record) = PaymentRecord::from_raw(raw, value.clone())? {
                page.records.push(record);
            }
        }

        Ok(page)
    }
}

impl PaymentRecord {
    fn from_raw(raw: RawRecord, value: serde_json::Value) -> Result<Option<Self>, HorizonError> {
        let invalid = |e: crate::domain::amount::AmountError| HorizonError::InvalidResponse(e.to_string());

        let (kind, from, to, amount, asset) = match raw.kind {
            RawKind::Payment {
                from,
                to,
                amount,
                asset_type,
                asset_code,
                asset_issuer,
            } => {
                let asset = match (asset_type.as_str(), asset_code, asset_issuer) {
                    ("native", _, _) => PaymentAsset::Native,
                    (_, Some(code), Some(issuer)) => PaymentAsset::Credit { code, issuer },
                    (other, _, _) => {
                        return Err(HorizonError::InvalidResponse(format!(
                            "asset type {} without code and issuer",
                            other
                        )))
                    }
                };
                let amount = parse_amount(&amount).map_err(invalid)?;
                (PaymentKind::Payment, from, to, amount, asset)
            }
            RawKind::CreateAccount {
                funder,
                account,
                starting_balance,
            } => {
                let amount = parse_amount(&starting_balance).map_err(invalid)?;
                (PaymentKind::CreateAccount, funder, account, amount, PaymentAsset::Native)
            }
            RawKind::Unsupported => return Ok(None),
        };

        Ok(Some(PaymentRecord {
            kind,
            id: raw.id.unwrap_or_else(|| raw.paging_token.clone()),
            paging_token: raw.paging_token,
            hash: raw.transaction_hash,
            from,
            to,
            amount,
            asset,
            detail_link: raw.links.transaction.href,
            raw: value,
        }))
    }
}

/// Horizon `/transactions/{hash}` response, reduced to what attribution needs.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionDetail {
    pub hash: String,
    #[serde(default = "default_memo_type")]
    pub memo_type: String,
    pub memo: Option<String>,
}

fn default_memo_type() -> String {
    "none".to_string()
}

impl TransactionDetail {
    pub fn memo(&self) -> Option<&str> {
        if self.memo_type == "none" {
            return None;
        }
        self.memo.as_deref().filter(|m| !m.trim().is_empty())
    }
}
