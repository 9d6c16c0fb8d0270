//! Resolves recipient identifiers into ledger accounts.
//!
//! A recipient is either a raw account id or a federated `name*domain`
//! address. Federated addresses are looked up through the domain's
//! `stellar.toml` descriptor and its federation server, which may also
//! return a memo the payment must carry.

use std::sync::Arc;

use crate::error::BridgeError;
use crate::stellar::{
    is_valid_address, DomainLookup, FEDERATION_SEPARATOR, FederationError, FederationResponse, Memo,
};

/// Ledger account plus the memo the destination expects, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub account_id: String,
    pub memo: Option<Memo>,
}

/// Shape of a recipient string before any network lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientKind<'a> {
    Raw(&'a str),
    Federated { name: &'a str, domain: &'a str },
}

/// Classifies `recipient` without touching the network.
pub fn classify(recipient: &str) -> Result<RecipientKind<'_>, BridgeError> {
    if is_valid_address(recipient) {
        return Ok(RecipientKind::Raw(recipient));
    }

    let mut parts = recipient.split(FEDERATION_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(domain), None) if !name.is_empty() && !domain.is_empty() => {
            Ok(RecipientKind::Federated { name, domain })
        }
        _ => Err(BridgeError::InvalidAddress(recipient.to_string())),
    }
}

#[derive(Clone)]
pub struct AddressResolver {
    lookup: Arc<dyn DomainLookup>,
}

impl AddressResolver {
    pub fn new(lookup: Arc<dyn DomainLookup>) -> Self {
        Self { lookup }
    }

    pub fn lookup(&self) -> &Arc<dyn DomainLookup> {
        &self.lookup
    }

    pub async fn resolve(&self, recipient: &str) -> Result<ResolvedAddress, BridgeError> {
        let domain = match classify(recipient)? {
            RecipientKind::Raw(account_id) => {
                return Ok(ResolvedAddress {
                    account_id: account_id.to_string(),
                    memo: None,
                })
            }
            RecipientKind::Federated { domain, .. } => domain,
        };

        let descriptor = self.lookup.stellar_toml(domain).await?;
        let server = descriptor
            .federation_server
            .ok_or_else(|| FederationError::MissingFederationServer(domain.to_string()))?;

        let response = self.lookup.federation(&server, recipient).await?;
        tracing::debug!(recipient = %recipient, account_id = %response.account_id, "Resolved federated address");

        into_resolved(response)
    }
}

fn into_resolved(response: FederationResponse) -> Result<ResolvedAddress, BridgeError> {
    if response.account_id.trim().is_empty() {
        return Err(FederationError::Malformed("empty account_id".to_string()).into());
    }

    let memo = match response.memo_type.as_deref() {
        None => None,
        Some(memo_type) => {
            let value = response.memo.as_deref().ok_or_else(|| {
                FederationError::Malformed(format!("memo_type {} without memo", memo_type))
            })?;
            let memo = match memo_type {
                "text" => Memo::text(value),
                "id" => Memo::id(value),
                "hash" => Memo::hash(value),
                other => return Err(BridgeError::UnsupportedMemo(other.to_string())),
            };
            Some(memo.map_err(|e| FederationError::Malformed(e.to_string()))?)
        }
    };

    Ok(ResolvedAddress {
        account_id: response.account_id,
        memo,
    })
}
