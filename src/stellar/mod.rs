pub mod client;
pub mod federation;
pub mod payments;
pub mod transaction;

use async_trait::async_trait;

pub use client::{AccountResponse, Balance, HorizonClient, HorizonError, SubmitResponse};
pub use federation::{DomainLookup, FederationError, FederationResponse, HttpDomainLookup, StellarToml};
pub use payments::{PaymentAsset, PaymentKind, PaymentPage, PaymentRecord, TransactionDetail};
pub use transaction::{
    Asset, HmacSigner, Memo, Operation, SignedTransaction, TransactionBuilder, TransactionEnvelope,
    TransactionError, TransactionSigner,
};

/// Length of a raw ledger account id.
pub const ACCOUNT_ID_LEN: usize = 56;

/// Separator between the name and domain of a federated address.
pub const FEDERATION_SEPARATOR: char = '*';

/// The ledger operations the adapter relies on.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Fails with [`HorizonError::AccountNotFound`] when the account does not exist.
    async fn get_account(&self, account_id: &str) -> Result<AccountResponse, HorizonError>;

    /// Payments strictly after `cursor`, oldest first.
    async fn get_payments(
        &self,
        account_id: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<PaymentPage, HorizonError>;

    async fn get_transaction(&self, link: &str) -> Result<TransactionDetail, HorizonError>;

    async fn submit(&self, tx: &SignedTransaction) -> Result<SubmitResponse, HorizonError>;
}

/// True for strings shaped like a raw account id: `G` followed by 55
/// base32 characters, with no federation separator.
pub fn is_valid_address(address: &str) -> bool {
    address.len() == ACCOUNT_ID_LEN
        && address.starts_with('G')
        && address
            .chars()
            .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c))
}
