//! Builds, signs and submits outgoing ledger operations for the sending account.

use std::sync::Arc;

use crate::domain::WatchedAccount;
use crate::domain::amount::{NATIVE_CURRENCY, format_ledger_amount};
use crate::error::BridgeError;
use crate::services::address_resolver::AddressResolver;
use crate::services::issuer_resolver::IssuerResolver;
use crate::stellar::{
    Asset, HorizonError, Ledger, SubmitResponse, TransactionBuilder, TransactionEnvelope,
    TransactionSigner,
};

#[derive(Clone)]
pub struct PaymentSubmitter {
    ledger: Arc<dyn Ledger>,
    addresses: AddressResolver,
    issuers: IssuerResolver,
    signer: Arc<dyn TransactionSigner>,
    account: WatchedAccount,
}

impl PaymentSubmitter {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        addresses: AddressResolver,
        issuers: IssuerResolver,
        signer: Arc<dyn TransactionSigner>,
        account: WatchedAccount,
    ) -> Self {
        Self {
            ledger,
            addresses,
            issuers,
            signer,
            account,
        }
    }

    pub fn account(&self) -> &WatchedAccount {
        &self.account
    }

    /// Sends `amount` minor units of `currency` to `recipient`.
    ///
    /// Native payments to a missing account create it instead. Non-native
    /// payments require the destination to exist.
    pub async fn send(
        &self,
        recipient: &str,
        amount: i64,
        currency: &str,
        issuer_ref: Option<&str>,
    ) -> Result<SubmitResponse, BridgeError> {
        let secret = self.secret()?;
        let resolved = self.addresses.resolve(recipient).await?;
        let destination = resolved.account_id.as_str();
        let amount = format_ledger_amount(amount);

        let mut builder = TransactionBuilder::new(&self.account.account_id, &self.account.network);
        if let Some(memo) = resolved.memo {
            builder.add_memo(memo)?;
        }

        if currency == NATIVE_CURRENCY {
            match self.ledger.get_account(destination).await {
                Ok(_) => {
                    builder.append_payment_op(destination, Asset::Native, &amount);
                }
                Err(HorizonError::AccountNotFound(_)) => {
                    tracing::info!(destination = %destination, "Destination not found, creating account");
                    builder.append_create_account_op(destination, &amount);
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            let issuer_ref = issuer_ref.ok_or_else(|| BridgeError::AssetNotFound {
                code: currency.to_string(),
                issuer: String::new(),
            })?;
            let issuer = self.issuers.resolve_issuer(currency, issuer_ref).await?;

            match self.ledger.get_account(destination).await {
                Ok(_) => {}
                Err(HorizonError::AccountNotFound(_)) => {
                    return Err(BridgeError::UnfundedDestination(destination.to_string()))
                }
                Err(e) => return Err(e.into()),
            }

            builder.append_payment_op(
                destination,
                Asset::Credit {
                    code: currency.to_string(),
                    issuer,
                },
                &amount,
            );
        }

        self.submit(builder.build()?, secret).await
    }

    /// Establishes a trust line from the sending account to the asset.
    pub async fn trust(&self, code: &str, issuer_ref: &str) -> Result<SubmitResponse, BridgeError> {
        let issuer = self.issuers.resolve_issuer(code, issuer_ref).await?;
        self.trust_resolved(code, &issuer).await
    }

    /// As [`trust`](Self::trust), with the issuer account already known.
    pub async fn trust_resolved(&self, code: &str, issuer: &str) -> Result<SubmitResponse, BridgeError> {
        let secret = self.secret()?;
        let mut builder = TransactionBuilder::new(&self.account.account_id, &self.account.network);
        builder.append_trust_op(code, issuer);
        self.submit(builder.build()?, secret).await
    }

    fn secret(&self) -> Result<&str, BridgeError> {
        self.account
            .secret
            .as_deref()
            .ok_or_else(|| BridgeError::MissingCredential(self.account.account_id.clone()))
    }

    async fn submit(&self, envelope: TransactionEnvelope, secret: &str) -> Result<SubmitResponse, BridgeError> {
        let signed = self.signer.sign(envelope, secret)?;
        let response = self.ledger.submit(&signed).await?;
        tracing::info!(
            account_id = %self.account.account_id,
            hash = %response.hash,
            "Transaction submitted"
        );
        Ok(response)
    }
}
