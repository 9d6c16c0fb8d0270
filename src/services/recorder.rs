//! Attribution and exactly-once recording of incoming payments.

use std::sync::Arc;

use crate::domain::amount::{NATIVE_CURRENCY, STELLAR_DIVISIBILITY, to_cents};
use crate::domain::{deposit_account_id, IncomingTransaction, TransactionStatus};
use crate::error::BridgeError;
use crate::platform::{PlatformApi, ReceiveRequest};
use crate::ports::{AssetRepository, IncomingTransactionRepository, RepositoryError, UserDirectory};
use crate::services::worker::StatusReporter;
use crate::stellar::{Ledger, PaymentAsset, PaymentRecord};

#[derive(Clone)]
pub struct TransactionRecorder {
    ledger: Arc<dyn Ledger>,
    users: Arc<dyn UserDirectory>,
    assets: Arc<dyn AssetRepository>,
    incoming: Arc<dyn IncomingTransactionRepository>,
    platform: Arc<dyn PlatformApi>,
    reporter: StatusReporter,
    wallet_domain: String,
}

impl TransactionRecorder {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        users: Arc<dyn UserDirectory>,
        assets: Arc<dyn AssetRepository>,
        incoming: Arc<dyn IncomingTransactionRepository>,
        platform: Arc<dyn PlatformApi>,
        reporter: StatusReporter,
        wallet_domain: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            users,
            assets,
            incoming,
            platform,
            reporter,
            wallet_domain: wallet_domain.into(),
        }
    }

    /// Records an incoming payment for the user named by its memo.
    ///
    /// Returns `None` for payments without a memo and for payments that
    /// were already recorded.
    pub async fn record(&self, payment: &PaymentRecord) -> Result<Option<IncomingTransaction>, BridgeError> {
        let detail = self.ledger.get_transaction(&payment.detail_link).await?;
        let Some(memo) = detail.memo() else {
            tracing::warn!(hash = %payment.hash, "Incoming payment has no memo, skipping");
            return Ok(None);
        };

        let account_id = deposit_account_id(memo.trim(), &self.wallet_domain);
        let user = self
            .users
            .find_by_account_id(&account_id)
            .await?
            .ok_or_else(|| BridgeError::UnknownRecipient(account_id.clone()))?;

        let (currency, issuer) = match &payment.asset {
            PaymentAsset::Native => (NATIVE_CURRENCY.to_string(), String::new()),
            PaymentAsset::Credit { code, issuer } => {
                let asset = self
                    .assets
                    .find(code, issuer)
                    .await?
                    .ok_or_else(|| BridgeError::AssetNotFound {
                        code: code.clone(),
                        issuer: issuer.clone(),
                    })?;
                (asset.code, asset.issuer)
            }
        };

        let amount = to_cents(&payment.amount, STELLAR_DIVISIBILITY)?;
        let tx = IncomingTransaction::new(
            payment.id.clone(),
            user.user_id.clone(),
            user.user_id,
            amount,
            currency,
            issuer,
            payment.raw.clone(),
        );

        let Some(inserted) = self.incoming.insert_if_absent(&tx).await? else {
            tracing::debug!(external_id = %tx.external_id, "Incoming payment already recorded");
            return Ok(None);
        };

        tracing::info!(
            external_id = %inserted.external_id,
            hash = %payment.hash,
            user_id = %inserted.user_id,
            amount = inserted.amount,
            currency = %inserted.currency,
            "Incoming payment recorded"
        );

        // A failed upload leaves the record unsynced; `retry_uploads` picks it up.
        if let Err(e) = self.upload_to_platform(&inserted).await {
            tracing::warn!(external_id = %inserted.external_id, error = %e, "Receive upload failed");
        }
        Ok(Some(inserted))
    }

    /// Uploads reportable records that never reached the platform.
    /// Returns how many were uploaded.
    pub async fn retry_uploads(&self, limit: i64) -> Result<usize, BridgeError> {
        let mut uploaded = 0;
        for tx in self.incoming.list_unsynced(limit).await? {
            match self.upload_to_platform(&tx).await {
                Ok(()) => uploaded += 1,
                Err(e) => {
                    tracing::warn!(external_id = %tx.external_id, error = %e, "Receive upload retry failed")
                }
            }
        }
        Ok(uploaded)
    }

    /// Applies a status decided outside the adapter and syncs the platform.
    pub async fn reconcile(
        &self,
        external_id: &str,
        status: TransactionStatus,
    ) -> Result<IncomingTransaction, BridgeError> {
        let updated = self.incoming.update_status(external_id, status).await?;
        tracing::info!(external_id = %external_id, status = %status, "Incoming transaction reconciled");

        self.upload_to_platform(&updated).await?;
        self.incoming
            .get_by_external_id(external_id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(external_id.to_string()).into())
    }

    async fn upload_to_platform(&self, tx: &IncomingTransaction) -> Result<(), BridgeError> {
        match &tx.platform_code {
            None if tx.status.is_reportable() => {
                let request = ReceiveRequest {
                    recipient: tx.recipient.clone(),
                    amount: tx.amount,
                    currency: tx.currency.clone(),
                    issuer: tx.issuer.clone(),
                    metadata: tx.metadata.clone(),
                };
                let code = self.platform.create_receive(&request).await?;
                self.incoming.set_platform_code(&tx.external_id, &code).await?;
                tracing::info!(external_id = %tx.external_id, tx_code = %code, "Receive uploaded to platform");

                // The platform creates receives as pending.
                if tx.status == TransactionStatus::Complete {
                    self.reporter.dispatch(&code, TransactionStatus::Complete).await?;
                }
            }
            Some(code) if tx.status == TransactionStatus::Complete => {
                self.reporter.dispatch(code, TransactionStatus::Complete).await?;
            }
            _ => {}
        }
        Ok(())
    }
}
