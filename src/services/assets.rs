use std::sync::Arc;

use crate::domain::AssetRecord;
use crate::error::BridgeError;
use crate::ports::AssetRepository;
use crate::services::issuer_resolver::IssuerResolver;
use crate::services::payment_submitter::PaymentSubmitter;
use crate::utils::locks::KeyedLocks;

/// Result of registering an asset.
#[derive(Debug, Clone)]
pub struct Registration {
    pub asset: AssetRecord,
    /// True when this call established the trust line.
    pub created: bool,
}

/// Trusts and records assets the operating account should accept.
#[derive(Clone)]
pub struct AssetRegistrar {
    assets: Arc<dyn AssetRepository>,
    issuers: IssuerResolver,
    submitter: PaymentSubmitter,
    locks: KeyedLocks,
}

impl AssetRegistrar {
    pub fn new(assets: Arc<dyn AssetRepository>, issuers: IssuerResolver, submitter: PaymentSubmitter) -> Self {
        Self {
            assets,
            issuers,
            submitter,
            locks: KeyedLocks::new(),
        }
    }

    /// Trusts `code` from the resolved issuer unless a record already exists.
    /// Concurrent registrations of the same asset submit at most one trust.
    pub async fn add_asset(
        &self,
        code: &str,
        issuer_ref: &str,
        metadata: serde_json::Value,
    ) -> Result<Registration, BridgeError> {
        let issuer_account = self.issuers.resolve_issuer(code, issuer_ref).await?;
        let _guard = self.locks.lock(&format!("{}:{}", code, issuer_account)).await;

        if let Some(existing) = self.assets.find(code, &issuer_account).await? {
            tracing::info!(code = %code, issuer = %existing.issuer, "Issuer already trusted");
            return Ok(Registration {
                asset: existing,
                created: false,
            });
        }

        self.submitter.trust_resolved(code, &issuer_account).await?;

        let record = AssetRecord::new(code, issuer_ref, issuer_account, metadata);
        let (asset, created) = self.assets.insert_if_absent(&record).await?;
        tracing::info!(code = %code, account_id = %asset.account_id, "Asset trusted");

        Ok(Registration { asset, created })
    }
}
