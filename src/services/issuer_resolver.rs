use crate::error::BridgeError;
use crate::services::address_resolver::AddressResolver;
use crate::stellar::{FEDERATION_SEPARATOR, is_valid_address};

/// Turns an issuer reference into the issuing account id.
///
/// The reference may be the account itself, a federated address, or an
/// anchor domain whose descriptor lists the asset under `CURRENCIES`.
#[derive(Clone)]
pub struct IssuerResolver {
    addresses: AddressResolver,
}

impl IssuerResolver {
    pub fn new(addresses: AddressResolver) -> Self {
        Self { addresses }
    }

    pub async fn resolve_issuer(&self, code: &str, issuer_ref: &str) -> Result<String, BridgeError> {
        let issuer_ref = issuer_ref.trim();

        if is_valid_address(issuer_ref) {
            return Ok(issuer_ref.to_string());
        }

        if issuer_ref.contains(FEDERATION_SEPARATOR) {
            let resolved = self.addresses.resolve(issuer_ref).await?;
            return Ok(resolved.account_id);
        }

        let descriptor = self.addresses.lookup().stellar_toml(issuer_ref).await?;
        descriptor
            .issuer_for(code)
            .map(str::to_string)
            .ok_or_else(|| BridgeError::AssetNotFound {
                code: code.to_string(),
                issuer: issuer_ref.to_string(),
            })
    }
}
