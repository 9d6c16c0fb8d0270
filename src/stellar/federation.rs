//! Domain descriptor (`stellar.toml`) and federation lookups.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FederationError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Descriptor for {domain} is invalid: {reason}")]
    InvalidDescriptor { domain: String, reason: String },
    #[error("Domain {0} does not publish a federation server")]
    MissingFederationServer(String),
    #[error("Federation lookup for {address} returned {status}")]
    LookupFailed { address: String, status: u16 },
    #[error("Malformed federation response: {0}")]
    Malformed(String),
}

/// The parts of a domain's `stellar.toml` the adapter reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StellarToml {
    #[serde(rename = "FEDERATION_SERVER")]
    pub federation_server: Option<String>,
    #[serde(rename = "CURRENCIES", default)]
    pub currencies: Vec<CurrencyEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrencyEntry {
    pub code: Option<String>,
    pub issuer: Option<String>,
}

impl StellarToml {
    pub fn parse(domain: &str, text: &str) -> Result<Self, FederationError> {
        toml::from_str(text).map_err(|e| FederationError::InvalidDescriptor {
            domain: domain.to_string(),
            reason: e.to_string(),
        })
    }

    /// Issuer of the first currency entry whose code matches.
    pub fn issuer_for(&self, code: &str) -> Option<&str> {
        self.currencies
            .iter()
            .find(|c| c.code.as_deref() == Some(code))
            .and_then(|c| c.issuer.as_deref())
    }
}

/// Federation server answer to a `type=name` query.
#[derive(Debug, Clone, Deserialize)]
pub struct FederationResponse {
    pub stellar_address: Option<String>,
    pub account_id: String,
    pub memo_type: Option<String>,
    #[serde(default, deserialize_with = "memo_value")]
    pub memo: Option<String>,
}

// Federation servers disagree on whether id memos are strings or numbers.
fn memo_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

/// Outbound lookups against third-party domains.
#[async_trait]
pub trait DomainLookup: Send + Sync {
    async fn stellar_toml(&self, domain: &str) -> Result<StellarToml, FederationError>;

    async fn federation(
        &self,
        server_url: &str,
        address: &str,
    ) -> Result<FederationResponse, FederationError>;
}

#[derive(Clone)]
pub struct HttpDomainLookup {
    client: Client,
    scheme: String,
}

impl HttpDomainLookup {
    pub fn new(scheme: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            scheme: scheme.into(),
        }
    }

    fn descriptor_url(&self, domain: &str) -> String {
        format!("{}://{}/.well-known/stellar.toml", self.scheme, domain)
    }
}

#[async_trait]
impl DomainLookup for HttpDomainLookup {
    async fn stellar_toml(&self, domain: &str) -> Result<StellarToml, FederationError> {
        let response = self.client.get(self.descriptor_url(domain)).send().await?;
        if !response.status().is_success() {
            return Err(FederationError::InvalidDescriptor {
                domain: domain.to_string(),
                reason: format!("descriptor request returned {}", response.status()),
            });
        }

        let text = response.text().await?;
        StellarToml::parse(domain, &text)
    }

    async fn federation(
        &self,
        server_url: &str,
        address: &str,
    ) -> Result<FederationResponse, FederationError> {
        let response = self
            .client
            .get(server_url)
            .query(&[("type", "name"), ("q", address)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FederationError::LookupFailed {
                address: address.to_string(),
                status: response.status().as_u16(),
            });
        }

        response
            .json::<FederationResponse>()
            .await
            .map_err(|e| FederationError::Malformed(e.to_string()))
    }
}
