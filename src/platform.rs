//! Client for the accounting platform's admin transaction API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::domain::TransactionStatus;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Platform returned status {status}")]
    Rejected { status: u16, body: String },
    #[error("Invalid platform response: {0}")]
    InvalidResponse(String),
}

impl PlatformError {
    /// HTTP status of a rejected request, if the platform answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            PlatformError::Rejected { status, .. } => Some(*status),
            PlatformError::RequestError(e) => e.status().map(|s| s.as_u16()),
            PlatformError::InvalidResponse(_) => None,
        }
    }
}

/// Body of a receive record upload.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiveRequest {
    pub recipient: String,
    pub amount: i64,
    pub currency: String,
    pub issuer: String,
    pub metadata: serde_json::Value,
}

#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Uploads a receive record and returns the platform's transaction code.
    async fn create_receive(&self, request: &ReceiveRequest) -> Result<String, PlatformError>;

    async fn update_transaction(
        &self,
        tx_code: &str,
        status: TransactionStatus,
    ) -> Result<(), PlatformError>;
}

#[derive(Clone)]
pub struct PlatformClient {
    client: Client,
    base_url: String,
    api_token: String,
}

impl PlatformClient {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into(),
            api_token: api_token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value, PlatformError> {
        let response = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response
            .json::<serde_json::Value>()
            .await
            .unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl PlatformApi for PlatformClient {
    async fn create_receive(&self, request: &ReceiveRequest) -> Result<String, PlatformError> {
        let body = serde_json::to_value(request)
            .map_err(|e| PlatformError::InvalidResponse(e.to_string()))?;
        let response = self.post("admin/transactions/receive/", &body).await?;

        let data = &response["data"];
        data["tx_code"]
            .as_str()
            .map(str::to_string)
            .or_else(|| match &data["id"] {
                serde_json::Value::String(id) => Some(id.clone()),
                serde_json::Value::Number(id) => Some(id.to_string()),
                _ => None,
            })
            .ok_or_else(|| {
                PlatformError::InvalidResponse("receive response carries no transaction code".to_string())
            })
    }

    async fn update_transaction(
        &self,
        tx_code: &str,
        status: TransactionStatus,
    ) -> Result<(), PlatformError> {
        let body = serde_json::json!({
            "tx_code": tx_code,
            "status": status.as_str(),
        });
        self.post("admin/transactions/update/", &body).await?;
        Ok(())
    }
}
