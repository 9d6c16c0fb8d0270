use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use super::payments::{PaymentPage, TransactionDetail};
use super::transaction::SignedTransaction;
use super::Ledger;

#[derive(Error, Debug)]
pub enum HorizonError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Invalid response from Horizon: {0}")]
    InvalidResponse(String),
    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
    #[error("Transaction submission failed: {code}")]
    SubmissionFailed {
        code: String,
        payload: serde_json::Value,
    },
}

/// Response from Horizon /accounts endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: String,
    pub account_id: String,
    pub balances: Vec<Balance>,
    pub sequence: String,
    #[serde(default)]
    pub subentry_count: i32,
    pub home_domain: Option<String>,
    #[serde(default)]
    pub last_modified_ledger: i64,
    #[serde(default)]
    pub last_modified_time: Option<String>,
}

impl AccountResponse {
    pub fn native_balance(&self) -> Option<&str> {
        self.balances
            .iter()
            .find(|b| b.asset_type == "native")
            .map(|b| b.balance.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub balance: String,
    pub limit: Option<String>,
    pub asset_type: String,
    pub asset_code: Option<String>,
    pub asset_issuer: Option<String>,
}

/// Response from a successful POST /transactions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub hash: String,
    pub ledger: Option<i64>,
}

/// HTTP client for interacting with the Stellar Horizon API
#[derive(Clone)]
pub struct HorizonClient {
    client: Client,
    base_url: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl HorizonClient {
    /// Creates a new HorizonClient with the specified base URL
    pub fn new(base_url: String) -> Self {
        Self::with_circuit_breaker(base_url, 3, 60, Duration::from_secs(30))
    }

    /// Creates a new HorizonClient with custom circuit breaker configuration
    pub fn with_circuit_breaker(
        base_url: String,
        failure_threshold: u32,
        reset_timeout_secs: u64,
        request_timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        HorizonClient {
            client,
            base_url,
            circuit_breaker,
        }
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Runs a request through the circuit breaker. Only transport-level
    /// failures count toward opening it; a missing account or a rejected
    /// transaction is an answer, not an outage.
    async fn guarded<T, F>(&self, request: F) -> Result<T, HorizonError>
    where
        F: Future<Output = Result<T, HorizonError>>,
    {
        match self
            .circuit_breaker
            .call_with(is_outage as fn(&HorizonError) -> bool, request)
            .await
        {
            Ok(value) => Ok(value),
            Err(FailsafeError::Rejected) => Err(HorizonError::CircuitBreakerOpen(
                "Horizon API circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

fn is_outage(err: &HorizonError) -> bool {
    matches!(
        err,
        HorizonError::RequestError(_) | HorizonError::InvalidResponse(_)
    )
}

#[async_trait]
impl Ledger for HorizonClient {
    /// Fetches account details from the Horizon API
    async fn get_account(&self, address: &str) -> Result<AccountResponse, HorizonError> {
        let url = self.url(&format!("accounts/{}", address));
        let client = self.client.clone();
        let addr = address.to_string();

        self.guarded(async move {
            let response = client.get(&url).send().await?;

            if response.status() == 404 {
                return Err(HorizonError::AccountNotFound(addr));
            }
            if !response.status().is_success() {
                return Err(HorizonError::InvalidResponse(format!(
                    "GET accounts/{} returned {}",
                    addr,
                    response.status()
                )));
            }

            let account = response.json::<AccountResponse>().await?;
            Ok(account)
        })
        .await
    }

    async fn get_payments(
        &self,
        account_id: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<PaymentPage, HorizonError> {
        let url = self.url(&format!("accounts/{}/payments", account_id));
        let mut query = vec![
            ("order".to_string(), "asc".to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor".to_string(), cursor.to_string()));
        }
        let client = self.client.clone();
        let addr = account_id.to_string();

        self.guarded(async move {
            let response = client.get(&url).query(&query).send().await?;

            if response.status() == 404 {
                return Err(HorizonError::AccountNotFound(addr));
            }
            if !response.status().is_success() {
                return Err(HorizonError::InvalidResponse(format!(
                    "GET payments for {} returned {}",
                    addr,
                    response.status()
                )));
            }

            let body = response.json::<serde_json::Value>().await?;
            PaymentPage::from_horizon(body)
        })
        .await
    }

    async fn get_transaction(&self, link: &str) -> Result<TransactionDetail, HorizonError> {
        let client = self.client.clone();
        let url = link.to_string();

        self.guarded(async move {
            let response = client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(HorizonError::InvalidResponse(format!(
                    "GET {} returned {}",
                    url,
                    response.status()
                )));
            }

            let detail = response
                .json::<TransactionDetail>()
                .await
                .map_err(|e| HorizonError::InvalidResponse(e.to_string()))?;
            Ok(detail)
        })
        .await
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<SubmitResponse, HorizonError> {
        let url = self.url("transactions");
        let encoded = tx
            .encode()
            .map_err(|e| HorizonError::InvalidResponse(format!("cannot encode envelope: {}", e)))?;
        let client = self.client.clone();

        self.guarded(async move {
            let response = client.post(&url).form(&[("tx", encoded)]).send().await?;
            let status = response.status();
            let body = response
                .json::<serde_json::Value>()
                .await
                .unwrap_or(serde_json::Value::Null);

            if status.is_success() {
                return serde_json::from_value::<SubmitResponse>(body)
                    .map_err(|e| HorizonError::InvalidResponse(e.to_string()));
            }

            let code = body
                .pointer("/extras/result_codes/transaction")
                .and_then(|c| c.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| status.as_u16().to_string());
            Err(HorizonError::SubmissionFailed {
                code,
                payload: body,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stellar::transaction::{HmacSigner, TransactionBuilder, TransactionSigner};

    const ACCOUNT: &str = "GBBD47UZQ5CSKQPV456PYYH4FSYJHBWGQJUVNMCNWZ2NBEHKQPW3KXKJ";

    #[test]
    fn test_horizon_client_creation() {
        let client = HorizonClient::new("https://horizon-testnet.stellar.org".to_string());
        assert_eq!(client.base_url, "https://horizon-testnet.stellar.org");
        assert_eq!(client.circuit_state(), "closed");
    }

    #[tokio::test]
    async fn test_get_account_with_mock() {
        let mut server = mockito::Server::new_async().await;

        let mock_response = r#"{
            "id": "GBBD47UZQ5CSKQPV456PYYH4FSYJHBWGQJUVNMCNWZ2NBEHKQPW3KXKJ",
            "account_id": "GBBD47UZQ5CSKQPV456PYYH4FSYJHBWGQJUVNMCNWZ2NBEHKQPW3KXKJ",
            "balances": [
                {
                    "balance": "100.0000000",
                    "asset_type": "native",
                    "limit": null,
                    "asset_code": null,
                    "asset_issuer": null
                }
            ],
            "sequence": "1",
            "subentry_count": 0,
            "home_domain": null,
            "last_modified_ledger": 1,
            "last_modified_time": "2021-01-01T00:00:00Z"
        }"#;

        let _mock = server
            .mock("GET", format!("/accounts/{}", ACCOUNT).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(mock_response)
            .create_async()
            .await;

        let client = HorizonClient::new(server.url());
        let account = client.get_account(ACCOUNT).await.unwrap();

        assert_eq!(account.account_id, ACCOUNT);
        assert_eq!(account.native_balance(), Some("100.0000000"));
    }

    #[tokio::test]
    async fn test_get_account_not_found_does_not_trip_breaker() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/accounts/.*".into()))
            .with_status(404)
            .expect(5)
            .create_async()
            .await;

        let client = HorizonClient::with_circuit_breaker(server.url(), 3, 60, Duration::from_secs(5));
        for _ in 0..5 {
            let result = client.get_account(ACCOUNT).await;
            assert!(matches!(result, Err(HorizonError::AccountNotFound(_))));
        }
        assert_eq!(client.circuit_state(), "closed");
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_failures() {
        let mut server = mockito::Server::new_async().await;

        let _mock = server
            .mock("GET", mockito::Matcher::Regex(r"^/accounts/.*".into()))
            .with_status(500)
            .expect_at_least(3)
            .create_async()
            .await;

        let client = HorizonClient::with_circuit_breaker(server.url(), 3, 60, Duration::from_secs(5));

        for _ in 0..3 {
            let _ = client.get_account(ACCOUNT).await;
        }

        let result = client.get_account(ACCOUNT).await;
        assert!(matches!(result, Err(HorizonError::CircuitBreakerOpen(_))));
    }

    #[tokio::test]
    async fn test_get_payments_passes_cursor() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "_embedded": { "records": [] }
        });

        let mock = server
            .mock("GET", format!("/accounts/{}/payments", ACCOUNT).as_str())
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("order".into(), "asc".into()),
                mockito::Matcher::UrlEncoded("limit".into(), "200".into()),
                mockito::Matcher::UrlEncoded("cursor".into(), "12345".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = HorizonClient::new(server.url());
        let page = client.get_payments(ACCOUNT, Some("12345"), 200).await.unwrap();

        mock.assert_async().await;
        assert!(page.records.is_empty());
        assert!(page.last_paging_token.is_none());
    }

    #[tokio::test]
    async fn test_submit_failure_carries_result_code() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "title": "Transaction Failed",
            "extras": { "result_codes": { "transaction": "tx_bad_seq" } }
        });

        let _mock = server
            .mock("POST", "/transactions")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let mut builder = TransactionBuilder::new(ACCOUNT, "testnet");
        builder.append_create_account_op(ACCOUNT, "1.0000000");
        let signed = HmacSigner
            .sign(builder.build().unwrap(), "SSECRET")
            .unwrap();

        let client = HorizonClient::new(server.url());
        match client.submit(&signed).await {
            Err(HorizonError::SubmissionFailed { code, payload }) => {
                assert_eq!(code, "tx_bad_seq");
                assert_eq!(payload["title"], "Transaction Failed");
            }
            other => panic!("unexpected result: {:?}", other.map(|r| r.hash)),
        }
    }
}
