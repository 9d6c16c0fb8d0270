use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::time::Duration;

use crate::utils::sanitize::{mask, mask_url_password};

#[derive(Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub stellar_horizon_url: String,
    pub stellar_network: String,
    pub stellar_send_address: String,
    pub stellar_send_private_key: String,
    pub stellar_receive_address: Option<String>,
    pub platform_api_url: String,
    pub platform_api_token: String,
    pub adapter_secret_key: String,
    pub wallet_domain: String,
    pub poll_interval_secs: u64,
    pub ingest_page_size: u32,
    pub status_max_attempts: u32,
    pub status_retry_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub worker_count: usize,
    pub federation_scheme: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: parse_or("SERVER_PORT", 3000)?,
            database_url: required("DATABASE_URL")?,
            stellar_horizon_url: required("STELLAR_HORIZON_URL")?,
            stellar_network: env::var("STELLAR_NETWORK").unwrap_or_else(|_| "testnet".to_string()),
            stellar_send_address: required("STELLAR_SEND_ADDRESS")?,
            stellar_send_private_key: required("STELLAR_SEND_PRIVATE_KEY")?,
            stellar_receive_address: env::var("STELLAR_RECEIVE_ADDRESS")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            platform_api_url: required("PLATFORM_API_URL")?,
            platform_api_token: required("PLATFORM_API_TOKEN")?,
            adapter_secret_key: required("ADAPTER_SECRET_KEY")?,
            wallet_domain: required("WALLET_DOMAIN")?,
            poll_interval_secs: parse_or("POLL_INTERVAL_SECS", 5)?,
            ingest_page_size: parse_or("INGEST_PAGE_SIZE", 200)?,
            status_max_attempts: parse_or("STATUS_MAX_ATTEMPTS", 5)?,
            status_retry_delay_ms: parse_or("STATUS_RETRY_DELAY_MS", 2000)?,
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 30)?,
            worker_count: parse_or("WORKER_COUNT", 4)?,
            federation_scheme: env::var("FEDERATION_SCHEME").unwrap_or_else(|_| "https".to_string()),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn status_retry_delay(&self) -> Duration {
        Duration::from_millis(self.status_retry_delay_ms)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_port", &self.server_port)
            .field("database_url", &mask_url_password(&self.database_url))
            .field("stellar_horizon_url", &self.stellar_horizon_url)
            .field("stellar_network", &self.stellar_network)
            .field("stellar_send_address", &self.stellar_send_address)
            .field("stellar_send_private_key", &"****")
            .field("stellar_receive_address", &self.stellar_receive_address)
            .field("platform_api_url", &self.platform_api_url)
            .field("platform_api_token", &mask(&self.platform_api_token))
            .field("adapter_secret_key", &"****")
            .field("wallet_domain", &self.wallet_domain)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("ingest_page_size", &self.ingest_page_size)
            .field("status_max_attempts", &self.status_max_attempts)
            .field("status_retry_delay_ms", &self.status_retry_delay_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("worker_count", &self.worker_count)
            .field("federation_scheme", &self.federation_scheme)
            .finish()
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{} must be set", key))
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value", key)),
        Err(_) => Ok(default),
    }
}

/// Rejects configurations the adapter cannot run with.
pub fn validate(config: &Config) -> Result<()> {
    for (key, value) in [
        ("DATABASE_URL", &config.database_url),
        ("STELLAR_SEND_ADDRESS", &config.stellar_send_address),
        ("STELLAR_SEND_PRIVATE_KEY", &config.stellar_send_private_key),
        ("PLATFORM_API_TOKEN", &config.platform_api_token),
        ("ADAPTER_SECRET_KEY", &config.adapter_secret_key),
        ("WALLET_DOMAIN", &config.wallet_domain),
    ] {
        if value.trim().is_empty() {
            anyhow::bail!("{} is empty", key);
        }
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.ingest_page_size == 0 || config.ingest_page_size > 200 {
        anyhow::bail!("INGEST_PAGE_SIZE must be between 1 and 200");
    }
    if config.status_max_attempts == 0 {
        anyhow::bail!("STATUS_MAX_ATTEMPTS must be at least 1");
    }
    if config.worker_count == 0 {
        anyhow::bail!("WORKER_COUNT must be at least 1");
    }
    if !matches!(config.federation_scheme.as_str(), "http" | "https") {
        anyhow::bail!("FEDERATION_SCHEME must be http or https");
    }

    url::Url::parse(&config.stellar_horizon_url)
        .context("STELLAR_HORIZON_URL is not a valid URL")?;
    url::Url::parse(&config.platform_api_url).context("PLATFORM_API_URL is not a valid URL")?;

    Ok(())
}
