use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::Storage;
use crate::config::{self, Config};
use crate::domain::WatchedAccount;
use crate::platform::PlatformApi;
use crate::services::{
    AddressResolver, AssetRegistrar, IngestionContext, IngestionPoller, IssuerResolver, JobQueue,
    PaymentSubmitter, RetryPolicy, StatusReporter, StatusSynchronizer, TransactionRecorder,
    WorkerContext,
};
use crate::stellar::{DomainLookup, HmacSigner, Ledger};
use crate::AppState;

/// The wired service graph shared by the server, the poller and the CLI.
#[derive(Clone)]
pub struct Components {
    pub storage: Storage,
    pub ledger: Arc<dyn Ledger>,
    pub platform: Arc<dyn PlatformApi>,
    pub submitter: PaymentSubmitter,
    pub registrar: AssetRegistrar,
    pub poller: IngestionPoller,
    pub status: StatusSynchronizer,
    pub network: String,
    pub wallet_domain: String,
}

impl Components {
    pub fn new(
        config: &Config,
        storage: Storage,
        ledger: Arc<dyn Ledger>,
        lookup: Arc<dyn DomainLookup>,
        platform: Arc<dyn PlatformApi>,
        sender: WatchedAccount,
    ) -> Self {
        let addresses = AddressResolver::new(lookup);
        let issuers = IssuerResolver::new(addresses.clone());
        let submitter = PaymentSubmitter::new(
            ledger.clone(),
            addresses,
            issuers.clone(),
            Arc::new(HmacSigner),
            sender,
        );
        let registrar = AssetRegistrar::new(storage.assets.clone(), issuers, submitter.clone());
        let poller = IngestionPoller::new(ledger.clone(), storage.cursors.clone(), config.ingest_page_size);
        let status = StatusSynchronizer::new(
            platform.clone(),
            RetryPolicy::new(config.status_max_attempts, config.status_retry_delay()),
        );

        Self {
            storage,
            ledger,
            platform,
            submitter,
            registrar,
            poller,
            status,
            network: config.stellar_network.clone(),
            wallet_domain: config.wallet_domain.clone(),
        }
    }

    pub fn recorder(&self, reporter: StatusReporter) -> TransactionRecorder {
        TransactionRecorder::new(
            self.ledger.clone(),
            self.storage.users.clone(),
            self.storage.assets.clone(),
            self.storage.incoming.clone(),
            self.platform.clone(),
            reporter,
            self.wallet_domain.clone(),
        )
    }

    pub fn ingestion(&self, reporter: StatusReporter) -> IngestionContext {
        IngestionContext {
            accounts: self.storage.accounts.clone(),
            poller: self.poller.clone(),
            recorder: self.recorder(reporter),
        }
    }

    pub fn workers(&self) -> WorkerContext {
        WorkerContext {
            outgoing: self.storage.outgoing.clone(),
            submitter: self.submitter.clone(),
            status: self.status.clone(),
        }
    }

    pub fn app_state(&self, jobs: JobQueue, adapter_secret_key: &str) -> AppState {
        AppState {
            storage: self.storage.clone(),
            ledger: self.ledger.clone(),
            registrar: self.registrar.clone(),
            jobs,
            network: self.network.clone(),
            wallet_domain: self.wallet_domain.clone(),
            adapter_secret_key: adapter_secret_key.to_string(),
        }
    }
}

/// Registers the configured operating accounts. The sending account is the
/// network default; stored cursors are kept.
pub async fn seed_accounts(config: &Config, storage: &Storage) -> Result<WatchedAccount> {
    let sender = WatchedAccount::new(
        config.stellar_send_address.clone(),
        "send",
        config.stellar_network.clone(),
    )
    .with_secret(config.stellar_send_private_key.clone())
    .as_default();
    let sender = storage
        .accounts
        .upsert(&sender)
        .await
        .context("Failed to register sending account")?;

    if let Some(receive) = &config.stellar_receive_address {
        if receive != &config.stellar_send_address {
            let account = WatchedAccount::new(receive.clone(), "receive", config.stellar_network.clone());
            storage
                .accounts
                .upsert(&account)
                .await
                .context("Failed to register receive account")?;
        }
    }

    tracing::info!(account_id = %sender.account_id, network = %sender.network, "Operating accounts registered");
    Ok(sender)
}

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub horizon: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.horizon
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));
        println!("Horizon Connectivity:  {}", status(self.horizon));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  - {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "PASS" } else { "FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "OK" } else { "FAIL" }
}

pub async fn validate_environment(config: &Config, pool: Option<&PgPool>) -> ValidationReport {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        horizon: true,
        errors: Vec::new(),
    };

    if let Err(e) = config::validate(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    match pool {
        Some(pool) => {
            if let Err(e) = validate_database(pool).await {
                report.database = false;
                report.errors.push(format!("Database: {:#}", e));
            }
        }
        None => {
            report.database = false;
            report.errors.push("Database: not connected".to_string());
        }
    }

    if let Err(e) = validate_horizon(&config.stellar_horizon_url, config.request_timeout()).await {
        report.horizon = false;
        report.errors.push(format!("Horizon: {:#}", e));
    }

    report
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

async fn validate_horizon(horizon_url: &str, timeout: Duration) -> Result<()> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    let response = client
        .get(horizon_url)
        .send()
        .await
        .context("Failed to connect to Horizon")?;

    if !response.status().is_success() {
        anyhow::bail!("Horizon returned status: {}", response.status());
    }

    Ok(())
}
