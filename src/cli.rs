use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::config::Config;
use crate::services::{process_batch, StatusReporter};
use crate::startup::{validate_environment, Components};
use crate::utils::sanitize::mask_url_password;
use crate::validation::parse_status;

#[derive(Parser)]
#[command(name = "stellar-adapter")]
#[command(about = "Stellar ledger adapter for the accounting platform", long_about = None)]
pub struct Cli {
    /// Keep all state in memory instead of Postgres
    #[arg(long, global = true)]
    pub in_memory: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server, ingestion poller and workers (default)
    Serve,

    /// Run a single ingestion pass over every watched account
    PollOnce,

    /// Transaction management commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Set the status of an incoming transaction and sync it to the platform
    Reconcile {
        /// Ledger operation id of the payment
        #[arg(value_name = "EXTERNAL_ID")]
        external_id: String,

        /// Waiting, Pending, Complete or Failed
        #[arg(value_name = "STATUS")]
        status: String,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub async fn handle_poll_once(components: &Components) -> anyhow::Result<()> {
    let ctx = Arc::new(components.ingestion(StatusReporter::Inline(components.status.clone())));
    let summary = process_batch(ctx).await?;

    println!(
        "Polled {} account(s): {} payment(s), {} recorded, {} re-uploaded, {} failed",
        summary.accounts, summary.payments, summary.recorded, summary.uploaded, summary.failed
    );
    Ok(())
}

pub async fn handle_tx_reconcile(
    components: &Components,
    external_id: &str,
    status: &str,
) -> anyhow::Result<()> {
    let status = parse_status(status)?;
    let recorder = components.recorder(StatusReporter::Inline(components.status.clone()));

    let tx = recorder.reconcile(external_id, status).await?;
    tracing::info!(external_id = %external_id, status = %tx.status, "Transaction reconciled");
    println!(
        "Transaction {} is now {} (platform code: {})",
        tx.external_id,
        tx.status,
        tx.platform_code.as_deref().unwrap_or("none")
    );
    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("Database migrations completed");
    Ok(())
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_url_password(&config.database_url));
    println!("  Stellar Horizon URL: {}", config.stellar_horizon_url);
    println!("  Stellar Network: {}", config.stellar_network);
    println!("  Sending Account: {}", config.stellar_send_address);
    println!("  Platform API URL: {}", config.platform_api_url);
    println!("  Wallet Domain: {}", config.wallet_domain);

    let pool = crate::db::create_pool(config).await.ok();
    let report = validate_environment(config, pool.as_ref()).await;
    report.print();

    if !report.is_valid() {
        anyhow::bail!("Configuration is invalid");
    }
    Ok(())
}
