use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use stellar_adapter::adapters::Storage;
use stellar_adapter::cli::{self, Cli, Commands, DbCommands, TxCommands};
use stellar_adapter::config::{self, Config};
use stellar_adapter::platform::PlatformClient;
use stellar_adapter::services::{requeue_pending, run_poller, JobQueue, StatusReporter, WorkerPool};
use stellar_adapter::startup::{seed_accounts, Components};
use stellar_adapter::stellar::{HorizonClient, HttpDomainLookup};
use stellar_adapter::{create_app, db};

const JOB_QUEUE_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&config, cli.in_memory).await,
        Commands::PollOnce => {
            let components = build(&config, cli.in_memory).await?;
            cli::handle_poll_once(&components).await
        }
        Commands::Tx(TxCommands::Reconcile { external_id, status }) => {
            let components = build(&config, cli.in_memory).await?;
            cli::handle_tx_reconcile(&components, &external_id, &status).await
        }
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn build(config: &Config, in_memory: bool) -> anyhow::Result<Components> {
    config::validate(config)?;

    let storage = if in_memory {
        tracing::warn!("Running with in-memory storage; state is lost on exit");
        Storage::in_memory()
    } else {
        let pool = db::create_pool(config).await?;
        db::run_migrations(&pool).await?;
        Storage::postgres(pool)
    };

    let sender = seed_accounts(config, &storage).await?;

    let ledger = HorizonClient::with_circuit_breaker(
        config.stellar_horizon_url.clone(),
        3,
        60,
        config.request_timeout(),
    );
    tracing::info!("Stellar Horizon client initialized with URL: {}", config.stellar_horizon_url);

    let lookup = HttpDomainLookup::new(config.federation_scheme.clone(), config.request_timeout());
    let platform = PlatformClient::new(
        config.platform_api_url.clone(),
        config.platform_api_token.clone(),
        config.request_timeout(),
    );

    Ok(Components::new(
        config,
        storage,
        Arc::new(ledger),
        Arc::new(lookup),
        Arc::new(platform),
        sender,
    ))
}

async fn serve(config: &Config, in_memory: bool) -> anyhow::Result<()> {
    let components = build(config, in_memory).await?;

    let (jobs, receiver) = JobQueue::channel(JOB_QUEUE_CAPACITY);
    let workers = WorkerPool::spawn(Arc::new(components.workers()), receiver, config.worker_count);
    tracing::info!(workers = workers.len(), "Worker pool started");
    requeue_pending(components.storage.outgoing.as_ref(), &jobs).await?;

    let ingestion = Arc::new(components.ingestion(StatusReporter::Queued(jobs.clone())));
    let poller = tokio::spawn(run_poller(ingestion, config.poll_interval()));

    let app = create_app(
        components.app_state(jobs, &config.adapter_secret_key),
        config.request_timeout(),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poller.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
