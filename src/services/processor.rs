use futures::future::join_all;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::WatchedAccount;
use crate::error::BridgeError;
use crate::ports::WatchedAccountRepository;
use crate::services::ingestion::IngestionPoller;
use crate::services::recorder::TransactionRecorder;

/// Unsynced receives retried per batch.
const UPLOAD_RETRY_LIMIT: i64 = 100;

pub struct IngestionContext {
    pub accounts: Arc<dyn WatchedAccountRepository>,
    pub poller: IngestionPoller,
    pub recorder: TransactionRecorder,
}

/// Totals for one pass over every watched account.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub accounts: usize,
    pub busy: usize,
    pub payments: usize,
    pub recorded: usize,
    pub failed: usize,
    /// Earlier receives whose platform upload succeeded on retry.
    pub uploaded: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AccountSummary {
    pub busy: bool,
    pub payments: usize,
    pub recorded: usize,
    pub failed: usize,
}

/// Runs the ingestion loop. Each tick polls every watched account without
/// blocking the HTTP server.
pub async fn run_poller(ctx: Arc<IngestionContext>, every: Duration) {
    info!(interval_secs = every.as_secs(), "Ingestion poller started");

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if let Err(e) = process_batch(ctx.clone()).await {
            error!(error = %e, "Ingestion batch error");
        }
    }
}

pub async fn process_batch(ctx: Arc<IngestionContext>) -> Result<BatchSummary, BridgeError> {
    let uploaded = ctx.recorder.retry_uploads(UPLOAD_RETRY_LIMIT).await?;
    let accounts = ctx.accounts.list().await?;

    let handles = accounts.into_iter().map(|account| {
        let ctx = ctx.clone();
        tokio::spawn(async move { process_account(&ctx, &account).await })
    });

    let mut summary = BatchSummary {
        uploaded,
        ..Default::default()
    };
    for result in join_all(handles).await {
        summary.accounts += 1;
        match result {
            Ok(Ok(account)) => {
                summary.busy += usize::from(account.busy);
                summary.payments += account.payments;
                summary.recorded += account.recorded;
                summary.failed += account.failed;
            }
            Ok(Err(e)) => {
                summary.failed += 1;
                error!(error = %e, "Account poll failed");
            }
            Err(e) => {
                summary.failed += 1;
                error!(error = %e, "Account poll task panicked");
            }
        }
    }

    if summary.payments > 0 || summary.uploaded > 0 {
        info!(
            accounts = summary.accounts,
            payments = summary.payments,
            recorded = summary.recorded,
            uploaded = summary.uploaded,
            failed = summary.failed,
            "Ingestion batch finished"
        );
    }
    Ok(summary)
}

pub async fn process_account(
    ctx: &IngestionContext,
    account: &WatchedAccount,
) -> Result<AccountSummary, BridgeError> {
    let Some(payments) = ctx.poller.try_poll(account).await? else {
        debug!(account_id = %account.account_id, "Previous poll still running, skipping");
        return Ok(AccountSummary {
            busy: true,
            ..Default::default()
        });
    };

    let mut summary = AccountSummary {
        payments: payments.len(),
        ..Default::default()
    };

    for payment in &payments {
        match ctx.recorder.record(payment).await {
            Ok(Some(_)) => summary.recorded += 1,
            Ok(None) => {}
            Err(e) => {
                summary.failed += 1;
                warn!(
                    account_id = %account.account_id,
                    hash = %payment.hash,
                    error = %e,
                    "Failed to record incoming payment"
                );
            }
        }
    }

    Ok(summary)
}
