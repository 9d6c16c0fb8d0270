//! Background job pool. HTTP handlers and the recorder enqueue work here;
//! a fixed number of workers drain the queue.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::domain::TransactionStatus;
use crate::error::BridgeError;
use crate::ports::{OutgoingTransactionRepository, RepositoryError};
use crate::services::payment_submitter::PaymentSubmitter;
use crate::services::status_sync::StatusSynchronizer;
use crate::utils::sanitize::sanitize_json;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Execute a stored outgoing transaction on the ledger.
    Send { tx_code: String },
    /// Deliver a status to the platform.
    ReportStatus {
        tx_code: String,
        status: TransactionStatus,
    },
}

#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<Job>,
}

impl JobQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Job>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Waits for queue capacity. Fails only once every worker is gone.
    pub async fn enqueue(&self, job: Job) -> Result<(), BridgeError> {
        self.sender.send(job).await.map_err(|_| BridgeError::QueueClosed)
    }
}

/// Where status reports go: straight to the platform, or through the job queue.
#[derive(Clone)]
pub enum StatusReporter {
    Inline(StatusSynchronizer),
    Queued(JobQueue),
}

impl StatusReporter {
    pub async fn dispatch(&self, tx_code: &str, status: TransactionStatus) -> Result<(), BridgeError> {
        match self {
            StatusReporter::Inline(sync) => {
                sync.report(tx_code, status).await;
                Ok(())
            }
            StatusReporter::Queued(queue) => {
                queue
                    .enqueue(Job::ReportStatus {
                        tx_code: tx_code.to_string(),
                        status,
                    })
                    .await
            }
        }
    }
}

pub struct WorkerContext {
    pub outgoing: Arc<dyn OutgoingTransactionRepository>,
    pub submitter: PaymentSubmitter,
    pub status: StatusSynchronizer,
}

pub struct WorkerPool;

impl WorkerPool {
    pub fn spawn(
        ctx: Arc<WorkerContext>,
        receiver: mpsc::Receiver<Job>,
        count: usize,
    ) -> Vec<JoinHandle<()>> {
        let receiver = Arc::new(Mutex::new(receiver));

        (0..count.max(1))
            .map(|worker_id| {
                let ctx = ctx.clone();
                let receiver = receiver.clone();
                tokio::spawn(async move {
                    tracing::debug!(worker_id, "Worker started");
                    loop {
                        let job = receiver.lock().await.recv().await;
                        match job {
                            Some(job) => handle_job(&ctx, job).await,
                            None => break,
                        }
                    }
                    tracing::debug!(worker_id, "Worker stopped");
                })
            })
            .collect()
    }
}

pub async fn handle_job(ctx: &WorkerContext, job: Job) {
    match job {
        Job::Send { tx_code } => {
            if let Err(e) = execute_send(ctx, &tx_code).await {
                tracing::error!(tx_code = %tx_code, error = %e, "Send job failed");
            }
        }
        Job::ReportStatus { tx_code, status } => {
            ctx.status.report(&tx_code, status).await;
        }
    }
}

/// Enqueues every pending send no worker has claimed, e.g. jobs lost
/// with the previous process. Returns how many were enqueued.
pub async fn requeue_pending(
    outgoing: &dyn OutgoingTransactionRepository,
    queue: &JobQueue,
) -> Result<usize, BridgeError> {
    let pending = outgoing.list_pending().await?;
    for tx in &pending {
        queue
            .enqueue(Job::Send {
                tx_code: tx.tx_code.clone(),
            })
            .await?;
    }
    if !pending.is_empty() {
        tracing::info!(count = pending.len(), "Re-enqueued pending sends");
    }
    Ok(pending.len())
}

/// Executes a pending outgoing transaction once and reports its final
/// status. Records that already left `Pending` are left alone.
pub async fn execute_send(ctx: &WorkerContext, tx_code: &str) -> Result<TransactionStatus, BridgeError> {
    let tx = ctx
        .outgoing
        .get(tx_code)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("outgoing transaction {}", tx_code)))?;

    if tx.status != TransactionStatus::Pending {
        tracing::info!(tx_code = %tx_code, status = %tx.status, "Send already executed, skipping");
        return Ok(tx.status);
    }
    if !ctx.outgoing.claim(tx_code).await? {
        tracing::info!(tx_code = %tx_code, "Send already claimed, skipping");
        return Ok(tx.status);
    }

    let status = match ctx
        .submitter
        .send(&tx.recipient, tx.amount, &tx.currency, tx.issuer.as_deref())
        .await
    {
        Ok(response) => {
            tracing::info!(tx_code = %tx_code, hash = %response.hash, "Send completed");
            TransactionStatus::Complete
        }
        Err(BridgeError::Submission { code, payload }) => {
            tracing::error!(
                tx_code = %tx_code,
                code = %code,
                payload = %sanitize_json(&payload),
                "Ledger rejected send"
            );
            TransactionStatus::Failed
        }
        Err(e) => {
            tracing::error!(tx_code = %tx_code, error = %e, "Send failed");
            TransactionStatus::Failed
        }
    };

    ctx.outgoing.update_status(tx_code, status).await?;

    if ctx.outgoing.mark_reported(tx_code).await? {
        ctx.status.report(tx_code, status).await;
    }

    Ok(status)
}
