pub mod address_resolver;
pub mod assets;
pub mod ingestion;
pub mod issuer_resolver;
pub mod payment_submitter;
pub mod processor;
pub mod recorder;
pub mod status_sync;
pub mod worker;

pub use address_resolver::{AddressResolver, ResolvedAddress};
pub use assets::{AssetRegistrar, Registration};
pub use ingestion::{incoming_only, IngestionPoller};
pub use issuer_resolver::IssuerResolver;
pub use payment_submitter::PaymentSubmitter;
pub use processor::{process_batch, run_poller, BatchSummary, IngestionContext};
pub use recorder::TransactionRecorder;
pub use status_sync::{should_retry, ReportOutcome, RetryPolicy, RetryState, StatusSynchronizer};
pub use worker::{requeue_pending, Job, JobQueue, StatusReporter, WorkerContext, WorkerPool};
