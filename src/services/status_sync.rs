//! Bounded-retry delivery of transaction status to the platform.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::TransactionStatus;
use crate::platform::PlatformApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(2))
    }
}

/// Whether another attempt may follow attempt number `attempt` (1-based).
pub fn should_retry(attempt: u32, max_attempts: u32) -> bool {
    attempt < max_attempts
}

/// Progress of one report through its retry schedule.
#[derive(Debug, Clone, Copy)]
pub struct RetryState {
    pub attempt: u32,
    pub next_eligible_at: Instant,
}

impl RetryState {
    pub fn start() -> Self {
        Self {
            attempt: 0,
            next_eligible_at: Instant::now(),
        }
    }

    /// Records a failed attempt and schedules the next one.
    pub fn fail(&mut self, policy: &RetryPolicy) {
        self.next_eligible_at = Instant::now() + policy.delay;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Delivered { attempts: u32 },
    Exhausted { attempts: u32 },
}

impl ReportOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ReportOutcome::Delivered { .. })
    }
}

#[derive(Clone)]
pub struct StatusSynchronizer {
    platform: Arc<dyn PlatformApi>,
    policy: RetryPolicy,
}

impl StatusSynchronizer {
    pub fn new(platform: Arc<dyn PlatformApi>, policy: RetryPolicy) -> Self {
        Self { platform, policy }
    }

    pub async fn report(&self, tx_code: &str, status: TransactionStatus) -> ReportOutcome {
        let mut state = RetryState::start();

        loop {
            tokio::time::sleep_until(state.next_eligible_at).await;
            state.attempt += 1;

            match self.platform.update_transaction(tx_code, status).await {
                Ok(()) => {
                    tracing::info!(tx_code = %tx_code, status = %status, attempts = state.attempt, "Status reported");
                    return ReportOutcome::Delivered {
                        attempts: state.attempt,
                    };
                }
                Err(e) if should_retry(state.attempt, self.policy.max_attempts) => {
                    tracing::warn!(
                        tx_code = %tx_code,
                        attempt = state.attempt,
                        error = %e,
                        "Status report failed, retrying"
                    );
                    state.fail(&self.policy);
                }
                Err(e) => {
                    tracing::error!(
                        tx_code = %tx_code,
                        status = %status,
                        attempts = state.attempt,
                        error = %e,
                        "Status report abandoned"
                    );
                    return ReportOutcome::Exhausted {
                        attempts: state.attempt,
                    };
                }
            }
        }
    }
}
