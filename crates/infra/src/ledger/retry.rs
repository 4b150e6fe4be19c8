//! Bounded optimistic retry around one atomic ledger operation.
//!
//! An attempt is: begin a store transaction, run the caller's unit of work
//! against it, commit. A conflict (at commit, or reported by the work itself)
//! discards the attempt and starts over from a fresh transaction, so every
//! retry re-reads accounts, entries and the counter. Other failures roll back
//! and return immediately.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::ledger::error::LedgerServiceError;
use crate::store::{LedgerStore, LedgerTransaction};

/// Future returned by a unit of work; borrows the transaction for `'a`.
pub type TxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LedgerServiceError>> + Send + 'a>>;

/// Backoff strategy between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay every time
    Fixed,
    /// base * 2^(attempt - 1)
    #[default]
    Exponential,
    /// base * attempt
    Linear,
}

/// Retry budget for atomic ledger operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (treated as at least 1)
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
    /// Spread (0.0-1.0) applied around the computed delay
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
            strategy: BackoffStrategy::Exponential,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// A single attempt; the first conflict is final.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
            jitter: 0.0,
        }
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            ..Default::default()
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Pause after failed attempt number `attempt` (1-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.base_delay.as_secs_f64() * 1_000.0;
        let cap = self.max_delay.as_secs_f64() * 1_000.0;
        let raw = match self.strategy {
            BackoffStrategy::Fixed => base,
            BackoffStrategy::Exponential => base * 2_f64.powi(attempt.saturating_sub(1).min(30) as i32),
            BackoffStrategy::Linear => base * f64::from(attempt),
        }
        .min(cap);

        // deterministic pseudo-jitter in [-jitter, +jitter]
        let unit = f64::from(attempt.wrapping_mul(17) % 100) / 50.0 - 1.0;
        let spread = raw * self.jitter.clamp(0.0, 1.0) * unit;

        Duration::from_micros(((raw + spread).clamp(0.0, cap) * 1_000.0) as u64)
    }

    /// Whether another attempt may follow `attempt` failed ones.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.attempts()
    }
}

/// Run `work` inside a store transaction, retrying on conflict per `policy`.
///
/// `work` is called once per attempt with a fresh transaction. It must not
/// commit; commit and rollback belong to this loop.
pub async fn run_atomic<S, T, F>(
    store: &S,
    policy: &RetryPolicy,
    operation: &'static str,
    mut work: F,
) -> Result<T, LedgerServiceError>
where
    S: LedgerStore + ?Sized,
    T: Send,
    F: for<'a> FnMut(&'a mut dyn LedgerTransaction) -> TxFuture<'a, T> + Send,
{
    let mut attempt = 0;
    loop {
        attempt += 1;

        let mut tx = store.begin().await?;
        let conflict = match work(tx.as_mut()).await {
            Ok(value) => match tx.commit().await {
                Ok(()) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "ledger transaction committed after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_conflict() => LedgerServiceError::from(e),
                Err(e) => return Err(e.into()),
            },
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(operation, error = %rollback_err, "ledger transaction rollback failed");
                }
                if !e.is_conflict() {
                    return Err(e);
                }
                e
            }
        };

        if !policy.should_retry(attempt) {
            error!(
                operation,
                attempts = attempt,
                error = ?conflict,
                "ledger transaction abandoned after repeated conflicts"
            );
            return Err(LedgerServiceError::ConcurrencyExhausted {
                operation,
                attempts: attempt,
            });
        }

        let delay = policy.delay_after(attempt);
        warn!(
            operation,
            attempt,
            max_attempts = policy.attempts(),
            delay_ms = delay.as_millis() as u64,
            error = ?conflict,
            "ledger transaction conflicted; retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Run read-only `work` against a consistent snapshot, then roll back.
///
/// Reads never conflict with anything, so there is no retry.
pub async fn read_only<S, T, F>(store: &S, operation: &'static str, work: F) -> Result<T, LedgerServiceError>
where
    S: LedgerStore + ?Sized,
    T: Send,
    F: for<'a> FnOnce(&'a mut dyn LedgerTransaction) -> TxFuture<'a, T> + Send,
{
    let mut tx = store.begin().await?;
    let result = work(tx.as_mut()).await;
    if let Err(e) = tx.rollback().await {
        warn!(operation, error = %e, "read-only ledger transaction rollback failed");
    }
    result
}
