//! Bounded retry for transient database failures.

use std::future::Future;
use std::time::Duration;

use expensa_core::approval::ApprovalError;
use expensa_shared::ApprovalConfig;
use sea_orm::DbErr;
use tracing::warn;

/// Postgres SQLSTATEs and messages that indicate the operation may succeed on retry.
const TRANSIENT_MARKERS: &[&str] = &[
    "40001",
    "40P01",
    "could not serialize access",
    "deadlock detected",
    "lock timeout",
];

/// How often and how patiently to retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles each time.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(10))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        ApprovalConfig::default().into()
    }
}

impl From<ApprovalConfig> for RetryPolicy {
    fn from(config: ApprovalConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }
}

/// Maps a database error into the approval taxonomy.
///
/// Contention and lost connections become `ConcurrentModification` so the
/// caller retries; everything else is a plain database error.
pub fn map_db_err(err: DbErr) -> ApprovalError {
    if is_transient(&err) {
        ApprovalError::ConcurrentModification
    } else {
        ApprovalError::Database(err.to_string())
    }
}

/// Maps a failed `COMMIT`.
///
/// Serialization failures and deadlocks abort the transaction, so nothing
/// was stored and the caller may retry. Any other failure, a lost connection
/// included, leaves the outcome unknown and is never retried.
pub fn map_commit_err(err: DbErr) -> ApprovalError {
    let message = err.to_string();
    if TRANSIENT_MARKERS.iter().any(|m| message.contains(m)) {
        ApprovalError::ConcurrentModification
    } else {
        ApprovalError::Database(format!("commit outcome unknown: {message}"))
    }
}

fn is_transient(err: &DbErr) -> bool {
    if matches!(err, DbErr::ConnectionAcquire(_) | DbErr::Conn(_)) {
        return true;
    }
    let message = err.to_string();
    TRANSIENT_MARKERS.iter().any(|m| message.contains(m))
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent.
///
/// # Errors
///
/// Returns the last error produced by `op`.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, ApprovalError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApprovalError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}
