//! Bounded exponential backoff for transient backend failures.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{HalError, HalResult};

/// Retry policy with exponential backoff.
///
/// Only errors classified transient by [`HalError::is_transient`] are
/// retried; validation errors and permanent job failures surface on the
/// first attempt. The delay doubles per attempt and is capped at
/// `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries (single attempt).
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Run `op`, retrying transient failures up to the attempt budget.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> HalResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = HalResult<T>>,
    {
        let mut delay = self.base_delay;
        let attempts = self.max_attempts.max(1);
        for attempt in 1..=attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "transient backend error, retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.max_delay);
                }
                Err(e) => return Err(e),
            }
        }
        // The loop always returns on its last attempt.
        Err(HalError::Transient("retry budget exhausted".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = quick_policy(3)
            .run(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(HalError::Transient("flaky".into()))
                } else {
                    Ok(42)
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: HalResult<()> = quick_policy(3)
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(HalError::JobFailed("broken".into()))
            })
            .await;
        assert!(matches!(result, Err(HalError::JobFailed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_surfaces_last_error() {
        let calls = AtomicU32::new(0);
        let result: HalResult<()> = quick_policy(2)
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(HalError::Transient("still down".into()))
            })
            .await;
        assert!(matches!(result, Err(HalError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
