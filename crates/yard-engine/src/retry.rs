//! Reload-and-retry of units of work.

use std::future::Future;

use crate::config::RetryPolicy;
use crate::error::{EngineError, EngineResult};

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up.
///
/// `op` receives the 1-based attempt number and must reload whatever state
/// it depends on, since a retry follows a concurrency conflict.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, unit: &str, mut op: F) -> EngineResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => {
                if attempt >= attempts {
                    return Err(EngineError::RetryExhausted {
                        attempts,
                        last: e.to_string(),
                    });
                }
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    unit,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Conflict, reloading and retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use yard_store::StorageError;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_retries_conflicts_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&policy(), "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(EngineError::Storage(StorageError::Conflict("busy".into())))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_reported() {
        let result: EngineResult<()> = with_retry(&policy(), "test", |_| async {
            Err(EngineError::Storage(StorageError::Conflict("busy".into())))
        })
        .await;
        assert!(matches!(result, Err(EngineError::RetryExhausted { attempts: 3, .. })));
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: EngineResult<()> = with_retry(&policy(), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::SeverityUnmapped { amount_minor: 1 }) }
        })
        .await;
        assert!(matches!(result, Err(EngineError::SeverityUnmapped { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
