//! Composes retry-with-backoff and the circuit breaker into the single
//! wrapper the resilient publish client (component H) and the outbox
//! processor (component I) both apply to their JetStream publishes.

use crate::circuit_breaker::{CircuitBreaker, CircuitOpenError};
use messaging::RetryPolicy;
use std::future::Future;
use std::sync::Arc;

/// Error surfaced by [`ResilienceError`] — either the breaker rejected the
/// call outright, or every retry attempt against the underlying operation
/// failed.
#[derive(Debug, thiserror::Error)]
pub enum ResilienceError<E> {
    #[error("circuit breaker is open")]
    CircuitOpen,
    #[error(transparent)]
    Operation(E),
}

/// Wraps `operation` with retry-with-backoff on the inside and the circuit
/// breaker on the outside: each retry attempt consults and reports to the
/// breaker individually, so a breaker trip mid-retry stops further attempts
/// immediately instead of waiting out the full retry budget.
pub struct ResiliencePipeline {
    retry_policy: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
}

impl ResiliencePipeline {
    pub fn new(retry_policy: RetryPolicy, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            retry_policy,
            breaker,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            if self.breaker.guard().is_err() {
                return Err(ResilienceError::CircuitOpen);
            }
            match operation().await {
                Ok(value) => {
                    self.breaker.record_success();
                    return Ok(value);
                }
                Err(err) => {
                    self.breaker.record_failure();
                    attempt += 1;
                    if attempt >= self.retry_policy.max_attempts {
                        return Err(ResilienceError::Operation(err));
                    }
                    let delay = self.retry_policy.backoff.delay(attempt - 1);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.retry_policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "resilience pipeline retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl<E> From<CircuitOpenError> for ResilienceError<E> {
    fn from(_: CircuitOpenError) -> Self {
        ResilienceError::CircuitOpen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use messaging::BackoffStrategy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn pipeline() -> ResiliencePipeline {
        ResiliencePipeline::new(
            RetryPolicy {
                max_attempts: 3,
                backoff: BackoffStrategy::Fixed(Duration::from_millis(1)),
            },
            Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
                failure_ratio: 0.5,
                sampling_duration: Duration::from_secs(30),
                break_duration: Duration::from_secs(30),
                minimum_throughput: 100,
            })),
        )
    }

    #[tokio::test]
    async fn succeeds_on_first_try_and_records_success() {
        let pipeline = pipeline();
        let result: Result<u32, &str> = pipeline.run(|| async { Ok(5) }).await;
        assert!(matches!(result, Ok(5)));
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let pipeline = pipeline();
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = pipeline
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 1 { Err("transient") } else { Ok(9) } }
            })
            .await;
        assert!(matches!(result, Ok(9)));
    }

    #[tokio::test]
    async fn rejects_immediately_when_breaker_is_open() {
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            failure_ratio: 0.1,
            sampling_duration: Duration::from_secs(30),
            break_duration: Duration::from_secs(30),
            minimum_throughput: 1,
        }));
        breaker.record_failure();
        let pipeline = ResiliencePipeline::new(
            RetryPolicy {
                max_attempts: 3,
                backoff: BackoffStrategy::Fixed(Duration::from_millis(1)),
            },
            breaker,
        );
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = pipeline
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(1) }
            })
            .await;
        assert!(matches!(result, Err(ResilienceError::CircuitOpen)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
