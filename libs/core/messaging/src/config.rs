//! Backoff and retry policy primitives shared by the outbox processor and the
//! resilient publish client's retry wrapper.

use std::time::Duration;

/// Backoff strategy for retries.
#[derive(Debug, Clone)]
pub enum BackoffStrategy {
    /// Fixed delay between retries.
    Fixed(Duration),
    /// Exponential backoff (`base * 2^retry_count`, capped at `max`).
    Exponential { base: Duration, max: Duration },
    /// Linear backoff (`base * (retry_count + 1)`, capped at `max`).
    Linear { base: Duration, max: Duration },
}

impl BackoffStrategy {
    /// Calculate the delay for a given retry count.
    pub fn delay(&self, retry_count: u32) -> Duration {
        match self {
            BackoffStrategy::Fixed(d) => *d,
            BackoffStrategy::Exponential { base, max } => {
                let delay = base.saturating_mul(2u32.saturating_pow(retry_count));
                delay.min(*max)
            }
            BackoffStrategy::Linear { base, max } => {
                let delay = base.saturating_mul(retry_count + 1);
                delay.min(*max)
            }
        }
    }
}

/// Retry policy for the resilient publish client (component H).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential {
                base: Duration::from_secs(1),
                max: Duration::from_secs(30),
            },
        }
    }
}

impl From<core_config::messaging::ResilienceConfig> for RetryPolicy {
    fn from(config: core_config::messaging::ResilienceConfig) -> Self {
        Self {
            max_attempts: config.max_retry_attempts,
            backoff: BackoffStrategy::Exponential {
                base: config.base_delay,
                max: config.break_duration,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_caps() {
        let backoff = BackoffStrategy::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        };
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(5), Duration::from_secs(30));
    }

    #[test]
    fn linear_backoff_caps() {
        let backoff = BackoffStrategy::Linear {
            base: Duration::from_secs(5),
            max: Duration::from_secs(60),
        };
        assert_eq!(backoff.delay(0), Duration::from_secs(5));
        assert_eq!(backoff.delay(2), Duration::from_secs(15));
        assert_eq!(backoff.delay(20), Duration::from_secs(60));
    }
}
