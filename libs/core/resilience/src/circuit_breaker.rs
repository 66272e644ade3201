//! Time-windowed circuit breaker.
//!
//! Unlike a count-windowed breaker (trip after N consecutive failures), this
//! one matches the spec's resilience knobs directly: a failure *ratio* over a
//! rolling *sampling duration*, gated by a *minimum throughput* so a handful
//! of calls early in a window can't trip it on a single failure.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Configuration for [`CircuitBreaker`] (spec §6 `resilience.*`).
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Fraction of failed calls (0.0-1.0) within the sampling window that trips the breaker.
    pub failure_ratio: f64,
    /// Rolling window over which the failure ratio is computed.
    pub sampling_duration: Duration,
    /// How long the breaker stays open before allowing a trial call.
    pub break_duration: Duration,
    /// Minimum number of calls in the window before the ratio is evaluated.
    pub minimum_throughput: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_ratio: 0.5,
            sampling_duration: Duration::from_secs(30),
            break_duration: Duration::from_secs(30),
            minimum_throughput: 10,
        }
    }
}

impl From<core_config::messaging::ResilienceConfig> for CircuitBreakerConfig {
    fn from(config: core_config::messaging::ResilienceConfig) -> Self {
        Self {
            failure_ratio: config.failure_ratio,
            sampling_duration: config.sampling_duration,
            break_duration: config.break_duration,
            minimum_throughput: config.minimum_throughput,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    opened_at: Option<Instant>,
    samples: VecDeque<(Instant, bool)>,
    half_open_probe_in_flight: bool,
}

/// A circuit breaker guarding a single downstream operation (a JetStream
/// publish, an outbox tick). Safe to share across tasks via `Arc`.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

/// Returned by [`CircuitBreaker::guard`] when a call should not proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitOpenError;

impl std::fmt::Display for CircuitOpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "circuit breaker is open")
    }
}

impl std::error::Error for CircuitOpenError {}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                opened_at: None,
                samples: VecDeque::new(),
                half_open_probe_in_flight: false,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("circuit breaker mutex poisoned").state
    }

    /// Check whether a call may proceed. When the breaker is open but the
    /// break duration has elapsed, this transitions to half-open and admits
    /// exactly one probe call; subsequent calls are rejected until that
    /// probe records its outcome.
    pub fn guard(&self) -> Result<(), CircuitOpenError> {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => {
                if inner.half_open_probe_in_flight {
                    Err(CircuitOpenError)
                } else {
                    inner.half_open_probe_in_flight = true;
                    Ok(())
                }
            }
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::MAX);
                if elapsed >= self.config.break_duration {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_probe_in_flight = true;
                    tracing::info!("circuit breaker half-open: admitting trial call");
                    Ok(())
                } else {
                    Err(CircuitOpenError)
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.samples.clear();
                inner.half_open_probe_in_flight = false;
                tracing::info!("circuit breaker closed: trial call succeeded");
            }
            CircuitState::Closed => {
                self.push_sample(&mut inner, false);
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");
        match inner.state {
            CircuitState::HalfOpen => {
                self.open(&mut inner);
            }
            CircuitState::Closed => {
                self.push_sample(&mut inner, true);
                self.evaluate(&mut inner);
            }
            CircuitState::Open => {}
        }
    }

    fn push_sample(&self, inner: &mut Inner, failed: bool) {
        let now = Instant::now();
        inner.samples.push_back((now, failed));
        let cutoff = now - self.config.sampling_duration;
        while matches!(inner.samples.front(), Some((t, _)) if *t < cutoff) {
            inner.samples.pop_front();
        }
    }

    fn evaluate(&self, inner: &mut Inner) {
        let total = inner.samples.len() as u32;
        if total < self.config.minimum_throughput {
            return;
        }
        let failures = inner.samples.iter().filter(|(_, failed)| *failed).count() as f64;
        if failures / total as f64 >= self.config.failure_ratio {
            self.open(inner);
        }
    }

    fn open(&self, inner: &mut Inner) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.half_open_probe_in_flight = false;
        inner.samples.clear();
        tracing::warn!("circuit breaker opened");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_ratio: 0.5,
            sampling_duration: Duration::from_secs(30),
            break_duration: Duration::from_millis(20),
            minimum_throughput: 4,
        }
    }

    #[test]
    fn stays_closed_below_minimum_throughput() {
        let breaker = CircuitBreaker::new(config());
        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn opens_once_failure_ratio_and_throughput_are_met() {
        let breaker = CircuitBreaker::new(config());
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.guard(), Err(CircuitOpenError));
    }

    #[test]
    fn half_open_after_break_duration_then_closes_on_success() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..4 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        sleep(Duration::from_millis(30));
        assert!(breaker.guard().is_ok());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_reopens_on_failure() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..4 {
            breaker.record_failure();
        }
        sleep(Duration::from_millis(30));
        assert!(breaker.guard().is_ok());
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_rejects_concurrent_probes() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..4 {
            breaker.record_failure();
        }
        sleep(Duration::from_millis(30));
        assert!(breaker.guard().is_ok());
        assert_eq!(breaker.guard(), Err(CircuitOpenError));
    }
}
