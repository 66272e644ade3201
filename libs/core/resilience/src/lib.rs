//! Retry and circuit-breaker wrapping for JetStream publishes.
//!
//! [`CircuitBreaker`] is time-windowed: it trips once the failure ratio over
//! a rolling sampling duration crosses a threshold, gated by a minimum
//! throughput so a cold start can't trip it on its first few calls.
//! [`retry::retry_with_backoff`] runs a bare retry loop; [`ResiliencePipeline`]
//! composes retry with the breaker for callers that want both together.

mod circuit_breaker;
mod pipeline;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitOpenError, CircuitState};
pub use pipeline::{ResilienceError, ResiliencePipeline};
pub use retry::retry_with_backoff;
