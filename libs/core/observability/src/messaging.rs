//! Messaging-core metrics.
//!
//! Prometheus-compatible counters/gauges/histograms for the signals
//! components D-J produce: endpoint dispatch, JetStream ack/nak/dlq
//! outcomes, circuit breaker state, the outbox processor, and saga
//! completion/compensation.
//!
//! ## Available Metrics
//!
//! - `messaging_endpoint_dispatches_total` - Counter of dispatches by mode and outcome
//! - `messaging_endpoint_dispatch_duration_seconds` - Histogram of handler duration
//! - `messaging_jetstream_outcomes_total` - Counter of ack/nak/dlq outcomes
//! - `messaging_circuit_breaker_state` - Gauge (0=closed, 1=open, 2=half-open)
//! - `messaging_circuit_breaker_trips_total` - Counter of open transitions
//! - `messaging_outbox_batch_size` - Histogram of rows processed per tick
//! - `messaging_outbox_backlog` - Gauge of pending rows observed at tick start
//! - `messaging_outbox_dead_lettered_total` - Counter of rows moved to DeadLettered
//! - `messaging_saga_outcomes_total` - Counter of saga runs by terminal status

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const ENDPOINT_DISPATCHES: &str = "messaging_endpoint_dispatches_total";
    pub const ENDPOINT_DISPATCH_DURATION: &str = "messaging_endpoint_dispatch_duration_seconds";
    pub const JETSTREAM_OUTCOMES: &str = "messaging_jetstream_outcomes_total";
    pub const CIRCUIT_BREAKER_STATE: &str = "messaging_circuit_breaker_state";
    pub const CIRCUIT_BREAKER_TRIPS: &str = "messaging_circuit_breaker_trips_total";
    pub const OUTBOX_BATCH_SIZE: &str = "messaging_outbox_batch_size";
    pub const OUTBOX_BACKLOG: &str = "messaging_outbox_backlog";
    pub const OUTBOX_DEAD_LETTERED: &str = "messaging_outbox_dead_lettered_total";
    pub const SAGA_OUTCOMES: &str = "messaging_saga_outcomes_total";
}

/// Delivery mode label for endpoint dispatch metrics, mirroring
/// `messaging_host::DeliveryMode` without creating a dependency edge from
/// this crate back onto `messaging-host`.
#[derive(Debug, Clone, Copy)]
pub enum DispatchMode {
    RequestReply,
    CorePubSub,
    JetStreamConsume,
    JetStreamFetch,
}

impl DispatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestReply => "request_reply",
            Self::CorePubSub => "core_pub_sub",
            Self::JetStreamConsume => "jetstream_consume",
            Self::JetStreamFetch => "jetstream_fetch",
        }
    }
}

/// Outcome of one endpoint dispatch.
#[derive(Debug, Clone, Copy)]
pub enum DispatchOutcome {
    Success,
    Error,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Outcome a JetStream message handler applied (spec §4.G).
#[derive(Debug, Clone, Copy)]
pub enum JetStreamOutcome {
    Acked,
    Naked,
    DeadLettered,
}

impl JetStreamOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acked => "acked",
            Self::Naked => "naked",
            Self::DeadLettered => "dead_lettered",
        }
    }
}

/// Terminal saga status for the outcome counter.
#[derive(Debug, Clone, Copy)]
pub enum SagaOutcome {
    Completed,
    Compensated,
}

impl SagaOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Compensated => "compensated",
        }
    }
}

/// Messaging-core metrics recorder.
pub struct MessagingMetrics;

impl MessagingMetrics {
    /// Record one endpoint dispatch (spec components D/E/F).
    pub fn record_dispatch(endpoint: &str, mode: DispatchMode, outcome: DispatchOutcome, duration_secs: f64) {
        counter!(
            names::ENDPOINT_DISPATCHES,
            "endpoint" => endpoint.to_string(),
            "mode" => mode.as_str(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
        histogram!(
            names::ENDPOINT_DISPATCH_DURATION,
            "endpoint" => endpoint.to_string(),
            "mode" => mode.as_str()
        )
        .record(duration_secs);
    }

    /// Record the ack/nak/dlq outcome the JetStream handler applied to one
    /// message (spec component G).
    pub fn record_jetstream_outcome(stream: &str, outcome: JetStreamOutcome) {
        counter!(
            names::JETSTREAM_OUTCOMES,
            "stream" => stream.to_string(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
    }

    /// Set the current circuit breaker state gauge for a named publish
    /// client (spec component H). `state` is 0 closed, 1 open, 2 half-open,
    /// matching `resilience::circuit_breaker::CircuitState`'s ordinal order.
    pub fn set_circuit_breaker_state(connection: &str, state: u8) {
        gauge!(names::CIRCUIT_BREAKER_STATE, "connection" => connection.to_string()).set(state as f64);
    }

    /// Record a closed-to-open circuit breaker transition.
    pub fn record_circuit_breaker_trip(connection: &str) {
        counter!(names::CIRCUIT_BREAKER_TRIPS, "connection" => connection.to_string()).increment(1);
    }

    /// Record one outbox processor tick (spec component I).
    pub fn record_outbox_tick(batch_size: usize, backlog: usize, dead_lettered: usize) {
        histogram!(names::OUTBOX_BATCH_SIZE).record(batch_size as f64);
        gauge!(names::OUTBOX_BACKLOG).set(backlog as f64);
        if dead_lettered > 0 {
            counter!(names::OUTBOX_DEAD_LETTERED).increment(dead_lettered as u64);
        }
    }

    /// Record a saga run reaching a terminal state (spec component J).
    pub fn record_saga_outcome(saga_type: &str, outcome: SagaOutcome) {
        counter!(
            names::SAGA_OUTCOMES,
            "saga_type" => saga_type.to_string(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
    }
}

/// Helper for timing a dispatch and recording it on drop if not stopped
/// manually, mirroring `stream-worker`'s `MetricsTimer`.
pub struct DispatchTimer {
    endpoint: String,
    mode: DispatchMode,
    start: std::time::Instant,
    stopped: bool,
}

impl DispatchTimer {
    pub fn start(endpoint: impl Into<String>, mode: DispatchMode) -> Self {
        Self {
            endpoint: endpoint.into(),
            mode,
            start: std::time::Instant::now(),
            stopped: false,
        }
    }

    pub fn stop(mut self, outcome: DispatchOutcome) {
        self.stopped = true;
        MessagingMetrics::record_dispatch(&self.endpoint, self.mode, outcome, self.start.elapsed().as_secs_f64());
    }
}

impl Drop for DispatchTimer {
    fn drop(&mut self) {
        if !self.stopped {
            MessagingMetrics::record_dispatch(&self.endpoint, self.mode, DispatchOutcome::Error, self.start.elapsed().as_secs_f64());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_mode_as_str() {
        assert_eq!(DispatchMode::RequestReply.as_str(), "request_reply");
        assert_eq!(DispatchMode::CorePubSub.as_str(), "core_pub_sub");
        assert_eq!(DispatchMode::JetStreamConsume.as_str(), "jetstream_consume");
        assert_eq!(DispatchMode::JetStreamFetch.as_str(), "jetstream_fetch");
    }

    #[test]
    fn jetstream_outcome_as_str() {
        assert_eq!(JetStreamOutcome::Acked.as_str(), "acked");
        assert_eq!(JetStreamOutcome::Naked.as_str(), "naked");
        assert_eq!(JetStreamOutcome::DeadLettered.as_str(), "dead_lettered");
    }

    #[test]
    fn saga_outcome_as_str() {
        assert_eq!(SagaOutcome::Completed.as_str(), "completed");
        assert_eq!(SagaOutcome::Compensated.as_str(), "compensated");
    }

    #[test]
    fn dispatch_timer_records_on_drop() {
        let timer = DispatchTimer::start("employee.get", DispatchMode::RequestReply);
        std::thread::sleep(std::time::Duration::from_millis(5));
        drop(timer);
    }

    #[test]
    fn dispatch_timer_records_on_explicit_stop() {
        let timer = DispatchTimer::start("employee.get", DispatchMode::RequestReply);
        timer.stop(DispatchOutcome::Success);
    }
}
