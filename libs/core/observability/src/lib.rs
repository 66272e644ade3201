//! Observability utilities for the messaging core.
//!
//! This crate provides:
//! - Prometheus metrics recording and export
//! - Custom metrics for endpoint dispatch, JetStream outcomes, circuit
//!   breakers, the outbox processor, and sagas
//! - Axum middleware for automatic request metrics
//!
//! # Example
//!
//! ```rust,ignore
//! use observability::{init_metrics, metrics_handler, MessagingMetrics};
//!
//! // Initialize metrics recorder
//! init_metrics();
//!
//! // Record dispatch operations
//! MessagingMetrics::record_dispatch("employee.get", DispatchMode::RequestReply, DispatchOutcome::Success, 0.012);
//!
//! // Add metrics endpoint to router
//! let app = Router::new()
//!     .route("/metrics", get(metrics_handler));
//! ```

pub mod messaging;
pub mod middleware;

pub use messaging::{DispatchMode, DispatchOutcome, DispatchTimer, JetStreamOutcome, MessagingMetrics, SagaOutcome};
pub use middleware::MetricsLayer;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize the Prometheus metrics recorder.
///
/// This should be called once at application startup.
/// Returns the PrometheusHandle for rendering metrics.
pub fn init_metrics() -> &'static PrometheusHandle {
    METRICS_HANDLE.get_or_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("Failed to install Prometheus recorder");

        info!("Prometheus metrics recorder initialized");

        register_metric_descriptions();

        handle
    })
}

/// Get the metrics handle (must call init_metrics first)
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Axum handler for /metrics endpoint
pub async fn metrics_handler() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

/// Register metric descriptions for documentation
fn register_metric_descriptions() {
    use messaging::names;
    use metrics::describe_counter;
    use metrics::describe_gauge;
    use metrics::describe_histogram;

    // HTTP metrics (ambient, from the Axum middleware)
    describe_counter!("http_requests_total", "Total number of HTTP requests");
    describe_histogram!("http_request_duration_seconds", "HTTP request duration in seconds");
    describe_counter!("http_requests_errors_total", "Total number of HTTP request errors");

    // Endpoint dispatch metrics
    describe_counter!(names::ENDPOINT_DISPATCHES, "Total endpoint dispatches by mode and outcome");
    describe_histogram!(names::ENDPOINT_DISPATCH_DURATION, "Endpoint handler duration in seconds");

    // JetStream metrics
    describe_counter!(names::JETSTREAM_OUTCOMES, "Total JetStream message outcomes (acked/naked/dead_lettered)");

    // Circuit breaker metrics
    describe_gauge!(names::CIRCUIT_BREAKER_STATE, "Current circuit breaker state (0=closed, 1=open, 2=half-open)");
    describe_counter!(names::CIRCUIT_BREAKER_TRIPS, "Total closed-to-open circuit breaker transitions");

    // Outbox metrics
    describe_histogram!(names::OUTBOX_BATCH_SIZE, "Number of outbox rows processed per tick");
    describe_gauge!(names::OUTBOX_BACKLOG, "Pending outbox rows observed at the start of a tick");
    describe_counter!(names::OUTBOX_DEAD_LETTERED, "Total outbox rows moved to dead-lettered status");

    // Saga metrics
    describe_counter!(names::SAGA_OUTCOMES, "Total saga runs by terminal status (completed/compensated)");
}
