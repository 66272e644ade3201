//! JetStream Message Handler (component G).
//!
//! Ensures the stream and durable consumer an endpoint needs exist, then
//! applies the ack/NAK/DLQ policy to each delivered message: success acks,
//! a transient failure under the redelivery cap NAKs with a fixed delay,
//! and anything else (transient over the cap, or any non-transient failure)
//! is routed to the dead-letter stream and acked so the source stream never
//! blocks on a message that can't make progress.

use crate::catalog::EndpointDescriptor;
use async_nats::jetstream::consumer::pull::Config as PullConsumerConfig;
use async_nats::jetstream::consumer::{AckPolicy, Consumer};
use async_nats::jetstream::stream::Config as StreamConfig;
use async_nats::jetstream::Context as JetStreamContext;
use async_nats::HeaderMap;
use chrono::Utc;
use messaging::ErrorCategory;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum JetStreamHostError {
    #[error("jetstream operation failed: {0}")]
    JetStream(String),
}

/// Configuration for the JetStream message handler (spec §6 `consumer.*`).
#[derive(Debug, Clone)]
pub struct ConsumerPolicy {
    pub max_redeliveries: u32,
    pub nak_delay: Duration,
    pub enable_dlq: bool,
    pub dlq_stream_suffix: String,
}

impl Default for ConsumerPolicy {
    fn default() -> Self {
        Self {
            max_redeliveries: 5,
            nak_delay: Duration::from_secs(5),
            enable_dlq: true,
            dlq_stream_suffix: "-dlq".to_string(),
        }
    }
}

impl From<core_config::messaging::ConsumerPolicyConfig> for ConsumerPolicy {
    fn from(config: core_config::messaging::ConsumerPolicyConfig) -> Self {
        Self {
            max_redeliveries: config.max_redeliveries,
            nak_delay: config.nak_delay,
            enable_dlq: config.enable_dlq,
            dlq_stream_suffix: config.dlq_stream_suffix,
        }
    }
}

/// Ensures streams and durable consumers exist for JetStream-mode endpoints.
pub struct JetStreamSetup {
    jetstream: JetStreamContext,
}

impl JetStreamSetup {
    pub fn new(jetstream: JetStreamContext) -> Self {
        Self { jetstream }
    }

    /// Create the endpoint's stream if missing, or append its resolved
    /// subject to the filter list if the stream already exists without it.
    pub async fn ensure_stream(&self, descriptor: &EndpointDescriptor) -> Result<(), JetStreamHostError> {
        let subject = descriptor.resolved_subject();

        match self.jetstream.get_stream(&descriptor.stream_name).await {
            Ok(mut stream) => {
                let info = stream
                    .info()
                    .await
                    .map_err(|e| JetStreamHostError::JetStream(e.to_string()))?;
                if !info.config.subjects.contains(&subject) {
                    let mut subjects = info.config.subjects.clone();
                    subjects.push(subject.clone());
                    info!(stream = %descriptor.stream_name, subject = %subject, "adding subject to existing stream");
                    self.jetstream
                        .update_stream(StreamConfig {
                            subjects,
                            ..info.config.clone()
                        })
                        .await
                        .map_err(|e| JetStreamHostError::JetStream(e.to_string()))?;
                }
                Ok(())
            }
            Err(_) => {
                info!(stream = %descriptor.stream_name, subject = %subject, "creating stream");
                self.jetstream
                    .create_stream(StreamConfig {
                        name: descriptor.stream_name.clone(),
                        subjects: vec![subject],
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| JetStreamHostError::JetStream(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// Create or fetch the endpoint's durable pull consumer with explicit ack.
    pub async fn ensure_consumer(&self, descriptor: &EndpointDescriptor) -> Result<Consumer<PullConsumerConfig>, JetStreamHostError> {
        let stream = self
            .jetstream
            .get_stream(&descriptor.stream_name)
            .await
            .map_err(|e| JetStreamHostError::JetStream(e.to_string()))?;

        let subject = descriptor.resolved_subject();

        match stream.get_consumer::<PullConsumerConfig>(&descriptor.consumer_name).await {
            Ok(consumer) => Ok(consumer),
            Err(_) => {
                info!(consumer = %descriptor.consumer_name, stream = %descriptor.stream_name, "creating consumer");
                let consumer = stream
                    .create_consumer(PullConsumerConfig {
                        durable_name: Some(descriptor.consumer_name.clone()),
                        name: Some(descriptor.consumer_name.clone()),
                        ack_policy: AckPolicy::Explicit,
                        filter_subject: subject,
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| JetStreamHostError::JetStream(e.to_string()))?;
                Ok(consumer)
            }
        }
    }
}

/// Routes exhausted messages to the dead-letter stream.
///
/// The source framework derives the DLQ subject as `{originalSubject}.dlq`
/// but declares the DLQ stream's filter as the two-segment pattern `*.dlq` —
/// a mismatch flagged as an open question, since resolved subjects here have
/// more than two segments. We widen the filter to the bare remainder
/// wildcard `>`, which matches a DLQ subject of any depth.
pub struct DlqRouter {
    jetstream: JetStreamContext,
    suffix: String,
}

impl DlqRouter {
    pub fn new(jetstream: JetStreamContext, suffix: impl Into<String>) -> Self {
        Self {
            jetstream,
            suffix: suffix.into(),
        }
    }

    fn dlq_stream_name(&self, source_stream: &str) -> String {
        format!("{source_stream}{}", self.suffix)
    }

    pub async fn ensure_stream(&self, source_stream: &str) -> Result<(), JetStreamHostError> {
        let dlq_stream = self.dlq_stream_name(source_stream);
        match self.jetstream.get_stream(&dlq_stream).await {
            Ok(_) => Ok(()),
            Err(_) => {
                info!(stream = %dlq_stream, "creating dlq stream");
                self.jetstream
                    .create_stream(StreamConfig {
                        name: dlq_stream,
                        subjects: vec![">".to_string()],
                        max_age: Duration::from_secs(30 * 24 * 60 * 60),
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| JetStreamHostError::JetStream(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// Publish the original payload to the DLQ, adding the DLQ headers.
    /// Failures are logged and swallowed — the caller still acks the source
    /// message so a sideline publish failure never blocks the stream.
    pub async fn send_to_dlq(&self, source_subject: &str, source_stream: &str, payload: &[u8], error: &str) {
        let dlq_subject = format!("{source_subject}.dlq");

        let mut headers = HeaderMap::new();
        headers.insert("X-Dlq-Error", error);
        headers.insert("X-Dlq-Subject", source_subject);
        headers.insert("X-Dlq-Timestamp", Utc::now().to_rfc3339().as_str());

        let publish = self
            .jetstream
            .publish_with_headers(dlq_subject.clone(), headers, payload.to_vec().into())
            .await;

        match publish {
            Ok(ack) => match ack.await {
                Ok(_) => debug!(subject = %dlq_subject, "published to dlq"),
                Err(e) => warn!(subject = %dlq_subject, error = %e, "dlq publish ack failed"),
            },
            Err(e) => {
                let _ = source_stream;
                warn!(subject = %dlq_subject, error = %e, "dlq publish failed")
            }
        }
    }
}

/// Outcome the caller (a subscription host) should apply to the underlying
/// broker message after [`apply_error_policy`] classifies a handler failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Ack,
    NakWithDelay(Duration),
}

/// Pure decision function: given the error category, the delivery attempt,
/// and the configured policy, decide whether to NAK with a delay or route to
/// the DLQ (the caller performs the DLQ publish; this only decides which
/// final broker action to take). Kept separate from I/O so the policy is
/// unit-testable without a running broker.
pub fn decide_outcome(category: ErrorCategory, delivery_attempt: u32, policy: &ConsumerPolicy) -> MessageOutcome {
    let is_retryable_category = matches!(category, ErrorCategory::Transient | ErrorCategory::RateLimited);
    if is_retryable_category && delivery_attempt < policy.max_redeliveries {
        MessageOutcome::NakWithDelay(policy.nak_delay)
    } else {
        MessageOutcome::Ack
    }
}

/// Whether a failure at this delivery attempt should be routed to the DLQ
/// before the final broker action is applied.
pub fn should_route_to_dlq(outcome: MessageOutcome, policy: &ConsumerPolicy) -> bool {
    policy.enable_dlq && outcome == MessageOutcome::Ack
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_under_cap_naks_with_configured_delay() {
        let policy = ConsumerPolicy::default();
        let outcome = decide_outcome(ErrorCategory::Transient, 0, &policy);
        assert_eq!(outcome, MessageOutcome::NakWithDelay(Duration::from_secs(5)));
        assert!(!should_route_to_dlq(outcome, &policy));
    }

    #[test]
    fn transient_over_cap_routes_to_dlq_and_acks() {
        let policy = ConsumerPolicy::default();
        let outcome = decide_outcome(ErrorCategory::Transient, 5, &policy);
        assert_eq!(outcome, MessageOutcome::Ack);
        assert!(should_route_to_dlq(outcome, &policy));
    }

    #[test]
    fn permanent_always_routes_to_dlq_and_acks() {
        let policy = ConsumerPolicy::default();
        let outcome = decide_outcome(ErrorCategory::Permanent, 0, &policy);
        assert_eq!(outcome, MessageOutcome::Ack);
        assert!(should_route_to_dlq(outcome, &policy));
    }

    #[test]
    fn dlq_disabled_skips_routing_but_still_acks() {
        let policy = ConsumerPolicy {
            enable_dlq: false,
            ..ConsumerPolicy::default()
        };
        let outcome = decide_outcome(ErrorCategory::Permanent, 0, &policy);
        assert_eq!(outcome, MessageOutcome::Ack);
        assert!(!should_route_to_dlq(outcome, &policy));
    }
}
