//! Subscription Hosts (component F).
//!
//! Four long-running tasks, one per delivery mode, all started at process
//! ready and all driven by the same root [`Cancellation`]. Each host binds
//! the catalog's endpoints for its mode to the broker and funnels inbound
//! messages through the shared [`Invoker`]; per-message work is spawned onto
//! its own task so one slow handler never blocks the host's receive loop —
//! mirroring the `tokio::select!`-over-shutdown, spawn-per-message shape the
//! corpus's NATS/stream workers use (see `nats-worker`'s `worker.rs`), just
//! fanned out across four topologies instead of one.

use crate::catalog::{EndpointCatalog, RegisteredEndpoint};
use crate::context::Cancellation;
use crate::invoker::Invoker;
use crate::jetstream::{decide_outcome, should_route_to_dlq, ConsumerPolicy, DlqRouter, JetStreamSetup, MessageOutcome};
use async_nats::jetstream::AckKind;
use async_nats::Client;
use futures::StreamExt;
use messaging::ConnectionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Request-Reply Host (spec §4.F): subscribes to each endpoint's resolved
/// subject, invokes on every inbound message, and replies on the message's
/// reply subject with the serialized result or a numeric error code.
pub struct RequestReplyHost {
    registry: Arc<ConnectionRegistry>,
    invoker: Arc<Invoker>,
}

impl RequestReplyHost {
    pub fn new(registry: Arc<ConnectionRegistry>, invoker: Arc<Invoker>) -> Self {
        Self { registry, invoker }
    }

    pub async fn run(&self, catalog: Arc<EndpointCatalog>, cancellation: Cancellation) {
        let endpoints: Vec<&RegisteredEndpoint> = catalog.request_reply().collect();
        let mut tasks = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let registry = self.registry.clone();
            let invoker = self.invoker.clone();
            let descriptor = endpoint.descriptor.clone();
            let handler = endpoint.handler.clone();
            let cancellation = cancellation.clone();
            tasks.push(tokio::spawn(async move {
                let connection = match registry.connection(&descriptor.connection_name).await {
                    Ok(c) => c,
                    Err(e) => {
                        error!(connection = %descriptor.connection_name, error = %e, "request-reply host: connection unavailable");
                        return;
                    }
                };
                let subject = descriptor.resolved_subject();
                let mut subscriber = match connection.client.subscribe(subject.clone()).await {
                    Ok(s) => s,
                    Err(e) => {
                        error!(subject = %subject, error = %e, "failed to subscribe for request-reply");
                        return;
                    }
                };
                info!(subject = %subject, "request-reply host listening");

                let mut cancellation = cancellation;
                loop {
                    tokio::select! {
                        _ = cancellation.cancelled() => break,
                        next = subscriber.next() => {
                            let Some(message) = next else { break };
                            let Some(reply) = message.reply.clone() else {
                                warn!(subject = %subject, "request-reply message carried no reply subject, dropping");
                                continue;
                            };
                            let invoker = invoker.clone();
                            let client = connection.client.clone();
                            let descriptor = descriptor.clone();
                            let handler = handler.clone();
                            let cancellation = cancellation.clone();
                            tokio::spawn(async move {
                                serve_one(&invoker, &descriptor, &handler, message, reply, client, cancellation).await;
                            });
                        }
                    }
                }
            }));
        }
        for task in tasks {
            let _ = task.await;
        }
    }
}

async fn serve_one(
    invoker: &Invoker,
    descriptor: &crate::catalog::EndpointDescriptor,
    handler: &Arc<dyn crate::catalog::EndpointHandler>,
    message: async_nats::Message,
    reply: async_nats::Subject,
    client: Client,
    cancellation: Cancellation,
) {
    let result = invoker
        .invoke(descriptor, handler, &message.subject, &message.payload, message.headers.as_ref(), cancellation)
        .await;

    match result {
        Ok(Some(bytes)) => {
            if let Err(e) = client.publish(reply, bytes.into()).await {
                warn!(error = %e, "failed to publish request-reply response");
            }
        }
        Ok(None) => {
            if let Err(e) = client.publish(reply, Vec::new().into()).await {
                warn!(error = %e, "failed to publish empty request-reply response");
            }
        }
        Err(e) => {
            let body = format!("500 {e}");
            if let Err(publish_err) = client.publish(reply, body.into_bytes().into()).await {
                warn!(error = %publish_err, "failed to publish request-reply error response");
            }
        }
    }
}

/// Core Pub-Sub Host (spec §4.F): subscribe and fire-and-forget dispatch,
/// no ack, no redelivery.
pub struct CorePubSubHost {
    registry: Arc<ConnectionRegistry>,
    invoker: Arc<Invoker>,
}

impl CorePubSubHost {
    pub fn new(registry: Arc<ConnectionRegistry>, invoker: Arc<Invoker>) -> Self {
        Self { registry, invoker }
    }

    pub async fn run(&self, catalog: Arc<EndpointCatalog>, cancellation: Cancellation) {
        let endpoints: Vec<&RegisteredEndpoint> = catalog.core_pub_sub().collect();
        let mut tasks = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let registry = self.registry.clone();
            let invoker = self.invoker.clone();
            let descriptor = endpoint.descriptor.clone();
            let handler = endpoint.handler.clone();
            let cancellation = cancellation.clone();
            tasks.push(tokio::spawn(async move {
                let connection = match registry.connection(&descriptor.connection_name).await {
                    Ok(c) => c,
                    Err(e) => {
                        error!(connection = %descriptor.connection_name, error = %e, "core pub-sub host: connection unavailable");
                        return;
                    }
                };
                let subject = descriptor.resolved_subject();
                let mut subscriber = match connection.client.subscribe(subject.clone()).await {
                    Ok(s) => s,
                    Err(e) => {
                        error!(subject = %subject, error = %e, "failed to subscribe for core pub-sub");
                        return;
                    }
                };
                info!(subject = %subject, "core pub-sub host listening");

                let mut cancellation = cancellation;
                loop {
                    tokio::select! {
                        _ = cancellation.cancelled() => break,
                        next = subscriber.next() => {
                            let Some(message) = next else { break };
                            let invoker = invoker.clone();
                            let descriptor = descriptor.clone();
                            let handler = handler.clone();
                            let cancellation = cancellation.clone();
                            tokio::spawn(async move {
                                let span = info_span!("core_pub_sub_dispatch", subject = %message.subject);
                                async move {
                                    if let Err(e) = invoker
                                        .invoke(&descriptor, &handler, &message.subject, &message.payload, message.headers.as_ref(), cancellation)
                                        .await
                                    {
                                        error!(error = %e, "core pub-sub handler failed");
                                    }
                                }
                                .instrument(span)
                                .await;
                            });
                        }
                    }
                }
            }));
        }
        for task in tasks {
            let _ = task.await;
        }
    }
}

/// Applies invoke-then-ack/NAK/DLQ to a single JetStream message, shared by
/// both the continuous-consume and batch-fetch hosts (spec §4.G).
async fn handle_jetstream_message(
    invoker: &Invoker,
    descriptor: &crate::catalog::EndpointDescriptor,
    handler: &Arc<dyn crate::catalog::EndpointHandler>,
    dlq: &DlqRouter,
    policy: &ConsumerPolicy,
    cancellation: Cancellation,
    message: async_nats::jetstream::Message,
) {
    let delivery_attempt = message
        .info()
        .map(|i| i.delivered.saturating_sub(1) as u32)
        .unwrap_or(0);

    let result = invoker
        .invoke(descriptor, handler, &message.subject, &message.payload, message.headers.as_ref(), cancellation)
        .await;

    let Err(err) = result else {
        if let Err(e) = message.ack().await {
            warn!(error = %e, subject = %message.subject, "failed to ack successfully processed message");
        }
        return;
    };

    let category = err.category();
    let outcome = decide_outcome(category, delivery_attempt, policy);

    if should_route_to_dlq(outcome, policy) {
        dlq.send_to_dlq(&message.subject, &descriptor.stream_name, &message.payload, &err.to_string())
            .await;
    }

    match outcome {
        MessageOutcome::Ack => {
            if let Err(e) = message.ack().await {
                warn!(error = %e, subject = %message.subject, "failed to ack message after dlq routing");
            }
        }
        MessageOutcome::NakWithDelay(delay) => {
            if let Err(e) = message.ack_with(AckKind::Nak(Some(delay))).await {
                warn!(error = %e, subject = %message.subject, "failed to nak message");
            }
        }
    }
}

/// JetStream Consume Host (spec §4.F): continuous pull-consume iterator,
/// one dispatch task per message.
pub struct JsConsumeHost {
    registry: Arc<ConnectionRegistry>,
    invoker: Arc<Invoker>,
    policy: ConsumerPolicy,
}

impl JsConsumeHost {
    pub fn new(registry: Arc<ConnectionRegistry>, invoker: Arc<Invoker>, policy: ConsumerPolicy) -> Self {
        Self { registry, invoker, policy }
    }

    pub async fn run(&self, catalog: Arc<EndpointCatalog>, cancellation: Cancellation) {
        let endpoints: Vec<&RegisteredEndpoint> = catalog.js_consume().collect();
        let mut tasks = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let registry = self.registry.clone();
            let invoker = self.invoker.clone();
            let policy = self.policy.clone();
            let descriptor = endpoint.descriptor.clone();
            let handler = endpoint.handler.clone();
            let cancellation = cancellation.clone();
            tasks.push(tokio::spawn(async move {
                let connection = match registry.connection(&descriptor.connection_name).await {
                    Ok(c) => c,
                    Err(e) => {
                        error!(connection = %descriptor.connection_name, error = %e, "js-consume host: connection unavailable");
                        return;
                    }
                };
                let setup = JetStreamSetup::new(connection.jetstream.clone());
                if let Err(e) = setup.ensure_stream(&descriptor).await {
                    error!(stream = %descriptor.stream_name, error = %e, "failed to ensure stream");
                    return;
                }
                let consumer = match setup.ensure_consumer(&descriptor).await {
                    Ok(c) => c,
                    Err(e) => {
                        error!(consumer = %descriptor.consumer_name, error = %e, "failed to ensure consumer");
                        return;
                    }
                };
                let dlq = DlqRouter::new(connection.jetstream.clone(), policy.dlq_stream_suffix.clone());
                if policy.enable_dlq {
                    if let Err(e) = dlq.ensure_stream(&descriptor.stream_name).await {
                        error!(error = %e, "failed to ensure dlq stream");
                    }
                }

                let mut messages = match consumer.messages().await {
                    Ok(m) => m,
                    Err(e) => {
                        error!(error = %e, "failed to open continuous consume iterator");
                        return;
                    }
                };
                info!(stream = %descriptor.stream_name, consumer = %descriptor.consumer_name, "js-consume host listening");

                let mut cancellation = cancellation;
                loop {
                    tokio::select! {
                        _ = cancellation.cancelled() => break,
                        next = messages.next() => {
                            let Some(message) = next else { break };
                            let message = match message {
                                Ok(m) => m,
                                Err(e) => {
                                    warn!(error = %e, "error receiving from consume iterator");
                                    continue;
                                }
                            };
                            let invoker = invoker.clone();
                            let descriptor = descriptor.clone();
                            let handler = handler.clone();
                            let dlq = DlqRouter::new(connection.jetstream.clone(), policy.dlq_stream_suffix.clone());
                            let policy = policy.clone();
                            let cancellation = cancellation.clone();
                            tokio::spawn(async move {
                                handle_jetstream_message(&invoker, &descriptor, &handler, &dlq, &policy, cancellation, message).await;
                            });
                        }
                    }
                }
            }));
        }
        for task in tasks {
            let _ = task.await;
        }
    }
}

/// JetStream Fetch Host (spec §4.F): batch fetch-up-to-N with a short
/// expiry, suited to on-demand / scheduled workloads. On fetch error,
/// delays 1s and retries rather than tearing down the host.
pub struct JsFetchHost {
    registry: Arc<ConnectionRegistry>,
    invoker: Arc<Invoker>,
    policy: ConsumerPolicy,
    batch_size: usize,
    fetch_expiry: Duration,
}

impl JsFetchHost {
    pub fn new(registry: Arc<ConnectionRegistry>, invoker: Arc<Invoker>, policy: ConsumerPolicy) -> Self {
        Self {
            registry,
            invoker,
            policy,
            batch_size: 10,
            fetch_expiry: Duration::from_secs(5),
        }
    }

    pub async fn run(&self, catalog: Arc<EndpointCatalog>, cancellation: Cancellation) {
        let endpoints: Vec<&RegisteredEndpoint> = catalog.js_fetch().collect();
        let mut tasks = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let registry = self.registry.clone();
            let invoker = self.invoker.clone();
            let policy = self.policy.clone();
            let batch_size = self.batch_size;
            let fetch_expiry = self.fetch_expiry;
            let descriptor = endpoint.descriptor.clone();
            let handler = endpoint.handler.clone();
            let cancellation = cancellation.clone();
            tasks.push(tokio::spawn(async move {
                let connection = match registry.connection(&descriptor.connection_name).await {
                    Ok(c) => c,
                    Err(e) => {
                        error!(connection = %descriptor.connection_name, error = %e, "js-fetch host: connection unavailable");
                        return;
                    }
                };
                let setup = JetStreamSetup::new(connection.jetstream.clone());
                if let Err(e) = setup.ensure_stream(&descriptor).await {
                    error!(stream = %descriptor.stream_name, error = %e, "failed to ensure stream");
                    return;
                }
                let consumer = match setup.ensure_consumer(&descriptor).await {
                    Ok(c) => c,
                    Err(e) => {
                        error!(consumer = %descriptor.consumer_name, error = %e, "failed to ensure consumer");
                        return;
                    }
                };
                let dlq = DlqRouter::new(connection.jetstream.clone(), policy.dlq_stream_suffix.clone());
                if policy.enable_dlq {
                    if let Err(e) = dlq.ensure_stream(&descriptor.stream_name).await {
                        error!(error = %e, "failed to ensure dlq stream");
                    }
                }
                info!(stream = %descriptor.stream_name, consumer = %descriptor.consumer_name, "js-fetch host looping");

                let mut cancellation = cancellation;
                loop {
                    if cancellation.is_cancelled() {
                        break;
                    }

                    let batch = tokio::select! {
                        _ = cancellation.cancelled() => break,
                        batch = consumer.fetch().max_messages(batch_size).expires(fetch_expiry).messages() => batch,
                    };

                    let mut messages = match batch {
                        Ok(m) => m,
                        Err(e) => {
                            warn!(error = %e, "js-fetch batch fetch failed, retrying in 1s");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            continue;
                        }
                    };

                    let mut handled = 0;
                    while let Some(message) = messages.next().await {
                        handled += 1;
                        let message = match message {
                            Ok(m) => m,
                            Err(e) => {
                                warn!(error = %e, "error receiving from fetch batch");
                                continue;
                            }
                        };
                        handle_jetstream_message(&invoker, &descriptor, &handler, &dlq, &policy, cancellation.clone(), message).await;
                    }
                    debug!(handled, "js-fetch batch drained");
                }
            }));
        }
        for task in tasks {
            let _ = task.await;
        }
    }
}
