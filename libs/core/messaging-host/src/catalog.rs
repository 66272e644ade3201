//! Endpoint Catalog (component D).
//!
//! The source framework discovers endpoints by scanning handler classes for
//! attributes at startup. Systems languages without reflection-on-annotations
//! use explicit registration instead (see `messaging-host`'s crate docs): a
//! small builder produces the same [`EndpointDescriptor`] list that
//! reflection would have, and pairs each descriptor with a type-erased
//! handler closure built at registration time — the "typed bindings"
//! redesign means the request/response types are bound by the Rust compiler
//! at the call to `register_*`, not by a runtime argument binder.

use crate::context::Context;
use async_trait::async_trait;
use messaging::{DomainError, ProcessingError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

/// Delivery mode an endpoint is dispatched through. Precedence when derived
/// from richer metadata (see [`derive_mode`]): a declared response type means
/// request-reply; otherwise an explicit "core" delivery flag means
/// core pub-sub; otherwise an explicit "fetch" consumer mode means
/// JetStream fetch; otherwise JetStream continuous consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    RequestReply,
    CorePubSub,
    JetStreamConsume,
    JetStreamFetch,
}

/// Implements the mode-classification precedence from the data model: a
/// response payload takes priority, then an explicit core pub-sub flag, then
/// an explicit fetch-consumer flag, defaulting to continuous JetStream
/// consume. Exposed standalone so callers building their own registration
/// tooling (e.g. a macro or codegen step) can reuse the exact precedence
/// instead of re-deriving it.
pub fn derive_mode(has_response: bool, delivery_mode_core: bool, consumer_mode_fetch: bool) -> DeliveryMode {
    if has_response {
        DeliveryMode::RequestReply
    } else if delivery_mode_core {
        DeliveryMode::CorePubSub
    } else if consumer_mode_fetch {
        DeliveryMode::JetStreamFetch
    } else {
        DeliveryMode::JetStreamConsume
    }
}

/// Immutable, discovery-time metadata for one handler method bound to one
/// subject pattern. Shared read-only by every subscription host once the
/// catalog is built.
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    /// Conventional handler type name (e.g. `"EmployeeEventController"`),
    /// used to derive `[controller]` substitutions and default stream/consumer names.
    pub handler_name: String,
    pub method_name: String,
    pub subject_pattern: String,
    pub mode: DeliveryMode,
    pub connection_name: String,
    pub version: String,
    pub stream_name: String,
    pub consumer_name: String,
}

impl EndpointDescriptor {
    /// The concrete subscribe filter this endpoint binds to.
    pub fn resolved_subject(&self) -> String {
        messaging::resolve(&self.subject_pattern, &self.handler_name, Some(&self.method_name), Some(&self.version))
    }
}

fn default_stream_name(handler_name: &str, version: &str) -> String {
    format!("{}_v{}_stream", messaging::controller_name(handler_name), version).to_ascii_lowercase()
}

fn default_consumer_name(handler_name: &str, method_name: &str) -> String {
    format!(
        "{}_{}_consumer",
        messaging::controller_name(handler_name),
        method_name.to_ascii_lowercase()
    )
}

/// Options accepted by every `register_*` call. Only `subject_pattern` is
/// required; everything else falls back to the same defaults the source
/// framework's attribute scanner would have applied.
#[derive(Debug, Clone)]
pub struct EndpointOptions {
    pub handler_name: String,
    pub method_name: String,
    pub subject_pattern: String,
    pub connection_name: Option<String>,
    pub version: Option<String>,
    pub stream_name: Option<String>,
    pub consumer_name: Option<String>,
}

impl EndpointOptions {
    pub fn new(handler_name: impl Into<String>, method_name: impl Into<String>, subject_pattern: impl Into<String>) -> Self {
        Self {
            handler_name: handler_name.into(),
            method_name: method_name.into(),
            subject_pattern: subject_pattern.into(),
            connection_name: None,
            version: None,
            stream_name: None,
            consumer_name: None,
        }
    }

    pub fn connection(mut self, name: impl Into<String>) -> Self {
        self.connection_name = Some(name.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn stream(mut self, name: impl Into<String>) -> Self {
        self.stream_name = Some(name.into());
        self
    }

    pub fn consumer(mut self, name: impl Into<String>) -> Self {
        self.consumer_name = Some(name.into());
        self
    }

    fn into_descriptor(self, mode: DeliveryMode, default_connection: &str) -> EndpointDescriptor {
        let version = self.version.unwrap_or_else(|| "1".to_string());
        let stream_name = self
            .stream_name
            .unwrap_or_else(|| default_stream_name(&self.handler_name, &version));
        let consumer_name = self
            .consumer_name
            .unwrap_or_else(|| default_consumer_name(&self.handler_name, &self.method_name));

        EndpointDescriptor {
            handler_name: self.handler_name,
            method_name: self.method_name,
            subject_pattern: self.subject_pattern,
            mode,
            connection_name: self.connection_name.unwrap_or_else(|| default_connection.to_string()),
            version,
            stream_name,
            consumer_name,
        }
    }
}

/// Type-erased invocation surface every registered endpoint implements.
/// `body` is the raw inbound payload; the returned bytes (if any) are the
/// serialized response for request-reply endpoints.
#[async_trait]
pub trait EndpointHandler: Send + Sync {
    async fn handle(&self, body: &[u8], ctx: Context) -> Result<Option<Vec<u8>>, ProcessingError>;
}

struct TypedHandler<Req, Res, F, Fut> {
    handler: F,
    _marker: std::marker::PhantomData<fn(Req) -> (Res, Fut)>,
}

fn deserialize_body<Req: DeserializeOwned + Default>(body: &[u8]) -> Result<Req, ProcessingError> {
    if body.is_empty() {
        // Zero-length payload is passed through as the request's default
        // value (the closest static-typed analogue of "null").
        return Ok(Req::default());
    }
    serde_json::from_slice(body).map_err(|e| ProcessingError::Deserialization(e.to_string()))
}

#[async_trait]
impl<Req, Res, F, Fut> EndpointHandler for TypedHandler<Req, Res, F, Fut>
where
    Req: DeserializeOwned + Default + Send + Sync + 'static,
    Res: Serialize + Send + Sync + 'static,
    F: Fn(Req, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Res, DomainError>> + Send + 'static,
{
    async fn handle(&self, body: &[u8], ctx: Context) -> Result<Option<Vec<u8>>, ProcessingError> {
        let request: Req = deserialize_body(body)?;
        let response = (self.handler)(request, ctx).await.map_err(ProcessingError::from_domain)?;
        let bytes = serde_json::to_vec(&response).map_err(|e| ProcessingError::Deserialization(e.to_string()))?;
        Ok(Some(bytes))
    }
}

struct VoidHandler<Req, F, Fut> {
    handler: F,
    _marker: std::marker::PhantomData<fn(Req) -> Fut>,
}

#[async_trait]
impl<Req, F, Fut> EndpointHandler for VoidHandler<Req, F, Fut>
where
    Req: DeserializeOwned + Default + Send + Sync + 'static,
    F: Fn(Req, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
{
    async fn handle(&self, body: &[u8], ctx: Context) -> Result<Option<Vec<u8>>, ProcessingError> {
        let request: Req = deserialize_body(body)?;
        (self.handler)(request, ctx).await.map_err(ProcessingError::from_domain)?;
        Ok(None)
    }
}

/// One entry in the built catalog: immutable discovery metadata plus the
/// type-erased closure that deserializes, dispatches, and serializes.
pub struct RegisteredEndpoint {
    pub descriptor: EndpointDescriptor,
    pub handler: Arc<dyn EndpointHandler>,
}

/// Builds an [`EndpointCatalog`] via explicit registration. This is the
/// redesign's replacement for attribute scanning: call one `register_*` per
/// handler method, in any order, then [`EndpointCatalogBuilder::build`].
pub struct EndpointCatalogBuilder {
    default_connection: String,
    entries: Vec<RegisteredEndpoint>,
}

impl EndpointCatalogBuilder {
    pub fn new(default_connection: impl Into<String>) -> Self {
        Self {
            default_connection: default_connection.into(),
            entries: Vec::new(),
        }
    }

    /// Register a request-reply endpoint: the handler returns a response
    /// payload that is serialized into the service reply.
    pub fn register_request_reply<Req, Res, F, Fut>(mut self, options: EndpointOptions, handler: F) -> Self
    where
        Req: DeserializeOwned + Default + Send + Sync + 'static,
        Res: Serialize + Send + Sync + 'static,
        F: Fn(Req, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, DomainError>> + Send + 'static,
    {
        let descriptor = options.into_descriptor(DeliveryMode::RequestReply, &self.default_connection);
        let handler = Arc::new(TypedHandler {
            handler,
            _marker: std::marker::PhantomData,
        });
        self.entries.push(RegisteredEndpoint { descriptor, handler });
        self
    }

    /// Register a core pub-sub endpoint: fire-and-forget, no ack/reply.
    pub fn register_core_pub_sub<Req, F, Fut>(mut self, options: EndpointOptions, handler: F) -> Self
    where
        Req: DeserializeOwned + Default + Send + Sync + 'static,
        F: Fn(Req, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        let descriptor = options.into_descriptor(DeliveryMode::CorePubSub, &self.default_connection);
        let handler = Arc::new(VoidHandler {
            handler,
            _marker: std::marker::PhantomData,
        });
        self.entries.push(RegisteredEndpoint { descriptor, handler });
        self
    }

    /// Register a JetStream continuous-consume endpoint (component G applies ack/NAK/DLQ).
    pub fn register_js_consume<Req, F, Fut>(mut self, options: EndpointOptions, handler: F) -> Self
    where
        Req: DeserializeOwned + Default + Send + Sync + 'static,
        F: Fn(Req, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        let descriptor = options.into_descriptor(DeliveryMode::JetStreamConsume, &self.default_connection);
        let handler = Arc::new(VoidHandler {
            handler,
            _marker: std::marker::PhantomData,
        });
        self.entries.push(RegisteredEndpoint { descriptor, handler });
        self
    }

    /// Register a JetStream batch-fetch endpoint, for on-demand/scheduled workloads.
    pub fn register_js_fetch<Req, F, Fut>(mut self, options: EndpointOptions, handler: F) -> Self
    where
        Req: DeserializeOwned + Default + Send + Sync + 'static,
        F: Fn(Req, Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        let descriptor = options.into_descriptor(DeliveryMode::JetStreamFetch, &self.default_connection);
        let handler = Arc::new(VoidHandler {
            handler,
            _marker: std::marker::PhantomData,
        });
        self.entries.push(RegisteredEndpoint { descriptor, handler });
        self
    }

    pub fn build(self) -> EndpointCatalog {
        EndpointCatalog { entries: self.entries }
    }
}

/// Immutable, shared-read-only set of registered endpoints, partitioned by
/// delivery mode for the four subscription hosts.
pub struct EndpointCatalog {
    entries: Vec<RegisteredEndpoint>,
}

impl EndpointCatalog {
    pub fn all(&self) -> &[RegisteredEndpoint] {
        &self.entries
    }

    pub fn request_reply(&self) -> impl Iterator<Item = &RegisteredEndpoint> {
        self.entries.iter().filter(|e| e.descriptor.mode == DeliveryMode::RequestReply)
    }

    pub fn core_pub_sub(&self) -> impl Iterator<Item = &RegisteredEndpoint> {
        self.entries.iter().filter(|e| e.descriptor.mode == DeliveryMode::CorePubSub)
    }

    pub fn js_consume(&self) -> impl Iterator<Item = &RegisteredEndpoint> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.mode == DeliveryMode::JetStreamConsume)
    }

    pub fn js_fetch(&self) -> impl Iterator<Item = &RegisteredEndpoint> {
        self.entries.iter().filter(|e| e.descriptor.mode == DeliveryMode::JetStreamFetch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    struct Req {
        #[allow(dead_code)]
        id: Option<String>,
    }

    #[derive(Debug, Serialize)]
    struct Res {
        ok: bool,
    }

    #[test]
    fn mode_precedence_matches_data_model() {
        assert_eq!(derive_mode(true, true, true), DeliveryMode::RequestReply);
        assert_eq!(derive_mode(false, true, false), DeliveryMode::CorePubSub);
        assert_eq!(derive_mode(false, false, true), DeliveryMode::JetStreamFetch);
        assert_eq!(derive_mode(false, false, false), DeliveryMode::JetStreamConsume);
    }

    #[test]
    fn defaults_stream_and_consumer_names() {
        let catalog = EndpointCatalogBuilder::new("default")
            .register_request_reply(
                EndpointOptions::new("EmployeeEventController", "GetEmployee", "[controller].v{version:apiVersion}.{id}.get"),
                |_req: Req, _ctx| async move { Ok(Res { ok: true }) },
            )
            .build();

        let endpoint = catalog.request_reply().next().expect("one endpoint registered");
        assert_eq!(endpoint.descriptor.stream_name, "employee_v1_stream");
        assert_eq!(endpoint.descriptor.consumer_name, "employee_getemployee_consumer");
        assert_eq!(endpoint.descriptor.resolved_subject(), "employee.v1.*.get");
    }

    #[test]
    fn explicit_overrides_win_over_defaults() {
        let catalog = EndpointCatalogBuilder::new("default")
            .register_js_consume(
                EndpointOptions::new("EmployeeEventController", "OnHired", "[controller].hired")
                    .stream("custom_stream")
                    .consumer("custom_consumer")
                    .connection("secondary"),
                |_req: Req, _ctx| async move { Ok(()) },
            )
            .build();

        let endpoint = catalog.js_consume().next().expect("one endpoint registered");
        assert_eq!(endpoint.descriptor.stream_name, "custom_stream");
        assert_eq!(endpoint.descriptor.consumer_name, "custom_consumer");
        assert_eq!(endpoint.descriptor.connection_name, "secondary");
    }

    #[tokio::test]
    async fn empty_body_deserializes_to_default_request() {
        let catalog = EndpointCatalogBuilder::new("default")
            .register_core_pub_sub(
                EndpointOptions::new("EmployeeEventController", "Ping", "[controller].ping"),
                |req: Req, _ctx| async move {
                    assert!(req.id.is_none());
                    Ok(())
                },
            )
            .build();

        let endpoint = catalog.core_pub_sub().next().unwrap();
        let ctx = crate::context::Context::new(
            "employee.ping",
            Default::default(),
            messaging::TraceContext::generate(),
            crate::context::Cancellation::new(tokio::sync::watch::channel(false).1),
        );
        let result = endpoint.handler.handle(&[], ctx).await.unwrap();
        assert!(result.is_none());
    }
}
