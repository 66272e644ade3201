//! Endpoint catalog, invoker/middleware pipeline, subscription hosts, and
//! resilient publish client built on top of `messaging`.
//!
//! The source framework discovers handlers by reflecting over attributes
//! at startup and keeps trace context and cancellation on ambient
//! async-local state. Neither translates to a systems language: this crate
//! replaces reflection with an explicit registration builder ([`catalog`])
//! and ambient state with an explicit [`context::Context`] threaded through
//! every handler call ([`invoker`]). Four [`hosts`] implement the delivery
//! modes the catalog can produce; [`jetstream`] owns the JetStream-specific
//! stream/consumer setup and ack/NAK/DLQ policy; [`publish`] is the
//! resilient outbound counterpart used by handlers and the outbox
//! processor alike.

pub mod catalog;
pub mod context;
pub mod hosts;
pub mod invoker;
pub mod jetstream;
pub mod publish;

pub use catalog::{
    DeliveryMode, EndpointCatalog, EndpointCatalogBuilder, EndpointDescriptor, EndpointHandler, EndpointOptions, RegisteredEndpoint,
};
pub use context::{Cancellation, Context, SubjectBinding};
pub use hosts::{CorePubSubHost, JsConsumeHost, JsFetchHost, RequestReplyHost};
pub use invoker::{AuditLoggingMiddleware, Invoker, Middleware, Next};
pub use jetstream::{decide_outcome, should_route_to_dlq, ConsumerPolicy, DlqRouter, JetStreamHostError, JetStreamSetup, MessageOutcome};
pub use publish::{PublishClient, PublishClientFactory, PublishError};
