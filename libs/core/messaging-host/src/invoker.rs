//! Invoker + Middleware Pipeline (component E).
//!
//! `Invoke` is the one call every subscription host funnels messages
//! through: parse the subject into placeholder bindings, extract (and
//! regenerate, if missing) the trace context, and run the middleware chain
//! with the endpoint's handler as the terminal frame. The chain is built
//! once at startup (`Invoker::new`) rather than reduced per call, so the
//! resulting pipeline is immutable and safe to share across every dispatch
//! task — mirroring Axum's `Next`-style middleware, not a per-invocation
//! fold.

use crate::catalog::{EndpointDescriptor, EndpointHandler};
use crate::context::{Cancellation, Context};
use async_trait::async_trait;
use messaging::ProcessingError;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

/// One link in the middleware chain. Implementations call `next.run(...)` to
/// continue the chain, or short-circuit by returning without calling it.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, body: &[u8], ctx: Context, next: Next<'_>) -> Result<Option<Vec<u8>>, ProcessingError>;
}

/// The remainder of the middleware chain, terminating in the endpoint
/// handler. Borrowed rather than owned so a chain of arbitrary length costs
/// one slice, not one clone per frame.
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn Middleware>],
    terminal: &'a Arc<dyn EndpointHandler>,
}

impl<'a> Next<'a> {
    pub async fn run(self, body: &[u8], ctx: Context) -> Result<Option<Vec<u8>>, ProcessingError> {
        match self.middlewares.split_first() {
            Some((mw, rest)) => {
                let next = Next {
                    middlewares: rest,
                    terminal: self.terminal,
                };
                mw.handle(body, ctx, next).await
            }
            None => self.terminal.handle(body, ctx).await,
        }
    }
}

/// Standard audit-logging middleware: opens a log scope keyed by trace id
/// and request id, records start/completion/failure with elapsed millis,
/// and rethrows on error (never swallows a handler failure).
pub struct AuditLoggingMiddleware;

#[async_trait]
impl Middleware for AuditLoggingMiddleware {
    async fn handle(&self, body: &[u8], ctx: Context, next: Next<'_>) -> Result<Option<Vec<u8>>, ProcessingError> {
        let span = info_span!(
            "handle_message",
            trace_id = %ctx.trace.trace_id,
            request_id = %ctx.trace.request_id,
            subject = %ctx.subject,
        );
        async move {
            let start = std::time::Instant::now();
            info!("handling message");
            let result = next.run(body, ctx).await;
            let elapsed_ms = start.elapsed().as_millis();
            match &result {
                Ok(_) => info!(elapsed_ms, "message handled"),
                Err(err) => error!(elapsed_ms, error = %err, "message handling failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// Runs an endpoint's middleware chain over one inbound message.
pub struct Invoker {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl Invoker {
    /// Build the pipeline once at startup. Middlewares run in registration
    /// order, each wrapping the next; the last one wraps the handler itself.
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self { middlewares }
    }

    pub fn with_audit_logging() -> Self {
        Self::new(vec![Arc::new(AuditLoggingMiddleware)])
    }

    /// Parse the subject, extract trace context from headers, and dispatch
    /// through the middleware chain into the endpoint's handler.
    pub async fn invoke(
        &self,
        descriptor: &EndpointDescriptor,
        handler: &Arc<dyn EndpointHandler>,
        subject: &str,
        body: &[u8],
        headers: Option<&async_nats::HeaderMap>,
        cancellation: Cancellation,
    ) -> Result<Option<Vec<u8>>, ProcessingError> {
        let binding = messaging::parse_subject(
            &descriptor.subject_pattern,
            &descriptor.handler_name,
            Some(&descriptor.method_name),
            Some(&descriptor.version),
            subject,
        );
        let trace = messaging::TraceContext::extract(headers);
        let ctx = Context::new(subject, binding, trace, cancellation);

        let next = Next {
            middlewares: &self.middlewares,
            terminal: handler,
        };
        next.run(body, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EndpointCatalogBuilder, EndpointOptions};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Deserialize)]
    struct Req {
        id: Option<String>,
    }

    #[derive(Debug, Serialize)]
    struct Res {
        echoed: Option<String>,
    }

    #[tokio::test]
    async fn invoke_binds_subject_placeholders_and_runs_handler() {
        let catalog = EndpointCatalogBuilder::new("default")
            .register_request_reply(
                EndpointOptions::new("EmployeeEventController", "GetEmployee", "[controller].v{version:apiVersion}.{id}.get"),
                |req: Req, ctx: Context| async move {
                    assert_eq!(ctx.binding.get("id"), Some(&"123".to_string()));
                    Ok(Res { echoed: req.id })
                },
            )
            .build();

        let endpoint = catalog.request_reply().next().unwrap();
        let invoker = Invoker::with_audit_logging();
        let cancellation = Cancellation::new(tokio::sync::watch::channel(false).1);

        let body = serde_json::to_vec(&serde_json::json!({ "id": "123" })).unwrap();
        let result = invoker
            .invoke(&endpoint.descriptor, &endpoint.handler, "employee.v1.123.get", &body, None, cancellation)
            .await
            .unwrap();

        let reply: Res = serde_json::from_slice(&result.unwrap()).unwrap();
        assert_eq!(reply.echoed, Some("123".to_string()));
    }

    #[tokio::test]
    async fn invoke_propagates_deserialization_failure() {
        let catalog = EndpointCatalogBuilder::new("default")
            .register_core_pub_sub(
                EndpointOptions::new("EmployeeEventController", "OnHired", "[controller].hired"),
                |_req: Req, _ctx| async move { Ok(()) },
            )
            .build();

        let endpoint = catalog.core_pub_sub().next().unwrap();
        let invoker = Invoker::with_audit_logging();
        let cancellation = Cancellation::new(tokio::sync::watch::channel(false).1);

        let result = invoker
            .invoke(&endpoint.descriptor, &endpoint.handler, "employee.hired", b"not json", None, cancellation)
            .await;

        assert!(matches!(result, Err(ProcessingError::Deserialization(_))));
    }
}
