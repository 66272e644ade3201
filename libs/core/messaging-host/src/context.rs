//! Per-message execution context handed to handlers and middleware.
//!
//! The source framework binds a cancellation token and trace context to
//! async-local state. We pass both explicitly instead (messaging's
//! `trace` module doc explains why) — every handler signature and every
//! publish call carries a [`Context`] rather than reading from ambient
//! storage.

use messaging::TraceContext;
use std::collections::HashMap;
use tokio::sync::watch;

/// Subject placeholder bindings produced by [`messaging::parse_subject`],
/// keyed by placeholder name.
pub type SubjectBinding = HashMap<String, String>;

/// Cooperative cancellation, propagated from a single root shutdown signal
/// into every subscription host iterator and every in-flight handler.
#[derive(Clone)]
pub struct Cancellation(watch::Receiver<bool>);

impl Cancellation {
    pub fn new(receiver: watch::Receiver<bool>) -> Self {
        Self(receiver)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the root token signals shutdown.
    pub async fn cancelled(&mut self) {
        while !*self.0.borrow() {
            if self.0.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Everything the invoker assembles per inbound message before calling the
/// handler: the resolved subject, its placeholder bindings, the inbound
/// trace context, and the root cancellation.
#[derive(Clone)]
pub struct Context {
    pub subject: String,
    pub binding: SubjectBinding,
    pub trace: TraceContext,
    pub cancellation: Cancellation,
}

impl Context {
    pub fn new(subject: impl Into<String>, binding: SubjectBinding, trace: TraceContext, cancellation: Cancellation) -> Self {
        Self {
            subject: subject.into(),
            binding,
            trace,
            cancellation,
        }
    }

    /// Derive the trace context an outbound publish issued from inside this
    /// handler invocation should carry: same trace id, fresh request id.
    pub fn outbound_trace(&self) -> TraceContext {
        self.trace.for_publish()
    }
}
