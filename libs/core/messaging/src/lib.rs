//! Messaging core: the NATS/JetStream plumbing shared by every host and
//! domain crate in the workspace.
//!
//! - [`connection`] — named connection registry (component A)
//! - [`trace`] — trace context propagation (component B)
//! - [`subject`] — subject template resolution (component C)
//! - [`error`] — handler-effect and domain error taxonomies
//! - [`config`] — backoff/retry policy primitives
//!
//! Endpoint registration, the invoker/middleware pipeline, subscription
//! hosts, and the JetStream message handler live in the `messaging-host`
//! crate, one layer up; this crate holds only the primitives they're built
//! from.

mod config;
mod connection;
mod error;
mod subject;
mod trace;

pub use config::{BackoffStrategy, RetryPolicy};
pub use connection::{ConnectionAuth, ConnectionError, ConnectionHandle, ConnectionRegistry, ConnectionSpec};
pub use error::{DomainError, ErrorCategory, ErrorKind, ProcessingError};
pub use subject::{controller_name, parse_subject, placeholder_names, resolve};
pub use trace::{TraceContext, REQUEST_ID_HEADER, TIMESTAMP_HEADER, TRACE_ID_HEADER};
