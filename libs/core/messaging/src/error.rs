//! Error types shared across the messaging core.
//!
//! Two separate taxonomies live here, matching the two places errors occur:
//! - [`ErrorCategory`] / [`ProcessingError`] classify *handler effects* — what the
//!   JetStream message handler should do with a failed message (retry, DLQ, ...).
//! - [`DomainError`] is the sum type application code returns from handler bodies;
//!   it carries no retry information of its own, but a [`ProcessingError`] can be
//!   built from one via [`ProcessingError::from_domain`].

use std::fmt;
use thiserror::Error;

/// Error categories determine retry behavior at the JetStream message handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Temporary failure (network blip, broker timeout). NAK with backoff, eventually DLQ.
    Transient,
    /// Terminal failure (deserialization, business-rule violation). DLQ (if enabled), then ack.
    Permanent,
    /// Upstream rate limited the caller. Retried with longer delays.
    RateLimited,
}

impl ErrorCategory {
    /// Maximum redelivery attempts before the message is routed to the DLQ.
    pub fn max_retries(&self) -> u32 {
        match self {
            ErrorCategory::Transient => 5,
            ErrorCategory::Permanent => 0,
            ErrorCategory::RateLimited => 5,
        }
    }

    fn base_backoff_ms(&self) -> u64 {
        match self {
            ErrorCategory::Transient => 5_000,
            ErrorCategory::Permanent => 0,
            ErrorCategory::RateLimited => 5_000,
        }
    }

    fn max_backoff_ms(&self) -> u64 {
        match self {
            ErrorCategory::Transient => 60_000,
            ErrorCategory::Permanent => 0,
            ErrorCategory::RateLimited => 120_000,
        }
    }

    /// Fixed NAK delay for transient errors (spec default: 5s, not exponential —
    /// the JetStream handler uses a fixed delay; exponential backoff is reserved
    /// for the outbox processor's retry schedule).
    pub fn backoff_delay_ms(&self, _delivery_attempt: u32) -> u64 {
        self.base_backoff_ms().min(self.max_backoff_ms())
    }

    pub fn should_retry(&self, delivery_attempt: u32) -> bool {
        delivery_attempt < self.max_retries()
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Transient => write!(f, "transient"),
            ErrorCategory::Permanent => write!(f, "permanent"),
            ErrorCategory::RateLimited => write!(f, "rate_limited"),
        }
    }
}

/// Error surfaced by a handler or host operation, carrying enough information
/// for the JetStream handler (component G) to classify ack/NAK/DLQ behavior.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("transient error: {message}")]
    Transient { message: String },

    #[error("permanent error: {message}")]
    Permanent { message: String },

    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_ms: Option<u64>,
    },

    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl ProcessingError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after_ms: None,
        }
    }

    /// Build a handler-effect error from a [`DomainError`]. Every domain error is
    /// terminal — business-rule and validation failures are never retried.
    pub fn from_domain(err: DomainError) -> Self {
        Self::Permanent {
            message: err.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ProcessingError::Transient { .. } => ErrorCategory::Transient,
            ProcessingError::Permanent { .. } => ErrorCategory::Permanent,
            ProcessingError::RateLimited { .. } => ErrorCategory::RateLimited,
            ProcessingError::Deserialization(_) => ErrorCategory::Permanent,
        }
    }

    pub fn should_retry(&self, delivery_attempt: u32) -> bool {
        self.category().should_retry(delivery_attempt)
    }

    pub fn backoff_delay_ms(&self, delivery_attempt: u32) -> u64 {
        if let ProcessingError::RateLimited {
            retry_after_ms: Some(ms),
            ..
        } = self
        {
            return *ms;
        }
        self.category().backoff_delay_ms(delivery_attempt)
    }
}

/// The kind of a [`DomainError`], surfaced to HTTP-facing callers (out of core
/// scope) as an RFC 9457 problem-detail payload, and to request-reply callers
/// as a numeric result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Unauthorized,
    Forbidden,
    Unexpected,
}

impl ErrorKind {
    /// Numeric code used in request-reply error replies.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Validation => 400,
            ErrorKind::Conflict => 409,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::Unexpected => 500,
        }
    }
}

/// Application-level error sum type. Handler bodies return `Result<T, DomainError>`
/// rather than throwing; the messaging boundary never sees an exception type.
#[derive(Debug, Clone, Error)]
#[error("{description}")]
pub struct DomainError {
    pub kind: ErrorKind,
    pub code: String,
    pub description: String,
}

impl DomainError {
    pub fn new(kind: ErrorKind, code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            description: description.into(),
        }
    }

    pub fn not_found(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, "not_found", description)
    }

    pub fn validation(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, "validation", description)
    }

    pub fn unexpected(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, "unexpected", description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_retries_up_to_max() {
        let e = ProcessingError::transient("timeout");
        assert!(e.should_retry(0));
        assert!(e.should_retry(4));
        assert!(!e.should_retry(5));
        assert_eq!(e.backoff_delay_ms(0), 5_000);
    }

    #[test]
    fn permanent_never_retries() {
        let e = ProcessingError::permanent("bad payload");
        assert!(!e.should_retry(0));
        assert_eq!(e.backoff_delay_ms(0), 0);
    }

    #[test]
    fn domain_error_is_always_permanent() {
        let domain = DomainError::validation("title is required");
        let processing = ProcessingError::from_domain(domain);
        assert_eq!(processing.category(), ErrorCategory::Permanent);
    }

    #[test]
    fn error_kind_status_codes() {
        assert_eq!(ErrorKind::NotFound.status_code(), 404);
        assert_eq!(ErrorKind::Unexpected.status_code(), 500);
    }
}
