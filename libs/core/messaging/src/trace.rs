//! Distributed trace context propagation (component B).
//!
//! The source framework binds trace context to an async-local slot so handler
//! code can publish without threading it through every call. That hides state
//! across task spawns — easy to get wrong the moment a handler `tokio::spawn`s
//! a background task and forgets to re-bind. We drop the ambient slot and pass
//! `TraceContext` explicitly through the invoker and the resilient publish
//! client instead; the header layout on the wire is unchanged.

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

const BASE62_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

pub const TRACE_ID_HEADER: &str = "X-Trace-Id";
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";

/// A per-request identifier pair propagated across message hops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
    pub request_id: String,
    pub timestamp_ms: i64,
}

impl TraceContext {
    /// Generate a fresh trace context: 16 random bytes rendered as 32 lowercase
    /// hex chars for the trace id (regenerated on the all-zero case, which W3C
    /// treats as invalid), and 12 random base62 chars for the request id.
    pub fn generate() -> Self {
        Self {
            trace_id: generate_trace_id(),
            request_id: generate_request_id(),
            timestamp_ms: now_ms(),
        }
    }

    /// Derive the context for an outbound publish issued while handling a
    /// message carrying `self`: the trace id survives the hop, the request id
    /// is regenerated, and the timestamp is stamped at send time. This is the
    /// explicit replacement for `BindAmbient` — call it at the point of
    /// publish rather than relying on task-local state.
    pub fn for_publish(&self) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            request_id: generate_request_id(),
            timestamp_ms: now_ms(),
        }
    }

    /// Read the three trace headers, materializing any field that is missing
    /// or malformed via [`TraceContext::generate`]. Never fails.
    pub fn extract(headers: Option<&async_nats::HeaderMap>) -> Self {
        let trace_id = headers
            .and_then(|h| h.get(TRACE_ID_HEADER))
            .map(|v| v.to_string())
            .filter(|v| is_valid_trace_id(v))
            .unwrap_or_else(generate_trace_id);

        let request_id = headers
            .and_then(|h| h.get(REQUEST_ID_HEADER))
            .map(|v| v.to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(generate_request_id);

        let timestamp_ms = headers
            .and_then(|h| h.get(TIMESTAMP_HEADER))
            .and_then(|v| v.to_string().parse::<i64>().ok())
            .unwrap_or_else(now_ms);

        Self {
            trace_id,
            request_id,
            timestamp_ms,
        }
    }

    /// Overwrite the three trace headers on an outbound message.
    pub fn inject(&self, headers: &mut async_nats::HeaderMap) {
        headers.insert(TRACE_ID_HEADER, self.trace_id.as_str());
        headers.insert(REQUEST_ID_HEADER, self.request_id.as_str());
        headers.insert(TIMESTAMP_HEADER, self.timestamp_ms.to_string().as_str());
    }

    /// Build a fresh [`async_nats::HeaderMap`] carrying only the trace headers.
    pub fn to_header_map(&self) -> async_nats::HeaderMap {
        let mut headers = async_nats::HeaderMap::new();
        self.inject(&mut headers);
        headers
    }
}

fn is_valid_trace_id(s: &str) -> bool {
    s.len() == 32 && s.chars().all(|c| c.is_ascii_hexdigit()) && s.chars().any(|c| c != '0')
}

fn generate_trace_id() -> String {
    loop {
        let bytes: [u8; 16] = rand::rng().random();
        if bytes.iter().any(|&b| b != 0) {
            return bytes.iter().map(|b| format!("{:02x}", b)).collect();
        }
    }
}

fn generate_request_id() -> String {
    let mut rng = rand::rng();
    (0..12)
        .map(|_| BASE62_ALPHABET[rng.random_range(0..BASE62_ALPHABET.len())] as char)
        .collect()
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_well_formed_ids() {
        let ctx = TraceContext::generate();
        assert_eq!(ctx.trace_id.len(), 32);
        assert!(ctx.trace_id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(ctx.request_id.len(), 12);
    }

    #[test]
    fn inject_then_extract_round_trips() {
        let ctx = TraceContext::generate();
        let headers = ctx.to_header_map();
        let extracted = TraceContext::extract(Some(&headers));
        assert_eq!(ctx, extracted);
    }

    #[test]
    fn extract_materializes_missing_fields() {
        let extracted = TraceContext::extract(None);
        assert_eq!(extracted.trace_id.len(), 32);
        assert_eq!(extracted.request_id.len(), 12);
    }

    #[test]
    fn for_publish_keeps_trace_id_and_regenerates_request_id() {
        let inbound = TraceContext::generate();
        let outbound = inbound.for_publish();
        assert_eq!(inbound.trace_id, outbound.trace_id);
        assert_ne!(inbound.request_id, outbound.request_id);
    }
}
