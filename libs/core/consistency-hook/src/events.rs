//! Per-request domain event recording.
//!
//! Domain persistence code calls [`EventRecorder::record`] while a save is
//! happening inside the request's transaction; [`run_in_scope`] drains the
//! recorder once the body completes and publishes everything in-process
//! before the transaction commits.

use crate::error::ConsistencyError;
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// One domain event captured mid-request, already serialized to JSON so it
/// can sit in the recorder without borrowing the value that produced it.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub subject: String,
    pub payload: serde_json::Value,
}

/// Cloneable handle to the event slot for one request. Cloning shares the
/// same underlying list — every clone handed to domain code during a save
/// contributes to the same drain.
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a domain event on `subject` for in-process publish after the
    /// request body returns successfully. Serialization happens eagerly so a
    /// bad payload surfaces at the call site, not at drain time.
    pub fn record(&self, subject: impl Into<String>, payload: &impl Serialize) -> Result<(), ConsistencyError> {
        let payload = serde_json::to_value(payload)?;
        self.events.lock().unwrap().push(RecordedEvent {
            subject: subject.into(),
            payload,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn drain(&self) -> Vec<RecordedEvent> {
        std::mem::take(&mut self.events.lock().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize)]
    struct Payload {
        id: u32,
    }

    #[test]
    fn record_then_drain_returns_in_order() {
        let recorder = EventRecorder::new();
        recorder.record("employee.created", &Payload { id: 1 }).unwrap();
        recorder.record("employee.updated", &Payload { id: 2 }).unwrap();
        assert_eq!(recorder.len(), 2);

        let drained = recorder.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].subject, "employee.created");
        assert_eq!(drained[1].subject, "employee.updated");
        assert!(recorder.is_empty());
    }

    #[test]
    fn clones_share_the_same_slot() {
        let recorder = EventRecorder::new();
        let clone = recorder.clone();
        clone.record("employee.created", &Payload { id: 1 }).unwrap();
        assert_eq!(recorder.len(), 1);
    }
}
