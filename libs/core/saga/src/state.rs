//! Saga state (spec §4.J data model).
//!
//! Persisted as JSON under key `saga:{sagaId}` in a [`kv_store::KvCache`]
//! bucket — the same lazy-bucket KV pattern the cache and blob store use,
//! narrowed here to a single typed document per saga run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStatus {
    Running,
    Completed,
    Compensating,
    Compensated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaState<T> {
    pub saga_id: Uuid,
    pub saga_type: String,
    pub status: SagaStatus,
    pub current_step_index: usize,
    pub data: T,
    pub completed_step_names: Vec<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl<T> SagaState<T> {
    pub fn new(saga_id: Uuid, saga_type: impl Into<String>, data: T) -> Self {
        Self {
            saga_id,
            saga_type: saga_type.into(),
            status: SagaStatus::Running,
            current_step_index: 0,
            data,
            completed_step_names: Vec::new(),
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

pub fn state_key(saga_id: Uuid) -> String {
    format!("saga:{saga_id}")
}
