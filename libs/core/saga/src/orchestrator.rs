//! Saga orchestrator (component J): runs a [`Saga`]'s steps in order over a
//! KV-persisted [`SagaState`], compensating only the steps that completed
//! if a later step fails.

use crate::error::SagaError;
use crate::state::{state_key, SagaState, SagaStatus};
use crate::step::Saga;
use chrono::Utc;
use kv_store::KvCache;
use messaging::{DomainError, ErrorKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Orchestrates sagas whose shared data is `T`. One orchestrator instance
/// is reused across every run of every [`Saga<T>`] with that data shape —
/// the KV bucket, not the orchestrator, is what's per-saga-type.
pub struct SagaOrchestrator<T> {
    store: Arc<KvCache>,
    _marker: std::marker::PhantomData<T>,
}

impl<T> SagaOrchestrator<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    pub fn new(store: Arc<KvCache>) -> Self {
        Self {
            store,
            _marker: std::marker::PhantomData,
        }
    }

    /// Loads a previously persisted saga's state, if any.
    pub async fn get(&self, saga_id: Uuid) -> Result<Option<SagaState<T>>, SagaError> {
        let bytes = self.store.get(&state_key(saga_id)).await?;
        match bytes {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn persist(&self, state: &SagaState<T>) -> Result<(), SagaError> {
        let bytes = serde_json::to_vec(state)?;
        self.store.set(&state_key(state.saga_id), bytes).await?;
        Ok(())
    }

    /// Runs `saga` to completion or exhaustion, starting from `initial_data`.
    /// Returns the final state on success; on step failure the state is
    /// persisted as `Compensated` and the triggering error is returned.
    pub async fn run(&self, saga: &Saga<T>, initial_data: T) -> Result<SagaState<T>, SagaError> {
        let saga_id = Uuid::now_v7();
        self.run_with_id(saga_id, saga, initial_data).await
    }

    /// Same as [`Self::run`] with a caller-supplied saga id, for callers
    /// that need the id before execution starts (e.g. to return it to a
    /// synchronous caller before the saga finishes).
    pub async fn run_with_id(
        &self,
        saga_id: Uuid,
        saga: &Saga<T>,
        initial_data: T,
    ) -> Result<SagaState<T>, SagaError> {
        let mut state = SagaState::new(saga_id, saga.saga_type.clone(), initial_data);
        self.persist(&state).await?;
        info!(saga_id = %saga_id, saga_type = %saga.saga_type, "saga started");

        for (index, step) in saga.steps.iter().enumerate() {
            state.current_step_index = index;
            match step.execute(&mut state.data).await {
                Ok(()) => {
                    state.completed_step_names.push(step.name().to_string());
                    self.persist(&state).await?;
                }
                Err(err) => {
                    warn!(
                        saga_id = %saga_id,
                        step = step.name(),
                        error = %err,
                        "saga step failed, compensating completed steps"
                    );
                    return self.compensate(saga, state, err).await;
                }
            }
        }

        state.status = SagaStatus::Completed;
        state.completed_at = Some(Utc::now());
        self.persist(&state).await?;
        info!(saga_id = %saga_id, saga_type = %saga.saga_type, "saga completed");
        Ok(state)
    }

    /// Compensates only the steps recorded in `state.completed_step_names`,
    /// in reverse order. The step that failed is never compensated — it
    /// never completed. A compensation failure is logged and does not stop
    /// the rollback of the remaining completed steps (spec §4.J).
    async fn compensate(
        &self,
        saga: &Saga<T>,
        mut state: SagaState<T>,
        cause: DomainError,
    ) -> Result<SagaState<T>, SagaError> {
        state.status = SagaStatus::Compensating;
        state.error_message = Some(cause.description.clone());
        self.persist(&state).await?;

        for name in state.completed_step_names.clone().iter().rev() {
            let Some(step) = saga.step_by_name(name) else {
                warn!(saga_id = %state.saga_id, step = name, "compensation step not found in saga definition, skipping");
                continue;
            };
            if let Err(err) = step.compensate(&state.data).await {
                error!(
                    saga_id = %state.saga_id,
                    step = name,
                    error = %err,
                    "compensation step failed, continuing with remaining rollback"
                );
            }
        }

        state.status = SagaStatus::Compensated;
        state.completed_at = Some(Utc::now());
        self.persist(&state).await?;
        warn!(saga_id = %state.saga_id, saga_type = %saga.saga_type, "saga compensated");

        Err(SagaError::Failed(DomainError::new(
            ErrorKind::Unexpected,
            "Saga.Failed",
            cause.description,
        )))
    }
}
