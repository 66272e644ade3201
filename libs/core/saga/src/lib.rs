//! Saga Orchestrator (component J).
//!
//! Executes an ordered list of [`SagaStep`]s against shared data `T`,
//! persisting a [`SagaState<T>`] to a KV bucket after every step so a crashed
//! orchestrator can be inspected (or, for idempotent steps, resumed) from the
//! last completed step. On failure, only the steps that actually completed
//! are compensated, in reverse order; the failing step itself is never
//! compensated since it never finished.

mod error;
mod orchestrator;
mod state;
mod step;

pub use error::SagaError;
pub use orchestrator::SagaOrchestrator;
pub use state::{state_key, SagaState, SagaStatus};
pub use step::{Saga, SagaStep};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use messaging::DomainError;
    use std::sync::Arc;

    #[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
    struct OrderData {
        reserved: bool,
        charged: bool,
        shipped: bool,
    }

    struct RecordingStep {
        name: &'static str,
        fail_execute: bool,
        compensated: Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl SagaStep<OrderData> for RecordingStep {
        fn name(&self) -> &str {
            self.name
        }

        async fn execute(&self, data: &mut OrderData) -> Result<(), DomainError> {
            if self.fail_execute {
                return Err(DomainError::unexpected(format!("{} failed", self.name)));
            }
            match self.name {
                "reserve" => data.reserved = true,
                "charge" => data.charged = true,
                "ship" => data.shipped = true,
                _ => {}
            }
            Ok(())
        }

        async fn compensate(&self, _data: &OrderData) -> Result<(), DomainError> {
            self.compensated.lock().unwrap().push(self.name);
            Ok(())
        }
    }

    #[test]
    fn state_key_uses_saga_prefix() {
        let id = uuid::Uuid::nil();
        assert_eq!(state_key(id), format!("saga:{id}"));
    }

    #[test]
    fn compensation_order_is_reverse_of_completion() {
        // Exercises the pure bookkeeping the orchestrator relies on without a
        // live NATS connection: completed_step_names accumulates in
        // execution order, and reversing it yields the compensation order
        // the spec requires (C, B, A for steps A, B, C where C fails).
        let mut state = SagaState::new(uuid::Uuid::nil(), "order", OrderData::default());
        state.completed_step_names.push("reserve".to_string());
        state.completed_step_names.push("charge".to_string());
        // "ship" never completes because it fails, so it is absent here.
        let reversed: Vec<&str> = state
            .completed_step_names
            .iter()
            .rev()
            .map(|s| s.as_str())
            .collect();
        assert_eq!(reversed, vec!["charge", "reserve"]);
    }

    #[tokio::test]
    async fn failed_step_triggers_reverse_compensation_of_completed_steps_only() {
        let nats = test_utils::TestNats::new().await;
        let jetstream = nats.jetstream();
        let cache = Arc::new(KvCache::new(
            jetstream,
            "test_sagas",
            std::time::Duration::from_secs(0),
        ));
        let orchestrator: SagaOrchestrator<OrderData> = SagaOrchestrator::new(cache);

        let compensated = Arc::new(std::sync::Mutex::new(Vec::new()));
        let saga: Saga<OrderData> = Saga::new("order")
            .step(RecordingStep {
                name: "reserve",
                fail_execute: false,
                compensated: compensated.clone(),
            })
            .step(RecordingStep {
                name: "charge",
                fail_execute: false,
                compensated: compensated.clone(),
            })
            .step(RecordingStep {
                name: "ship",
                fail_execute: true,
                compensated: compensated.clone(),
            });

        let result = orchestrator.run(&saga, OrderData::default()).await;
        assert!(result.is_err());

        // "ship" failed and was never completed, so it must not appear in
        // the compensation list; "charge" and "reserve" completed and must
        // be compensated in reverse order.
        let recorded = compensated.lock().unwrap().clone();
        assert_eq!(recorded, vec!["charge", "reserve"]);
    }

    #[tokio::test]
    async fn successful_saga_persists_completed_state() {
        let nats = test_utils::TestNats::new().await;
        let jetstream = nats.jetstream();
        let cache = Arc::new(KvCache::new(
            jetstream,
            "test_sagas_ok",
            std::time::Duration::from_secs(0),
        ));
        let orchestrator: SagaOrchestrator<OrderData> = SagaOrchestrator::new(cache);

        let compensated = Arc::new(std::sync::Mutex::new(Vec::new()));
        let saga: Saga<OrderData> = Saga::new("order")
            .step(RecordingStep {
                name: "reserve",
                fail_execute: false,
                compensated: compensated.clone(),
            })
            .step(RecordingStep {
                name: "charge",
                fail_execute: false,
                compensated: compensated.clone(),
            });

        let state = orchestrator
            .run(&saga, OrderData::default())
            .await
            .expect("saga should complete");

        assert_eq!(state.status, SagaStatus::Completed);
        assert!(state.data.reserved && state.data.charged);
        assert!(compensated.lock().unwrap().is_empty());

        let reloaded = orchestrator
            .get(state.saga_id)
            .await
            .expect("load should succeed")
            .expect("state should be persisted");
        assert_eq!(reloaded.status, SagaStatus::Completed);
    }
}
