//! Employees application service: the layer endpoints call into, wiring
//! persistence, the eventual-consistency hook, the outbox, and the
//! onboarding saga behind a small set of use cases.

use crate::entity;
use crate::error::EmployeeError;
use crate::models::{CreateEmployeeRequest, EmployeeCreatedEvent, EmployeeResponse};
use crate::onboarding::{self, OnboardingData};
use crate::repository;
use consistency_hook::run_in_scope;
use messaging::TraceContext;
use messaging_host::PublishClient;
use saga::SagaOrchestrator;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

/// Message type this service enqueues on the outbox for cross-service
/// consumers — distinct from `employee.created`, which is fanned out
/// in-process via the consistency hook to listeners inside this process.
pub const PROVISIONED_MESSAGE_TYPE: &str = "employee.provisioned";

pub struct EmployeeService {
    db: DatabaseConnection,
    publisher: Arc<PublishClient>,
    onboarding: Arc<SagaOrchestrator<OnboardingData>>,
}

impl EmployeeService {
    pub fn new(db: DatabaseConnection, publisher: Arc<PublishClient>, onboarding: Arc<SagaOrchestrator<OnboardingData>>) -> Self {
        Self { db, publisher, onboarding }
    }

    pub async fn get(&self, id: Uuid) -> Result<EmployeeResponse, EmployeeError> {
        let model = repository::find_by_id(&self.db, id).await?.ok_or(EmployeeError::NotFound(id))?;
        Ok(model.into())
    }

    /// Creates an employee row and, once the write is known to commit:
    /// - fans `employee.created` out in-process to same-service listeners
    ///   (e.g. an audit-log subscriber) via the consistency hook, and
    /// - enqueues `employee.provisioned` on the outbox for cross-service
    ///   consumers that must see it even if this process crashes right after.
    pub async fn create(&self, request: CreateEmployeeRequest, trace: &TraceContext) -> Result<EmployeeResponse, EmployeeError> {
        let model = run_in_scope(&self.db, &self.publisher, trace, false, |scope| {
            let request = request.clone();
            async move {
                let model = repository::insert(scope.conn(), &request)
                    .await
                    .map_err(|e| messaging::DomainError::from(e))?;

                scope
                    .recorder()
                    .record(
                        "employee.created",
                        &EmployeeCreatedEvent {
                            id: model.id,
                            department: model.department.clone(),
                        },
                    )
                    .map_err(|e| messaging::DomainError::unexpected(e.to_string()))?;

                outbox::enqueue(
                    scope.conn(),
                    PROVISIONED_MESSAGE_TYPE,
                    &EmployeeCreatedEvent {
                        id: model.id,
                        department: model.department.clone(),
                    },
                )
                .await
                .map_err(|e| messaging::DomainError::unexpected(e.to_string()))?;

                Ok::<entity::Model, messaging::DomainError>(model)
            }
        })
        .await?;

        Ok(model.into())
    }

    /// Applies a department change from the upstream HR system. Idempotent:
    /// replaying the same event twice leaves the department unchanged after
    /// the first application.
    pub async fn sync_department(&self, employee_id: Uuid, department: &str) -> Result<(), EmployeeError> {
        repository::update_department(&self.db, employee_id, department).await
    }

    /// Runs the onboarding saga for a queued hire. Compensates account
    /// provisioning and access grants in reverse if activation fails.
    pub async fn onboard(&self, employee_id: Uuid) -> Result<(), EmployeeError> {
        let saga = onboarding::build(self.db.clone(), self.publisher.clone());
        self.onboarding
            .run(&saga, OnboardingData { employee_id })
            .await
            .map_err(EmployeeError::Saga)?;
        Ok(())
    }
}
