//! Onboarding saga (spec §4.J): provisions an account, grants system access,
//! and activates the employee record, compensating in reverse if any step
//! fails before the saga reaches `Active`.

use crate::repository;
use async_trait::async_trait;
use messaging::{DomainError, TraceContext};
use messaging_host::PublishClient;
use sea_orm::DatabaseConnection;
use saga::{Saga, SagaStep};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub const SAGA_TYPE: &str = "employee_onboarding";

/// Shared data threaded through every step of one onboarding run.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct OnboardingData {
    pub employee_id: Uuid,
}

struct ProvisionAccountStep {
    publisher: Arc<PublishClient>,
}

#[async_trait]
impl SagaStep<OnboardingData> for ProvisionAccountStep {
    fn name(&self) -> &str {
        "provision_account"
    }

    async fn execute(&self, data: &mut OnboardingData) -> Result<(), DomainError> {
        self.publisher
            .publish("employee.account.provision", &data.employee_id, &TraceContext::generate())
            .await
            .map_err(|e| DomainError::unexpected(e.to_string()))
    }

    async fn compensate(&self, data: &OnboardingData) -> Result<(), DomainError> {
        self.publisher
            .publish("employee.account.deprovision", &data.employee_id, &TraceContext::generate())
            .await
            .map_err(|e| DomainError::unexpected(e.to_string()))
    }
}

struct GrantSystemAccessStep {
    publisher: Arc<PublishClient>,
}

#[async_trait]
impl SagaStep<OnboardingData> for GrantSystemAccessStep {
    fn name(&self) -> &str {
        "grant_system_access"
    }

    async fn execute(&self, data: &mut OnboardingData) -> Result<(), DomainError> {
        self.publisher
            .publish("employee.access.grant", &data.employee_id, &TraceContext::generate())
            .await
            .map_err(|e| DomainError::unexpected(e.to_string()))
    }

    async fn compensate(&self, data: &OnboardingData) -> Result<(), DomainError> {
        self.publisher
            .publish("employee.access.revoke", &data.employee_id, &TraceContext::generate())
            .await
            .map_err(|e| DomainError::unexpected(e.to_string()))
    }
}

struct ActivateEmployeeStep {
    db: DatabaseConnection,
}

#[async_trait]
impl SagaStep<OnboardingData> for ActivateEmployeeStep {
    fn name(&self) -> &str {
        "activate_employee"
    }

    async fn execute(&self, data: &mut OnboardingData) -> Result<(), DomainError> {
        repository::mark_active(&self.db, data.employee_id).await.map_err(DomainError::from)
    }

    async fn compensate(&self, data: &OnboardingData) -> Result<(), DomainError> {
        repository::mark_onboarding(&self.db, data.employee_id).await.map_err(DomainError::from)
    }
}

/// Builds the onboarding saga definition. A fresh `Saga<OnboardingData>` is
/// built per run rather than shared, since steps borrow the db/publisher
/// they close over at build time.
pub fn build(db: DatabaseConnection, publisher: Arc<PublishClient>) -> Saga<OnboardingData> {
    Saga::new(SAGA_TYPE)
        .step(ProvisionAccountStep { publisher: publisher.clone() })
        .step(GrantSystemAccessStep { publisher })
        .step(ActivateEmployeeStep { db })
}
