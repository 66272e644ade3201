//! Request/response DTOs for the employees endpoints (spec §4.D payload shapes).

use crate::entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Body for `EmployeeEventController.CreateEmployee` (core pub-sub).
#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct CreateEmployeeRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub department: String,
    #[validate(length(min = 1, max = 100))]
    pub title: String,
}

/// Empty request body for `EmployeeEventController.GetEmployee` — the
/// employee id travels in the subject, not the payload, and is read off
/// `Context::binding`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct GetEmployeeRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub department: String,
    pub title: String,
    pub status: String,
    pub hired_at: DateTime<Utc>,
}

impl From<entity::Model> for EmployeeResponse {
    fn from(model: entity::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            department: model.department,
            title: model.title,
            status: match model.status {
                entity::EmployeeStatus::Onboarding => "onboarding".to_string(),
                entity::EmployeeStatus::Active => "active".to_string(),
                entity::EmployeeStatus::Offboarded => "offboarded".to_string(),
            },
            hired_at: model.hired_at.with_timezone(&Utc),
        }
    }
}

/// Published on `employee.created` once a new hire is committed (consumed
/// in-process by the audit-log notification handler registered alongside it).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct EmployeeCreatedEvent {
    pub id: Uuid,
    pub department: String,
}

/// Body for `EmployeeEventController.SyncDepartment`, a JetStream
/// continuous-consume endpoint fed by an upstream HR system. Applying the
/// same event twice is a no-op: the handler always sets the department to
/// the value carried in the event rather than accumulating a delta.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DepartmentSyncEvent {
    pub employee_id: Uuid,
    pub department: String,
}

/// Body for `EmployeeEventController.ProcessOnboarding`, a JetStream
/// batch-fetch endpoint that runs the onboarding saga for one queued hire.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct OnboardEmployeeRequest {
    pub employee_id: Uuid,
}
