//! Employees domain error type and its mapping onto the messaging core's
//! [`DomainError`] taxonomy.

use messaging::DomainError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EmployeeError {
    #[error("employee {0} not found")]
    NotFound(Uuid),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("outbox enqueue failed: {0}")]
    Outbox(#[from] outbox::OutboxError),

    #[error("consistency scope failed: {0}")]
    Consistency(#[from] consistency_hook::ConsistencyError),

    #[error("saga failed: {0}")]
    Saga(#[from] saga::SagaError),
}

impl From<EmployeeError> for DomainError {
    fn from(err: EmployeeError) -> Self {
        match err {
            EmployeeError::NotFound(id) => DomainError::not_found(format!("employee {id} not found")),
            EmployeeError::Validation(message) => DomainError::validation(message),
            other => DomainError::unexpected(other.to_string()),
        }
    }
}
