use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsistencyError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("failed to serialize domain event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to publish domain event in-process: {0}")]
    Publish(String),

    #[error("request scope body failed: {0}")]
    Scope(#[from] messaging::DomainError),
}
