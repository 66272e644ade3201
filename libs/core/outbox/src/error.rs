use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("outbox database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("failed to serialize outbox payload: {0}")]
    Serialize(#[from] serde_json::Error),
}
