use thiserror::Error;

#[derive(Debug, Error)]
pub enum SagaError {
    #[error("saga state store error: {0}")]
    Store(#[from] kv_store::CacheError),

    #[error("failed to (de)serialize saga state: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("saga failed: {0}")]
    Failed(#[from] messaging::DomainError),
}
