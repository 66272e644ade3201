//! Object-store blob layer (spec §4.K, blob half).
//!
//! Same lazy, semaphore-guarded bucket-creation discipline as [`crate::cache`],
//! over NATS JetStream's object store instead of its KV store: blobs can be
//! arbitrarily large and are streamed in, where KV entries are small values
//! read whole.

use async_nats::jetstream::object_store::{Config as ObjectStoreConfig, ObjectStore as NatsObjectStore};
use async_nats::jetstream::Context as JetStreamContext;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::sync::{Mutex, OnceCell};

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("failed to serialize blob: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("blob operation failed: {0}")]
    Backend(String),
}

fn is_not_found(err: &impl std::fmt::Display) -> bool {
    let message = err.to_string();
    message.contains("not found")
}

/// Object-store blob bucket. `put`/`get` JSON-serialize the value; `put_bytes`/
/// `get_bytes` bypass serialization for callers already holding raw bytes.
pub struct BlobStore {
    jetstream: JetStreamContext,
    bucket_name: String,
    store: OnceCell<NatsObjectStore>,
    init_lock: Mutex<()>,
}

impl BlobStore {
    pub fn new(jetstream: JetStreamContext, bucket_name: impl Into<String>) -> Self {
        Self {
            jetstream,
            bucket_name: bucket_name.into(),
            store: OnceCell::new(),
            init_lock: Mutex::new(()),
        }
    }

    async fn store(&self) -> Result<&NatsObjectStore, BlobError> {
        if let Some(store) = self.store.get() {
            return Ok(store);
        }

        let _guard = self.init_lock.lock().await;
        if let Some(store) = self.store.get() {
            return Ok(store);
        }

        let store = match self.jetstream.get_object_store(&self.bucket_name).await {
            Ok(store) => store,
            Err(_) => self
                .jetstream
                .create_object_store(ObjectStoreConfig {
                    bucket: self.bucket_name.clone(),
                    ..Default::default()
                })
                .await
                .map_err(|e| BlobError::Backend(e.to_string()))?,
        };

        let _ = self.store.set(store);
        Ok(self.store.get().expect("just initialized under init_lock"))
    }

    pub async fn put_bytes(&self, name: &str, value: Vec<u8>) -> Result<(), BlobError> {
        let store = self.store().await?;
        let mut cursor = std::io::Cursor::new(value);
        store
            .put(name, &mut cursor)
            .await
            .map_err(|e| BlobError::Backend(e.to_string()))?;
        Ok(())
    }

    pub async fn get_bytes(&self, name: &str) -> Result<Vec<u8>, BlobError> {
        let store = self.store().await?;
        let mut object = store.get(name).await.map_err(|e| {
            if is_not_found(&e) {
                BlobError::NotFound(name.to_string())
            } else {
                BlobError::Backend(e.to_string())
            }
        })?;

        let mut buf = Vec::new();
        object
            .read_to_end(&mut buf)
            .await
            .map_err(|e| BlobError::Backend(e.to_string()))?;
        Ok(buf)
    }

    pub async fn put<T: Serialize>(&self, name: &str, value: &T) -> Result<(), BlobError> {
        let bytes = serde_json::to_vec(value)?;
        self.put_bytes(name, bytes).await
    }

    pub async fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, BlobError> {
        let bytes = self.get_bytes(name).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn delete(&self, name: &str) -> Result<(), BlobError> {
        let store = self.store().await?;
        match store.delete(name).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(BlobError::Backend(e.to_string())),
        }
    }

    pub async fn exists(&self, name: &str) -> Result<bool, BlobError> {
        let store = self.store().await?;
        match store.info(name).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(BlobError::Backend(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_detection() {
        assert!(is_not_found(&"object not found"));
        assert!(!is_not_found(&"timeout"));
    }
}
