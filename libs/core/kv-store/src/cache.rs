//! KV-backed distributed cache (spec §4.K, cache half).
//!
//! One bucket, lazily created on first use and guarded by a semaphore so
//! concurrent callers racing the very first `Get`/`Set` only create it
//! once — the "at-most-one concurrent initialization" rule from the spec.
//! Modeled on the lazy-bucket pattern `benjaminabbitt-angzarr`'s
//! `NatsSnapshotStore` uses for its snapshot KV bucket, narrowed to plain
//! string keys and opaque byte values instead of a typed snapshot.

use async_nats::jetstream::kv::{Config as KvConfig, Store};
use async_nats::jetstream::Context as JetStreamContext;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OnceCell};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache operation failed: {0}")]
    Backend(String),
}

fn is_not_found(err: &impl std::fmt::Display) -> bool {
    let message = err.to_string();
    message.contains("key not found") || message.contains("not found")
}

/// KV-backed cache bound to a single bucket. `Get`/`Set`/`Remove` map
/// directly onto the KV bucket's get/put/purge; `Refresh` is a no-op — the
/// source framework's cache has no sliding-expiration concept to bump.
pub struct KvCache {
    jetstream: JetStreamContext,
    bucket_name: String,
    default_ttl: std::time::Duration,
    store: OnceCell<Store>,
    init_lock: Mutex<()>,
}

impl KvCache {
    pub fn new(jetstream: JetStreamContext, bucket_name: impl Into<String>, default_ttl: std::time::Duration) -> Self {
        Self {
            jetstream,
            bucket_name: bucket_name.into(),
            default_ttl,
            store: OnceCell::new(),
            init_lock: Mutex::new(()),
        }
    }

    async fn store(&self) -> Result<&Store, CacheError> {
        if let Some(store) = self.store.get() {
            return Ok(store);
        }

        let _guard = self.init_lock.lock().await;
        if let Some(store) = self.store.get() {
            return Ok(store);
        }

        let store = match self.jetstream.get_key_value(&self.bucket_name).await {
            Ok(store) => store,
            Err(_) => self
                .jetstream
                .create_key_value(KvConfig {
                    bucket: self.bucket_name.clone(),
                    max_age: self.default_ttl,
                    ..Default::default()
                })
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?,
        };

        let _ = self.store.set(store);
        Ok(self.store.get().expect("just initialized under init_lock"))
    }

    /// Missing keys return `Ok(None)`, never an error.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let store = self.store().await?;
        match store.get(key).await {
            Ok(entry) => Ok(entry.map(|bytes| bytes.to_vec())),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(CacheError::Backend(e.to_string())),
        }
    }

    pub async fn set(&self, key: &str, value: impl Into<Vec<u8>>) -> Result<(), CacheError> {
        let store = self.store().await?;
        store
            .put(key, value.into().into())
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let store = self.store().await?;
        match store.purge(key).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(CacheError::Backend(e.to_string())),
        }
    }

    /// No-op: the source cache has no sliding-expiration window to extend.
    pub async fn refresh(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }
}

pub type SharedKvCache = Arc<KvCache>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_detection_matches_both_kv_error_shapes() {
        assert!(is_not_found(&"key not found"));
        assert!(is_not_found(&"not found"));
        assert!(!is_not_found(&"connection reset"));
    }
}
