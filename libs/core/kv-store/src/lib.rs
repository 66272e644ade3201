//! KV Cache + Object Store (component K).
//!
//! Distributed cache and blob storage over NATS KV / Object Store buckets.
//! Both stores lazily create their bucket on first use, guarded by a
//! single-entry lock so concurrent first callers never race each other
//! into creating the bucket twice.

mod cache;
mod object_store;

pub use cache::{CacheError, KvCache, SharedKvCache};
pub use object_store::{BlobError, BlobStore};
