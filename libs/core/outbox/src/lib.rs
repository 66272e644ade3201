//! Transactional Outbox Processor (component I).
//!
//! Persist-then-publish: domain code writes an [`entity::Model`] row in the
//! same database transaction as its business state change via [`enqueue`];
//! this crate's [`OutboxProcessor`] separately polls due rows on a fixed
//! interval and publishes them through a resilient [`messaging_host::PublishClient`],
//! advancing each row's status as it goes.

pub mod entity;
mod error;
mod processor;

pub use entity::OutboxStatus;
pub use error::OutboxError;
pub use processor::{enqueue, OutboxProcessor, OutboxProcessorConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn config_maps_from_core_config_defaults() {
        let core = core_config::messaging::OutboxConfig::default();
        let mapped: OutboxProcessorConfig = core.into();
        assert_eq!(mapped.batch_size, 100);
        assert_eq!(mapped.processing_interval, Duration::from_secs(5));
        assert_eq!(mapped.max_retries, 5);
        assert_eq!(mapped.retention_period, Duration::from_secs(7 * 24 * 60 * 60));
    }
}
