//! Outbox Processor (component I).
//!
//! A background tick loop mirroring the fixed-interval poll-and-dispatch
//! shape the corpus's `nats-worker` run loop uses for JetStream batches
//! (`tokio::select!` against a shutdown signal, sleep between ticks) —
//! here the source is a database table instead of a stream, and "ack" is a
//! row status transition instead of a broker acknowledgement.

use crate::entity::{self, OutboxStatus};
use crate::error::OutboxError;
use chrono::Utc;
use messaging::TraceContext;
use messaging_host::PublishClient;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Runtime tuning for the outbox processor (spec §6 `outbox.*`).
#[derive(Clone, Debug)]
pub struct OutboxProcessorConfig {
    pub batch_size: u32,
    pub processing_interval: Duration,
    pub max_retries: u32,
    pub retention_period: Duration,
    pub prune_retention: bool,
}

impl From<core_config::messaging::OutboxConfig> for OutboxProcessorConfig {
    fn from(config: core_config::messaging::OutboxConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            processing_interval: config.processing_interval,
            max_retries: config.max_retries,
            retention_period: config.retention_period,
            prune_retention: true,
        }
    }
}

/// Insert a new pending outbox row. Callers running inside a domain
/// transaction should pass that transaction as `db` so the enqueue commits
/// atomically with the business write it originated from.
pub async fn enqueue<C: sea_orm::ConnectionTrait>(db: &C, message_type: impl Into<String>, payload: &impl serde::Serialize) -> Result<(), OutboxError> {
    let active = entity::ActiveModel {
        id: Set(uuid::Uuid::now_v7()),
        message_type: Set(message_type.into()),
        payload: Set(serde_json::to_value(payload)?),
        status: Set(OutboxStatus::Pending),
        created_at: Set(Utc::now().into()),
        processed_at: Set(None),
        next_retry_at: Set(None),
        retry_count: Set(0),
        error: Set(None),
    };
    active.insert(db).await?;
    Ok(())
}

/// Polls the outbox table and publishes due rows through a resilient
/// publish client. One processor owns one database connection and one
/// publish client; both are cheap to clone/share so the composition root
/// typically builds a single instance for the process lifetime.
pub struct OutboxProcessor {
    db: DatabaseConnection,
    publish_client: PublishClient,
    config: OutboxProcessorConfig,
}

impl OutboxProcessor {
    pub fn new(db: DatabaseConnection, publish_client: PublishClient, config: OutboxProcessorConfig) -> Self {
        Self { db, publish_client, config }
    }

    /// Runs ticks on `config.processing_interval` until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.processing_interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("outbox processor shutting down");
                        break;
                    }
                }
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "outbox tick failed");
                    }
                }
            }
        }
    }

    /// One poll-publish-update cycle. Skips entirely (no query issued) if
    /// the publish client's circuit breaker is already open.
    ///
    /// This checks `state()`, not `guard()`: `guard()` mutates a `Open`
    /// breaker whose `break_duration` has elapsed into `HalfOpen` and
    /// claims the single half-open probe slot. Calling it here as a mere
    /// peek would consume that slot without ever resolving it, since the
    /// real probe happens inside `js_publish`'s own pipeline `guard()` call
    /// — leaving the breaker stuck in `HalfOpen` forever.
    pub async fn tick(&self) -> Result<(), OutboxError> {
        if matches!(self.publish_client.breaker().state(), resilience::CircuitState::Open) {
            debug!("outbox tick skipped: circuit breaker is open");
            return Ok(());
        }

        let due_filter = Condition::any()
            .add(entity::Column::NextRetryAt.is_null())
            .add(entity::Column::NextRetryAt.lte(Utc::now()));

        let batch = entity::Entity::find()
            .filter(entity::Column::Status.eq(OutboxStatus::Pending))
            .filter(due_filter)
            .order_by_asc(entity::Column::CreatedAt)
            .limit(self.config.batch_size as u64)
            .all(&self.db)
            .await?;

        for row in batch {
            self.process_row(row).await?;
        }

        if self.config.prune_retention {
            self.prune_processed().await?;
        }

        Ok(())
    }

    async fn process_row(&self, row: entity::Model) -> Result<(), OutboxError> {
        let trace = TraceContext::generate();
        let result = self.publish_client.js_publish(row.message_type.clone(), &row.payload, &trace).await;

        let mut active: entity::ActiveModel = row.clone().into();
        match result {
            Ok(()) => {
                active.status = Set(OutboxStatus::Processed);
                active.processed_at = Set(Some(Utc::now().into()));
                active.next_retry_at = Set(None);
                active.error = Set(None);
            }
            Err(err) => {
                let retry_count = row.retry_count + 1;
                active.retry_count = Set(retry_count);
                active.error = Set(Some(err.to_string()));
                if retry_count as u32 >= self.config.max_retries {
                    active.status = Set(OutboxStatus::DeadLettered);
                    active.next_retry_at = Set(None);
                    warn!(id = %row.id, message_type = %row.message_type, "outbox message dead-lettered after exhausting retries");
                } else {
                    let delay_secs = 2u64.saturating_pow(retry_count as u32);
                    active.next_retry_at = Set(Some((Utc::now() + chrono::Duration::seconds(delay_secs as i64)).into()));
                    debug!(id = %row.id, retry_count, delay_secs, "outbox message publish failed, scheduled for retry");
                }
            }
        }
        active.update(&self.db).await?;
        Ok(())
    }

    async fn prune_processed(&self) -> Result<(), OutboxError> {
        let cutoff = Utc::now() - chrono::Duration::from_std(self.config.retention_period).unwrap_or(chrono::Duration::days(7));
        let result = entity::Entity::delete_many()
            .filter(entity::Column::Status.eq(OutboxStatus::Processed))
            .filter(entity::Column::ProcessedAt.lte(cutoff))
            .exec(&self.db)
            .await?;
        if result.rows_affected > 0 {
            debug!(rows = result.rows_affected, "pruned processed outbox rows past retention");
        }
        Ok(())
    }
}
