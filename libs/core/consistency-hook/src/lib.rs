//! Eventual-Consistency Hook (component L).
//!
//! Domain code running inside a request records events on an
//! [`EventRecorder`] instead of publishing them directly; [`run_in_scope`]
//! wraps the request body in a database transaction, publishes every
//! recorded event in-process once the body completes, and only then commits
//! — so a failed in-process publish never leaves a committed row whose event
//! nobody ever saw. Endpoints carrying a skip-transaction marker call
//! [`run_in_scope`] with `skip_transaction = true` to bypass the transaction
//! entirely.
//!
//! This is unrelated to the outbox (component I): the outbox is for
//! cross-service events that must survive a process crash between write and
//! publish; this hook is for in-process fan-out that only needs to happen
//! once the surrounding transaction is known to succeed.

mod error;
mod events;
mod scope;

pub use error::ConsistencyError;
pub use events::{EventRecorder, RecordedEvent};
pub use scope::{run_in_scope, RequestScope};

#[cfg(test)]
mod tests {
    use super::*;
    use messaging::TraceContext;
    use messaging::{ConnectionRegistry, ConnectionSpec, RetryPolicy};
    use messaging_host::publish::{PublishClient, PublishClientFactory};
    use resilience::CircuitBreakerConfig;
    use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};

    async fn publish_client(nats: &test_utils::TestNats) -> PublishClient {
        let registry = ConnectionRegistry::single(ConnectionSpec::new("default", nats.connection_string()));
        let handle = registry.default_connection().await.expect("connection handle");
        let factory = PublishClientFactory::new(RetryPolicy::default(), CircuitBreakerConfig::default());
        factory.client_for(handle)
    }

    #[tokio::test]
    async fn skip_transaction_publishes_without_a_transaction() {
        let nats = test_utils::TestNats::new().await;
        let client = nats.client();
        let mut sub = client.subscribe("employee.created").await.unwrap();

        let db = test_utils::TestDatabase::new().await;
        let publisher = publish_client(&nats).await;
        let trace = TraceContext::generate();

        let result = run_in_scope(&db.connection, &publisher, &trace, true, |scope| async move {
            scope.recorder().record("employee.created", &serde_json::json!({"id": 1})).unwrap();
            Ok::<_, messaging::DomainError>(42)
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        client.flush().await.unwrap();
        let msg = tokio::time::timeout(std::time::Duration::from_secs(5), futures::StreamExt::next(&mut sub))
            .await
            .expect("timeout waiting for in-process publish")
            .expect("message");
        assert_eq!(msg.subject.as_str(), "employee.created");
    }

    #[tokio::test]
    async fn body_error_rolls_back_and_publishes_nothing() {
        let nats = test_utils::TestNats::new().await;
        let client = nats.client();
        let mut sub = client.subscribe("employee.created").await.unwrap();

        let db = test_utils::TestDatabase::new().await;
        db.connection
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                "CREATE TABLE consistency_hook_marker (id INTEGER PRIMARY KEY)".to_owned(),
            ))
            .await
            .unwrap();
        let publisher = publish_client(&nats).await;
        let trace = TraceContext::generate();

        let result: Result<(), ConsistencyError> = run_in_scope(&db.connection, &publisher, &trace, false, |scope| async move {
            scope.recorder().record("employee.created", &serde_json::json!({"id": 1})).unwrap();
            scope
                .conn()
                .execute(Statement::from_string(
                    DatabaseBackend::Postgres,
                    "INSERT INTO consistency_hook_marker (id) VALUES (1)".to_owned(),
                ))
                .await
                .unwrap();
            Err(messaging::DomainError::unexpected("handler failed"))
        })
        .await;

        assert!(matches!(result, Err(ConsistencyError::Scope(_))));

        let count = db
            .connection
            .query_one(Statement::from_string(
                DatabaseBackend::Postgres,
                "SELECT COUNT(*) AS c FROM consistency_hook_marker".to_owned(),
            ))
            .await
            .unwrap()
            .unwrap();
        let c: i64 = count.try_get("", "c").unwrap();
        assert_eq!(c, 0, "rollback should have discarded the insert");

        client.flush().await.unwrap();
        let nothing = tokio::time::timeout(std::time::Duration::from_millis(200), futures::StreamExt::next(&mut sub)).await;
        assert!(nothing.is_err(), "no event should have been published after a rolled-back body");
    }
}
