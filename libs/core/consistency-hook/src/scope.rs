//! Eventual-consistency request scope (component L).
//!
//! Wraps a unit of work in a database transaction, hands the body an
//! [`EventRecorder`] to stash domain events on, and — once the body returns
//! successfully — publishes every recorded event in-process *before*
//! committing. A publish failure rolls the transaction back instead of
//! committing with events the rest of the system never saw; see
//! `SPEC_FULL.md`'s REDESIGN FLAGS for why this implementation resolves the
//! source's ambiguous "swallow but dispose" behavior this way.
//!
//! Endpoints that carry a skip-transaction marker bypass the transaction
//! entirely: the body runs directly against the plain connection and any
//! recorded events are published without a surrounding commit/rollback.

use crate::error::ConsistencyError;
use crate::events::EventRecorder;
use messaging::TraceContext;
use messaging_host::publish::PublishClient;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, DatabaseTransaction, DbErr, ExecResult, QueryResult, Statement, TransactionTrait};
use std::future::Future;
use tracing::{error, warn};

/// Either half of the transaction/plain-connection split, implementing
/// [`ConnectionTrait`] itself so generic repository code (`fn f<C:
/// ConnectionTrait>(conn: &C, ...)`, the same shape `outbox::enqueue` uses)
/// works against a request scope without caring which branch it's in. A
/// trait object (`&dyn ConnectionTrait`) can't fill that role: the `C` in
/// `ConnectionTrait`-bounded generics defaults to `Sized`, which `dyn
/// ConnectionTrait` isn't.
pub enum AnyConnection<'a> {
    Transaction(&'a DatabaseTransaction),
    Plain(&'a DatabaseConnection),
}

#[async_trait::async_trait]
impl ConnectionTrait for AnyConnection<'_> {
    fn get_database_backend(&self) -> DatabaseBackend {
        match self {
            AnyConnection::Transaction(txn) => txn.get_database_backend(),
            AnyConnection::Plain(conn) => conn.get_database_backend(),
        }
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult, DbErr> {
        match self {
            AnyConnection::Transaction(txn) => txn.execute(stmt).await,
            AnyConnection::Plain(conn) => conn.execute(stmt).await,
        }
    }

    async fn execute_unprepared(&self, sql: &str) -> Result<ExecResult, DbErr> {
        match self {
            AnyConnection::Transaction(txn) => txn.execute_unprepared(sql).await,
            AnyConnection::Plain(conn) => conn.execute_unprepared(sql).await,
        }
    }

    async fn query_one(&self, stmt: Statement) -> Result<Option<QueryResult>, DbErr> {
        match self {
            AnyConnection::Transaction(txn) => txn.query_one(stmt).await,
            AnyConnection::Plain(conn) => conn.query_one(stmt).await,
        }
    }

    async fn query_all(&self, stmt: Statement) -> Result<Vec<QueryResult>, DbErr> {
        match self {
            AnyConnection::Transaction(txn) => txn.query_all(stmt).await,
            AnyConnection::Plain(conn) => conn.query_all(stmt).await,
        }
    }

    fn support_returning(&self) -> bool {
        match self {
            AnyConnection::Transaction(txn) => txn.support_returning(),
            AnyConnection::Plain(conn) => conn.support_returning(),
        }
    }

    fn is_mock_connection(&self) -> bool {
        match self {
            AnyConnection::Transaction(txn) => txn.is_mock_connection(),
            AnyConnection::Plain(conn) => conn.is_mock_connection(),
        }
    }
}

/// Handed to the request body: a connection (transactional unless the
/// endpoint opted out) and the recorder to stash domain events on.
pub struct RequestScope<'a> {
    conn: AnyConnection<'a>,
    recorder: EventRecorder,
}

impl<'a> RequestScope<'a> {
    pub fn conn(&self) -> &AnyConnection<'a> {
        &self.conn
    }

    pub fn recorder(&self) -> &EventRecorder {
        &self.recorder
    }
}

/// Runs `body` inside the eventual-consistency scope described above.
///
/// `skip_transaction` corresponds to the endpoint's "skip transaction"
/// marker (spec §4.L): when set, `db` is used directly with no transaction
/// and no publish-before-commit ordering, since there is nothing to commit.
pub async fn run_in_scope<T, F, Fut>(
    db: &DatabaseConnection,
    publisher: &PublishClient,
    trace: &TraceContext,
    skip_transaction: bool,
    body: F,
) -> Result<T, ConsistencyError>
where
    F: FnOnce(RequestScope<'_>) -> Fut,
    Fut: Future<Output = Result<T, messaging::DomainError>>,
{
    if skip_transaction {
        let recorder = EventRecorder::new();
        let scope = RequestScope {
            conn: AnyConnection::Plain(db),
            recorder: recorder.clone(),
        };
        let value = body(scope).await?;
        publish_drained(publisher, trace, &recorder).await?;
        return Ok(value);
    }

    let txn = db.begin().await?;
    let recorder = EventRecorder::new();
    let scope = RequestScope {
        conn: AnyConnection::Transaction(&txn),
        recorder: recorder.clone(),
    };

    let value = match body(scope).await {
        Ok(value) => value,
        Err(err) => {
            if let Err(rollback_err) = txn.rollback().await {
                error!(error = %rollback_err, "failed to roll back after request body error");
            }
            return Err(ConsistencyError::Scope(err));
        }
    };

    if let Err(err) = publish_drained(publisher, trace, &recorder).await {
        warn!(error = %err, "in-process publish failed, rolling back transaction");
        if let Err(rollback_err) = txn.rollback().await {
            error!(error = %rollback_err, "failed to roll back after publish failure");
        }
        return Err(err);
    }

    txn.commit().await?;
    Ok(value)
}

async fn publish_drained(
    publisher: &PublishClient,
    trace: &TraceContext,
    recorder: &EventRecorder,
) -> Result<(), ConsistencyError> {
    for event in recorder.drain() {
        publisher
            .publish(event.subject.clone(), &event.payload, trace)
            .await
            .map_err(|e| ConsistencyError::Publish(e.to_string()))?;
    }
    Ok(())
}
