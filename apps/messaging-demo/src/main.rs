//! Composition root for the messaging-core demo service.
//!
//! Loads configuration, connects to Postgres and NATS, builds the
//! endpoint catalog out of the employees sample domain, and runs all four
//! subscription hosts plus the outbox processor until a shutdown signal
//! arrives. The load-config/connect/construct/run shape and the
//! ctrl-c/SIGTERM `watch::channel` shutdown handshake follow
//! `nats-worker`'s and `tasks-worker`'s `main.rs`; the addition here is
//! racing five long-running loops against that one shutdown signal instead
//! of one.

use axum::{routing::get, Router};
use core_config::messaging::{BlobConfig, CacheConfig, ConnectionConfig, ConsumerPolicyConfig, OutboxConfig, ResilienceConfig};
use core_config::{Environment, FromEnv};
use database::postgres::{connect_from_config, run_migrations, PostgresConfig};
use domain_employees::{endpoints, EmployeeService, OnboardingData};
use eyre::{Result, WrapErr};
use kv_store::KvCache;
use messaging::{ConnectionRegistry, ConnectionSpec, RetryPolicy};
use messaging_host::{
    Cancellation, ConsumerPolicy, CorePubSubHost, EndpointCatalogBuilder, Invoker, JsConsumeHost, JsFetchHost, PublishClient,
    PublishClientFactory, RequestReplyHost,
};
use outbox::{OutboxProcessor, OutboxProcessorConfig};
use resilience::CircuitBreakerConfig;
use saga::SagaOrchestrator;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

const SAGA_BUCKET: &str = "sagas";

#[tokio::main]
async fn main() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);
    observability::init_metrics();
    info!(?environment, "starting messaging-demo");

    let connection_config = ConnectionConfig::default_from_env();
    let consumer_policy_config = ConsumerPolicyConfig::from_env().wrap_err("loading consumer policy config")?;
    let resilience_config = ResilienceConfig::from_env().wrap_err("loading resilience config")?;
    let outbox_config = OutboxConfig::from_env().wrap_err("loading outbox config")?;
    let cache_config = CacheConfig::from_env().wrap_err("loading cache config")?;
    // Loaded for parity with the configuration surface (spec §6 `blob.*`);
    // the employees sample domain has no blob use case yet, so nothing
    // consumes it beyond validating it parses.
    let _blob_config = BlobConfig::from_env().wrap_err("loading blob config")?;

    let pg_config = PostgresConfig::from_env().wrap_err("loading postgres config")?;
    let db = connect_from_config(pg_config).await.wrap_err("connecting to postgres")?;
    run_migrations::<migration::Migrator>(&db, "messaging-demo").await.wrap_err("running migrations")?;
    info!("database ready");

    let registry = Arc::new(ConnectionRegistry::single(to_connection_spec(&connection_config)));
    let connection = registry.default_connection().await.wrap_err("connecting to NATS")?;
    info!(url = %connection_config.url, "NATS connection ready");

    let retry_policy: RetryPolicy = resilience_config.clone().into();
    let breaker_config: CircuitBreakerConfig = resilience_config.into();
    let publish_factory = PublishClientFactory::new(retry_policy, breaker_config);

    let handler_publisher: Arc<PublishClient> = Arc::new(publish_factory.client_for(connection.clone()));
    let outbox_publisher: PublishClient = publish_factory.client_for(connection.clone());

    let saga_cache = Arc::new(KvCache::new(connection.jetstream.clone(), SAGA_BUCKET, cache_config.default_ttl));
    let onboarding_orchestrator: Arc<SagaOrchestrator<OnboardingData>> = Arc::new(SagaOrchestrator::new(saga_cache));

    let employee_service = Arc::new(EmployeeService::new(db.clone(), handler_publisher, onboarding_orchestrator));

    let catalog_builder = EndpointCatalogBuilder::new(connection_config.name.clone());
    let catalog = Arc::new(endpoints::register(catalog_builder, employee_service).build());
    info!(endpoints = catalog.all().len(), "endpoint catalog built");

    let invoker = Arc::new(Invoker::with_audit_logging());
    let consumer_policy: ConsumerPolicy = consumer_policy_config.into();

    let outbox_processor = Arc::new(OutboxProcessor::new(db, outbox_publisher, OutboxProcessorConfig::from(outbox_config)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!(error = %e, "error waiting for shutdown signal");
        }
        let _ = shutdown_tx.send(true);
    });

    let health_port: u16 = std::env::var("HEALTH_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8090);
    let health_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        if let Err(e) = serve_health(health_port, health_shutdown).await {
            error!(error = %e, "health/metrics server failed");
        }
    });

    let request_reply = RequestReplyHost::new(registry.clone(), invoker.clone());
    let core_pub_sub = CorePubSubHost::new(registry.clone(), invoker.clone());
    let js_consume = JsConsumeHost::new(registry.clone(), invoker.clone(), consumer_policy.clone());
    let js_fetch = JsFetchHost::new(registry.clone(), invoker, consumer_policy);

    info!("all subscription hosts and the outbox processor starting");
    tokio::join!(
        request_reply.run(catalog.clone(), Cancellation::new(shutdown_rx.clone())),
        core_pub_sub.run(catalog.clone(), Cancellation::new(shutdown_rx.clone())),
        js_consume.run(catalog.clone(), Cancellation::new(shutdown_rx.clone())),
        js_fetch.run(catalog, Cancellation::new(shutdown_rx.clone())),
        outbox_processor.run(shutdown_rx),
    );

    registry.dispose().await;
    info!("messaging-demo stopped");
    Ok(())
}

fn to_connection_spec(config: &ConnectionConfig) -> ConnectionSpec {
    let spec = ConnectionSpec::new(config.name.clone(), config.url.clone());
    if let Some(token) = &config.token {
        spec.with_token(token.clone())
    } else if let (Some(user), Some(password)) = (&config.user, &config.password) {
        spec.with_user_password(user.clone(), password.clone())
    } else {
        spec
    }
}

/// Liveness probe and Prometheus scrape endpoint, run alongside the
/// messaging hosts and shut down on the same signal.
async fn serve_health(port: u16, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/metrics", get(observability::metrics_handler));

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await.wrap_err_with(|| format!("binding health server to {addr}"))?;
    info!(%addr, "health/metrics server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .wrap_err("health server failed")?;

    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, shutting down"),
        _ = terminate => info!("received sigterm, shutting down"),
    }

    Ok(())
}
