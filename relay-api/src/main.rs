use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use relay_api::{app, AppState, AuthConfig};
use relay_catalog::{GeoPricingCache, PricingEngine};
use relay_order::{DeliveryCodeAllocator, DeliveryOrchestrator, NotificationService, WalletService};
use relay_store::{Config, DbClient, HttpLocationService, PgDeliveryStore, RedisClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_api=debug,relay_order=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Relay API on port {}", config.server.port);

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;
    let store = Arc::new(PgDeliveryStore::new(db.pool.clone()).with_timeouts(
        Duration::from_millis(config.database.lock_timeout_ms),
        Duration::from_millis(config.database.statement_timeout_ms),
    ));

    let redis = RedisClient::new(&config.redis.url, Duration::from_secs(config.redis.timeout_secs))
        .context("Failed to create Redis client")?;

    let location = Arc::new(
        HttpLocationService::new(
            config.location.geocoder_url.clone(),
            config.location.router_url.clone(),
            Duration::from_secs(config.location.timeout_secs),
        )
        .context("Failed to build location client")?,
    );

    let pricing = GeoPricingCache::new(Arc::new(redis), location.clone(), store.clone(), PricingEngine::default())
        .with_ttl(config.pricing.simulation_ttl_secs);
    let codes = DeliveryCodeAllocator::new(store.clone()).with_max_attempts(config.pricing.max_code_attempts);
    let orchestrator = DeliveryOrchestrator::new(store.clone(), store.clone(), location, pricing, codes);

    let app_state = AppState {
        orchestrator: Arc::new(orchestrator),
        wallet: Arc::new(WalletService::new(store.clone(), store.clone())),
        notifications: Arc::new(NotificationService::new(store)),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
