use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use paystack_reconciler::api::{self, AppState};
use paystack_reconciler::config::Config;
use paystack_reconciler::database::memory::{InMemoryPaymentStore, InMemoryProfileStore};
use paystack_reconciler::database::repository::{PaymentStore, ProfileStore};
use paystack_reconciler::payments::providers::{PaystackConfig, PaystackProvider};
use paystack_reconciler::payments::{PaymentService, WebhookVerifier};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info,sqlx=warn"));

    if std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

type Stores = (Arc<dyn PaymentStore>, Arc<dyn ProfileStore>);

fn in_memory_stores() -> Stores {
    tracing::warn!("DATABASE_URL not set, using in-process store; payments will not survive a restart");
    (
        Arc::new(InMemoryPaymentStore::new()),
        Arc::new(InMemoryProfileStore::new()),
    )
}

#[cfg(feature = "database")]
async fn build_stores(config: &Config) -> anyhow::Result<Stores> {
    use paystack_reconciler::database::payment_repository::PgPaymentStore;
    use paystack_reconciler::database::profile_repository::PgProfileStore;
    use paystack_reconciler::database::{init_pool, run_migrations, PoolConfig};

    let Some(url) = config.database.url.as_deref() else {
        return Ok(in_memory_stores());
    };

    let pool = init_pool(
        url,
        Some(PoolConfig {
            max_connections: config.database.max_connections,
            ..PoolConfig::default()
        }),
    )
    .await
    .context("Failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("Failed to apply database migrations")?;

    Ok((
        Arc::new(PgPaymentStore::new(pool.clone())),
        Arc::new(PgProfileStore::new(pool)),
    ))
}

#[cfg(not(feature = "database"))]
async fn build_stores(config: &Config) -> anyhow::Result<Stores> {
    if config.database.url.is_some() {
        tracing::warn!("DATABASE_URL ignored: built without the `database` feature");
    }
    Ok(in_memory_stores())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting Paystack reconciler");
    tracing::info!("Environment: {}", config.server.environment);
    tracing::info!("Currency: {}", config.payments.currency);
    tracing::info!(
        "Verification failure policy: {}",
        if config.payments.fail_on_verify_error {
            "fail payment"
        } else {
            "leave open"
        }
    );

    let (store, profiles) = build_stores(&config).await?;

    let gateway = PaystackProvider::new(PaystackConfig {
        secret_key: config.paystack.secret_key.clone(),
        base_url: config.paystack.base_url.clone(),
        timeout_secs: config.paystack.timeout_secs,
    })
    .context("Failed to build Paystack client")?;

    let state = AppState {
        service: Arc::new(PaymentService::new(
            store,
            profiles,
            Arc::new(gateway),
            config.payments.clone(),
        )),
        verifier: Arc::new(WebhookVerifier::new(config.paystack.secret_key.clone())),
        environment: config.server.environment.clone(),
    };

    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("HOST and PORT must form a valid socket address")?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
