//! Condo Billing service binary.
//!
//! Loads configuration from the environment, connects to PostgreSQL, runs
//! pending migrations and serves the billing routes.

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use condo_billing::adapters::http::{app, BillingAppState, HttpSettings};
use condo_billing::adapters::postgres::{
    PostgresAdminRoleDirectory, PostgresAdminTransferRepository, PostgresLicenseRepository,
    PostgresPaymentLedger, PostgresPlanCatalog, PostgresSubscriptionRepository,
};
use condo_billing::adapters::{LoggingEventPublisher, LoggingNotifier};
use condo_billing::config::{AppConfig, ConfigError, LogFormat, ServerConfig};
use condo_billing::domain::payment::{PaymentGateway, SharedSecretVerifier};

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid bind address: {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match server.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate().map_err(ConfigError::from)?;

    tracing::info!(
        environment = ?config.server.environment,
        port = config.server.port,
        "starting condo billing"
    );

    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;
    tracing::info!("database pool created");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("migrations applied");
    }

    let gateway = PaymentGateway::new(SharedSecretVerifier::new(
        config.payment.webhook_secret.clone(),
        config.payment.anti_phishing_key.clone(),
    ));

    let state = BillingAppState {
        plans: Arc::new(PostgresPlanCatalog::new(pool.clone())),
        subscriptions: Arc::new(PostgresSubscriptionRepository::new(pool.clone())),
        ledger: Arc::new(PostgresPaymentLedger::new(pool.clone())),
        licenses: Arc::new(PostgresLicenseRepository::new(pool.clone())),
        transfers: Arc::new(PostgresAdminTransferRepository::new(pool.clone())),
        roles: Arc::new(PostgresAdminRoleDirectory::new(pool)),
        notifier: Arc::new(LoggingNotifier),
        event_publisher: Arc::new(LoggingEventPublisher::new()),
        gateway: Arc::new(gateway),
        settings: HttpSettings {
            default_trial_days: config.payment.default_trial_days,
            pending_view_path: config.transfers.pending_view_path.clone(),
        },
    };

    let router = app(state, config.server.request_timeout());
    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "http server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
