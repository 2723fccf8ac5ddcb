use std::net::SocketAddr;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audit_ledger::config::AppConfig;
use audit_ledger::ledger::AuditLedger;
use audit_ledger::server::build_router;
use audit_ledger::storage::SqliteStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "audit_ledger=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting audit ledger service");

    let config = AppConfig::load()?;
    info!("Configuration loaded");

    let store = SqliteStore::connect(&config.database_url).await?;
    store.run_migrations().await?;
    info!("Database connected");

    let ledger = Arc::new(AuditLedger::new(Arc::new(store), &config));

    // Bootstrap: genesis must exist before any other block can be sealed,
    // and events pending from a previous run go back into the queue.
    ledger.ensure_genesis().await?;
    ledger.recover_pending().await?;

    // Periodic seal tick: commits whatever is pending even when the batch
    // threshold is never reached.
    let seal_ledger = Arc::clone(&ledger);
    let seal_interval = Duration::from_secs(config.seal_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(seal_interval);
        loop {
            interval.tick().await;
            if let Err(e) = seal_ledger.seal_now().await {
                error!("Periodic seal failed: {}", e);
            }
        }
    });
    info!("Periodic seal task started");

    let app = build_router(ledger);

    let addr = SocketAddr::new(config.server_host.parse()?, config.server_port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
