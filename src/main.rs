use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use log_ledger::api::{self, AppState};
use log_ledger::config::AppConfig;
use log_ledger::ledger::{IntegrityVerifier, JsonFileStore, Ledger, LogIngestor};
use log_ledger::logs::LogStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "log_ledger=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting log-ledger");

    let config = AppConfig::load()?;
    info!("Configuration loaded");

    let records = LogStore::connect(&config.database.url).await?;
    records.run_migrations().await?;
    info!("Log database ready");

    let chain_store = Arc::new(JsonFileStore::new(&config.ledger.chain_path));
    let ledger = Arc::new(Ledger::open(chain_store, config.ledger_settings()).await?);
    info!(
        "Ledger initialized from {} ({} blocks, difficulty {}, batch size {})",
        config.ledger.chain_path,
        ledger.len().await,
        config.ledger.difficulty,
        config.ledger.batch_size
    );

    let state = AppState {
        ingestor: LogIngestor::new(ledger.clone(), records.clone()),
        verifier: IntegrityVerifier::new(ledger.clone(), Arc::new(records.clone())),
        records,
    };
    let app = api::router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let pending = ledger.pending_count().await;
    if config.ledger.flush_on_shutdown {
        if let Err(e) = ledger.flush().await {
            error!("Failed to flush {} pending entries on shutdown: {}", pending, e);
        }
    } else if pending > 0 {
        warn!("Shutting down with {} uncommitted ledger entries", pending);
    }

    info!("log-ledger stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
