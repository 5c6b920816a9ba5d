//! yardd - RFID yard gate reconciliation daemon
//!
//! Periodically turns raw gate reads into crossings, custody changes,
//! missing-equipment cases and alerts.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yard_daemon::{seed, CatalogSeed, DaemonConfig, DaemonError, DaemonResult, Scheduler};
use yard_engine::{ReconciliationEngine, ScanIngestor};
use yard_store::InMemoryYardStore;

/// yardd CLI
#[derive(Parser)]
#[command(name = "yardd")]
#[command(about = "Yard gate scan reconciliation daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "YARD_CONFIG")]
    config: Option<String>,

    /// Log level (overrides the configured level)
    #[arg(long, env = "YARD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "YARD_LOG_JSON")]
    json: bool,

    /// Run a single pass, print its report and exit
    #[arg(long)]
    once: bool,

    /// Catalog JSON to load at startup
    #[arg(long, env = "YARD_CATALOG")]
    catalog: Option<String>,

    /// Scan backlog JSON to ingest at startup
    #[arg(long, env = "YARD_SCANS")]
    scans: Option<String>,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    let mut config = DaemonConfig::load(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config.logging.json |= cli.json;
    if cli.catalog.is_some() {
        config.seed.catalog_path = cli.catalog.clone();
    }
    if cli.scans.is_some() {
        config.seed.scans_path = cli.scans.clone();
    }

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    config.validate()?;

    let store = Arc::new(InMemoryYardStore::new());
    if let Some(path) = &config.seed.catalog_path {
        CatalogSeed::from_file(path)?.apply(&store)?;
    }

    let engine = Arc::new(ReconciliationEngine::new(store.clone(), config.engine.clone())?);
    engine.alert_rules().await?;

    if let Some(path) = &config.seed.scans_path {
        seed::ingest_scans(&ScanIngestor::new(store.clone()), path).await?;
    }

    let scheduler = Scheduler::new(config.scheduler.clone(), engine);

    if cli.once {
        let report = scheduler.tick().await?;
        let json = serde_json::to_string_pretty(&report).map_err(|source| DaemonError::Json {
            path: "run report".to_string(),
            source,
        })?;
        println!("{json}");
        return Ok(());
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "yardd starting");

    let handle = tokio::spawn(scheduler.clone().start());
    shutdown_signal().await;
    scheduler.stop().await;
    if let Err(e) = handle.await {
        tracing::error!(error = %e, "Scheduler task ended abnormally");
    }

    if let Some(heartbeat) = scheduler.heartbeat().await {
        tracing::info!(
            last_run_at = %heartbeat.last_run_at,
            consecutive_failures = heartbeat.consecutive_failures,
            "yardd stopped"
        );
    }
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
