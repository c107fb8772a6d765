//! AegisBridge Relayer Service
//!
//! Unattended bidirectional bridge relayer: scans the source chain for lock
//! events and mints on the target chain, scans the target chain for return
//! events and unlocks on the source chain. State survives restarts via an
//! atomically rewritten JSON file; a health server exposes the latest
//! snapshot for trusted-network polling.

use std::sync::Arc;

use aegis_relayer::config::Config;
use aegis_relayer::metrics::Metrics;
use aegis_relayer::relay::Relayer;
use aegis_relayer::server;
use tracing::info;

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    info!(version = server::VERSION, "Starting AegisBridge Relayer");

    // A configuration error is fatal before any state is touched.
    let config = Config::load()?;
    info!(
        mode = %config.relayer.mode,
        dry_run = config.relayer.dry_run,
        source_chain_id = config.source.chain_id,
        target_chain_id = config.target.chain_id,
        "Configuration loaded"
    );

    let metrics = Arc::new(Metrics::new());
    let mut relayer = Relayer::new(&config, Arc::clone(&metrics))?;

    // Health server lives on its own task; it only reads the shared snapshot
    // and dies with the process.
    let health = relayer.health_handle();
    let bind = config.health.bind.clone();
    let port = config.health.port;
    tokio::spawn(async move {
        if let Err(e) = server::start_server(&bind, port, health, metrics).await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    // Create shutdown channel and signal handler
    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
    });

    relayer.run(shutdown_rx).await?;

    info!("AegisBridge Relayer stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,aegis_relayer=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Wait for shutdown signals (SIGINT/SIGTERM)
async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
