//! # LIMS Workflow Server
//!
//! ```bash
//! # In-memory store with the bundled fixtures
//! LIMS__DATABASE__FIXTURES_PATH=config/fixtures.dev.json cargo run --bin lims-server
//!
//! # PostgreSQL
//! LIMS_ENV=production LIMS__DATABASE__BACKEND=postgres DATABASE_URL=postgres://... cargo run --bin lims-server
//! ```

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use lims_workflow::config::ConfigManager;
use lims_workflow::logging;
use lims_workflow::web::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let manager = ConfigManager::load().context("failed to load configuration")?;
    logging::init_structured_logging(&manager.config().logging, manager.environment());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = manager.environment(),
        "Starting LIMS workflow server"
    );

    let config = manager.config().clone();
    let bind_address = config.server.bind_address.clone();
    let state = AppState::from_config(config)
        .await
        .context("failed to initialize application state")?;

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    info!(address = %listener.local_addr()?, "Listening");

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
