//! Review Assigner - reviewer assignment and rebalancing for team pull requests.
//!
//! The library exposes the store, the services and the HTTP router; the
//! binary only loads configuration and calls [`run`].

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod selection;
pub mod server;
pub mod services;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::logging::LogFacade;
use crate::services::{rebalance_queue, RebalanceWorker};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Install the process-wide log backend.
///
/// `RUST_LOG` wins over the configured default. Records emitted through the
/// `log` crate are captured as well. Calling this twice is harmless.
pub fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_log_filter()));

    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        log::debug!("Log backend already installed");
    }
}

/// Run the service until Ctrl-C or SIGTERM.
///
/// Opens and migrates the store, starts the rebalance worker, serves HTTP,
/// then stops the worker once the server has drained.
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let pool = db::initialize_with(&config.database_path, config.db_max_connections).await?;
    log::info!("Database ready at {}", config.database_path.display());

    let shutdown = CancellationToken::new();

    let (publisher, rx) = rebalance_queue::channel(
        config.rebalance_queue_capacity,
        LogFacade::shared("review_assigner::rebalance"),
    );
    let worker = RebalanceWorker::new(pool.clone(), LogFacade::shared("review_assigner::rebalance"));
    let worker_task = tokio::spawn(worker.run(rx, shutdown.clone()));

    let state = api::AppState::new(
        pool.clone(),
        publisher,
        LogFacade::shared("review_assigner::service"),
    );

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .map_err(|e| {
            AppError::internal_with_source(format!("failed to bind {}", config.listen_addr), e)
        })?;
    log::info!("Listening on http://{}", config.listen_addr);

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        server::shutdown_signal().await;
        signal_token.cancel();
    });

    let served = server::serve(
        listener,
        api::router(state),
        shutdown.clone(),
        config.shutdown_timeout,
    )
    .await;

    shutdown.cancel();
    match worker_task.await {
        Ok(stats) => log::info!(
            "Rebalance worker joined: {} processed, {} failed",
            stats.processed,
            stats.failed
        ),
        Err(e) => log::error!("Rebalance worker task failed: {}", e),
    }

    pool.close().await;
    served
}
