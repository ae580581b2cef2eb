//! HTTP server lifecycle.

use crate::error::AppError;
use axum::Router;
use std::future::IntoFuture;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Serve `app` until `shutdown` is cancelled.
///
/// After cancellation, in-flight requests get `drain_timeout` to finish;
/// connections still open after that are dropped.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
    drain_timeout: Duration,
) -> Result<(), AppError> {
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(|e| AppError::internal_with_source("HTTP server failed", e));
        }
        _ = shutdown.cancelled() => {}
    }

    log::info!("[server] Shutting down, draining connections for up to {:?}", drain_timeout);

    match tokio::time::timeout(drain_timeout, server).await {
        Ok(result) => result.map_err(|e| AppError::internal_with_source("HTTP server failed", e)),
        Err(_) => {
            log::warn!("[server] Drain timed out, dropping remaining connections");
            Ok(())
        }
    }
}

/// Resolve on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("[server] Failed to listen for Ctrl-C: {}", e);
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
                log::error!("[server] Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("[server] Ctrl-C received"),
        _ = terminate => log::info!("[server] SIGTERM received"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    #[tokio::test]
    async fn test_serve_returns_after_cancel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let app = Router::new().route("/health", get(|| async { "ok" }));
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(serve(listener, app, shutdown.clone(), Duration::from_secs(1)));
        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
