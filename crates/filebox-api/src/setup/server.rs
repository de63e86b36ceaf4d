//! Server startup and graceful shutdown

use anyhow::{Context, Result};
use axum::Router;
use filebox_core::Config;
use tokio_util::sync::CancellationToken;

/// Start the server with graceful shutdown
///
/// `shutdown` is cancelled once a termination signal arrives, and also ends
/// the server when cancelled by someone else.
pub async fn start_server(config: &Config, app: Router, shutdown: CancellationToken) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port);
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(
        max_upload_mb = ?config.max_upload_size_bytes.map(|b| b / 1024 / 1024),
        static_dir = ?config.static_dir,
        vision_enabled = config.vision_credentials().is_some(),
        "Server ready and accepting connections"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

/// Resolves on Ctrl+C, SIGTERM, or cancellation of `shutdown`, and cancels
/// `shutdown` on the way out.
async fn shutdown_signal(shutdown: CancellationToken) {
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
        _ = shutdown.cancelled() => {
            tracing::info!("Shutdown requested");
        },
    }

    tracing::info!("Shutting down gracefully...");
    shutdown.cancel();
}
