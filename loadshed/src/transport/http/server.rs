//! HTTP server implementation.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::service::LoadShedService;

use super::routes::routes;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Start the HTTP server with provided service.
pub async fn serve(config: ServerConfig, service: Arc<LoadShedService>) -> anyhow::Result<()> {
    let shutdown = service.shutdown_token();
    let app = routes(Arc::clone(&service));

    // Hostnames and IPv6 literals resolve here as well as IPv4 addresses.
    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let actual_addr = listener.local_addr()?;

    info!("Starting loadshed server on {}", actual_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    let totals = service.stats().totals();
    info!(?totals, "Server shutdown complete");

    Ok(())
}

/// Wait for SIGINT, SIGTERM or an in-process shutdown request, then cancel
/// `shutdown` so callers suspended at the gate stop waiting.
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. That only happens when the
/// tokio runtime is misconfigured, which should fail fast at startup.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler - is tokio runtime configured correctly?");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler - is tokio runtime configured correctly?")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
        _ = shutdown.cancelled() => {
            info!("Shutdown requested, shutting down...");
        }
    }

    shutdown.cancel();
}
