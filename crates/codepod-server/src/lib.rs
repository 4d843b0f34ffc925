//! CodePod runtime server.
//!
//! Accepts client commands over a WebSocket, hands them to a
//! [`SessionSupervisor`] and streams kernel events back on the same socket.
//!
//! # Architecture
//!
//! - **Protocol**: framing of inbound commands and outbound events
//! - **Routes**: HTTP and WebSocket handlers

pub mod error;
pub mod protocol;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use codepod_core::SessionSupervisor;

pub use error::{ServerError, ServerResult};
pub use routes::{AppState, create_router, handle_text};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4020,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> ServerResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ServerError::InvalidAddress(format!("{}:{}", self.host, self.port)))
    }
}

/// Serve until Ctrl+C, then kill every kernel the supervisor owns.
pub async fn serve(config: ServerConfig, supervisor: Arc<SessionSupervisor>) -> ServerResult<()> {
    let addr = config.socket_addr()?;
    let state = Arc::new(AppState {
        supervisor: supervisor.clone(),
    });
    let app = create_router(state);

    tracing::info!(
        "Starting CodePod runtime at ws://{}/ws ({} backend)",
        addr,
        supervisor.backend_type()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
        }
    });

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown_rx.await;
    });
    server.await?;

    supervisor.shutdown().await;
    tracing::info!("Server shutdown complete");

    Ok(())
}
