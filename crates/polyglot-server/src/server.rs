//! HTTP server implementation.
//!
//! This module provides the main [`PolyglotServer`] struct for running
//! the host API over HTTP.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};

use polyglot_common::RuntimeError;

use crate::router::{AdminRouterConfig, build_router_with_admin};
use crate::state::AppState;

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server.
    pub bind_addr: SocketAddr,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Enable graceful shutdown on SIGTERM/SIGINT.
    pub graceful_shutdown: bool,
    /// Admin API, mounted only when set.
    pub admin: Option<AdminRouterConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            request_timeout_secs: 30,
            graceful_shutdown: true,
            admin: None,
        }
    }
}

impl ServerConfig {
    /// Create a new server config with custom bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Create a new server config with custom timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Mount the Admin API under `prefix`, guarded by `token`.
    pub fn with_admin(mut self, prefix: impl Into<String>, token: impl Into<String>) -> Self {
        self.admin = Some(AdminRouterConfig {
            prefix: prefix.into(),
            token: token.into(),
        });
        self
    }

    /// Get the request timeout as Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Polyglot runtime HTTP server.
///
/// # Example
///
/// ```ignore
/// use polyglot_common::RuntimeConfig;
/// use polyglot_server::{AppState, PolyglotServer, ServerConfig};
///
/// let state = AppState::with_defaults(&RuntimeConfig::default());
/// let server = PolyglotServer::new(state, ServerConfig::default());
/// server.run().await?;
/// ```
pub struct PolyglotServer {
    /// Application state.
    state: AppState,
    /// Server configuration.
    config: ServerConfig,
}

impl PolyglotServer {
    /// Create a new server instance.
    pub fn new(state: AppState, config: ServerConfig) -> Self {
        Self { state, config }
    }

    /// Get a reference to the application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server until shutdown, then tear every runtime down.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot bind to the address.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let app = build_router_with_admin(
            self.state.clone(),
            self.config.request_timeout(),
            self.config.admin.clone(),
        );

        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|e| RuntimeError::invalid_config(format!("Failed to bind: {e}")))?;

        info!(
            addr = %self.config.bind_addr,
            admin = self.config.admin.is_some(),
            "Starting HTTP server"
        );

        let served = if self.config.graceful_shutdown {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
        } else {
            axum::serve(listener, app).await
        };

        self.state.manager().close().await;
        served.map_err(|e| RuntimeError::invalid_config(format!("Server error: {e}")))?;

        info!("Server shutdown complete");
        Ok(())
    }

    /// Start the server on an ephemeral port and return a handle for testing.
    pub async fn start_test(
        state: AppState,
        config: ServerConfig,
    ) -> Result<TestHandle, RuntimeError> {
        let app = build_router_with_admin(
            state.clone(),
            config.request_timeout(),
            config.admin.clone(),
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| RuntimeError::invalid_config(format!("Failed to bind: {e}")))?;

        let addr = listener
            .local_addr()
            .map_err(|e| RuntimeError::invalid_config(format!("Failed to get addr: {e}")))?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Ok(TestHandle {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle,
        })
    }
}

/// Handle for a test server instance.
pub struct TestHandle {
    /// The address the server is bound to.
    addr: SocketAddr,
    /// Application state.
    state: AppState,
    /// Shutdown signal sender.
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    /// Server task handle.
    handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

impl TestHandle {
    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the server URL.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Shutdown the server gracefully and close the runtimes.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
        self.state.manager().close().await;
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
