//! TCP Listener
//!
//! Accepts connections and spawns one session task per stream.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tcp_notify::config::ServerConfig;
//! use tcp_notify::server::{shutdown_signal, RelayServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = RelayServer::new(ServerConfig::default())?;
//!     let listener = server.bind().await?;
//!     server.serve_with_shutdown(listener, shutdown_signal()).await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::error::ServerError;
use super::session::handle_connection;
use super::state::ServerState;
use crate::config::ServerConfig;

/// The relay server: shared state plus an accept loop
pub struct RelayServer {
    state: Arc<ServerState>,
}

impl RelayServer {
    /// Validate `config` and build the server state
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        Ok(Self::with_state(ServerState::new(config)))
    }

    /// Wrap prepared state, e.g. with a custom dispatcher or fan-out
    pub fn with_state(state: ServerState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.state.config().addr();
        let listener = TcpListener::bind(&addr).await?;
        info!(addr = %listener.local_addr()?, server_id = %self.state.id(), "Listening");
        Ok(listener)
    }

    /// Bind and serve until the process is signalled
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    /// Accept on `listener` until `shutdown` completes
    ///
    /// Sessions already running keep going until their peers disconnect or
    /// the runtime stops.
    pub async fn serve_with_shutdown<F>(
        &self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_session(stream, addr),
                    Err(e) => {
                        // Per-connection accept failures (e.g. EMFILE) are not fatal
                        error!(error = %e, "Failed to accept connection");
                    }
                },
                _ = &mut shutdown => break,
            }
        }

        info!(server_id = %self.state.id(), "Relay server stopped accepting");
        Ok(())
    }

    fn spawn_session(&self, stream: tokio::net::TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer = %addr, error = %e, "Failed to set TCP_NODELAY");
        }
        let state = Arc::clone(&self.state);
        tokio::spawn(handle_connection(state, stream, addr.to_string()));
    }
}

/// Wait for Ctrl+C or, on Unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping relay");
}
