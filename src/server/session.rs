//! Connection Session
//!
//! Drives one accepted stream from registration to cleanup.
//!
//! ```text
//! Accepted ──(registry full)──────────────────────────────▶ Closed
//! Accepted ──▶ Authenticating ──(request_authentication)──▶ Authenticated
//!   any    ──(EOF / read error / disconnecting)───────────▶ Closed
//! ```
//!
//! `Authenticating` is nominal: frames are dispatched in every open state and
//! the handlers decide what an unauthenticated connection may do. The current
//! phase is published on a `watch` channel; see [`ConnectionSession::subscribe`].

use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadHalf};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::connection::Connection;
use super::error::RegistryError;
use super::state::ServerState;
use crate::events::{decode, Event, EventKind, SERVER_FULL, SERVER_FULL_REASON};

/// Lifecycle position of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Accepted,
    Authenticating,
    Authenticated,
    Closed,
}

/// One connection's lifetime: the read loop and its cleanup
pub struct ConnectionSession<S> {
    state: Arc<ServerState>,
    conn: Connection,
    reader: ReadHalf<S>,
    phase: watch::Sender<SessionState>,
}

impl<S> ConnectionSession<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Register `stream` with the server
    ///
    /// When the registry is full the peer is sent `connection_rejected`, the
    /// stream is closed, and the capacity error is returned.
    pub async fn accept(
        state: Arc<ServerState>,
        stream: S,
        peer: impl Into<String>,
    ) -> Result<Self, RegistryError> {
        let (reader, writer) = tokio::io::split(stream);
        let conn = Connection::new(peer, writer).with_write_timeout(state.config().write_timeout());

        if let Err(e) = state.registry().add(conn.clone()).await {
            warn!(peer = %conn.peer(), error = %e, "Connection rejected");

            let rejection = Event::connection_rejected(state.id(), SERVER_FULL, SERVER_FULL_REASON);
            if let Err(send_err) = conn.send_event(&rejection).await {
                debug!(peer = %conn.peer(), error = %send_err, "Failed to send rejection");
            }
            if let Err(close_err) = conn.shutdown().await {
                debug!(peer = %conn.peer(), error = %close_err, "Failed to close rejected stream");
            }
            return Err(e);
        }

        info!(peer = %conn.peer(), "Connection accepted");

        Ok(Self {
            state,
            conn,
            reader,
            phase: watch::channel(SessionState::Accepted).0,
        })
    }

    pub fn phase(&self) -> SessionState {
        *self.phase.borrow()
    }

    /// Follow the phase while [`run`](Self::run) owns the session
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: SessionState) {
        self.phase.send_replace(phase);
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Read and dispatch frames until the stream ends, then clean up.
    /// Returns the final phase, always `Closed`.
    pub async fn run(mut self) -> SessionState {
        let mut buf = vec![0u8; self.state.config().frame_buffer_size];
        self.set_phase(SessionState::Authenticating);

        loop {
            let n = match self.reader.read(&mut buf).await {
                Ok(0) => {
                    debug!(peer = %self.conn.peer(), "Peer closed the stream");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    error!(peer = %self.conn.peer(), error = %e, "Error reading from connection");
                    break;
                }
            };

            let event = match decode(&buf[..n]) {
                Ok(event) => event,
                Err(e) => {
                    warn!(peer = %self.conn.peer(), error = %e, "Dropping undecodable frame");
                    continue;
                }
            };

            let kind = event.kind();
            let state = Arc::clone(&self.state);
            match state.dispatcher().dispatch(&state, &self.conn, event).await {
                Ok(()) => {
                    if kind == EventKind::RequestAuthentication {
                        self.set_phase(SessionState::Authenticated);
                    }
                }
                Err(e) => {
                    warn!(peer = %self.conn.peer(), event = %kind, error = %e, "Event not handled");
                }
            }

            if kind == EventKind::ClientDisconnecting {
                break;
            }
        }

        self.close().await;
        self.phase()
    }

    /// Drop the connection from the authentication table, close the stream,
    /// announce each released ID, then leave the registry
    async fn close(&mut self) {
        // Out of the table first, so no new fan-out picks up a closing stream
        let released = self.state.auth().deauthorize_connection(&self.conn).await;

        if let Err(e) = self.conn.shutdown().await {
            debug!(peer = %self.conn.peer(), error = %e, "Error closing stream");
        }

        for client_id in &released {
            let event = Event::client_disconnected(self.state.id(), client_id);
            if let Err(e) = self.state.broadcast(&event, &self.conn).await {
                error!(client_id = %client_id, error = %e, "Failed to announce disconnect");
            }
        }

        self.state.registry().remove(&self.conn).await;
        self.set_phase(SessionState::Closed);

        info!(peer = %self.conn.peer(), released = released.len(), "Connection lost");
    }
}

/// Serve one stream for its whole lifetime
pub async fn handle_connection<S>(state: Arc<ServerState>, stream: S, peer: String)
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    if let Ok(session) = ConnectionSession::accept(state, stream, peer).await {
        session.run().await;
    }
}
