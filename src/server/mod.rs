//! Relay Server
//!
//! TCP server that admits a bounded number of connections, authenticates
//! clients, and fans notifications out to every authenticated client.
//!
//! ## Architecture
//!
//! ```text
//! TcpListener ──accept──▶ ConnectionSession (one task per stream)
//!                              │ decode
//!                              ▼
//!                         EventDispatcher ──▶ handlers
//!                                                │
//!           ConnectionRegistry   AuthenticationTable ──▶ Fanout ──▶ peers
//! ```
//!
//! All sessions share one [`ServerState`].

mod auth;
mod connection;
mod dispatch;
mod error;
mod fanout;
mod handlers;
mod listener;
mod registry;
mod session;
mod state;

pub use auth::AuthenticationTable;
pub use connection::Connection;
pub use dispatch::{EventDispatcher, EventHandler, HandlerContext};
pub use error::{BroadcastError, DispatchError, HandlerError, RegistryError, ServerError};
pub use fanout::{AuthorizedFanout, Fanout};
pub use handlers::{ClientDisconnectingHandler, RequestAuthenticationHandler, SendMessageHandler};
pub use listener::{shutdown_signal, RelayServer};
pub use registry::{CapacityPolicy, ConnectionRegistry};
pub use session::{handle_connection, ConnectionSession, SessionState};
pub use state::ServerState;
