//! # tcp-notify
//!
//! A TCP notification relay. Clients connect, obtain a server-minted ID, and
//! exchange JSON events; the server fans each client's messages out to every
//! other authenticated client and announces arrivals and departures.
//!
//! ## Features
//!
//! - **Bounded admission**: a capacity limit with an explicit rejection event
//! - **Typed wire events**: two-pass JSON decoding into per-kind content types
//! - **Pluggable dispatch**: handlers keyed by the content type they accept
//! - **Best-effort fan-out**: a dead peer never blocks delivery to the rest
//!
//! ## Modules
//!
//! - [`events`]: Wire events and their codec
//! - [`server`]: Listener, sessions, registry, authentication and fan-out
//! - [`client`]: Async client for the same protocol
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tcp_notify::client::RelayClient;
//! use tcp_notify::config::ServerConfig;
//! use tcp_notify::server::RelayServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = RelayServer::new(ServerConfig { port: 0, ..ServerConfig::default() })?;
//!     let listener = server.bind().await?;
//!     let addr = listener.local_addr()?;
//!     tokio::spawn(async move { server.serve_with_shutdown(listener, std::future::pending()).await });
//!
//!     let mut client = RelayClient::connect(addr).await?;
//!     let id = client.authenticate("").await?;
//!     println!("Authenticated as {}", id);
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod events;
pub mod ids;
pub mod logging;
pub mod server;

pub use client::{ClientError, Notification, RelayClient};
pub use config::{Config, ConfigError, LoggingConfig, ServerConfig};
pub use events::{Event, EventContent, EventKind};
pub use server::{CapacityPolicy, RelayServer, ServerState};
