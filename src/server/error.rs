//! Server error types
//!
//! None of these are fatal to the process: each is scoped to one
//! connection, one frame, or one fan-out call.

use std::io;
use thiserror::Error;

use crate::config::ConfigError;
use crate::events::{EncodeError, EventKind};

/// Errors from the connection registry
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Server full (limit: {limit})")]
    CapacityExceeded { limit: usize },
}

/// Errors returned by event handlers
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The event carried no originator ID
    #[error("Client ID is empty")]
    EmptyClientId,

    /// The originator ID is not authenticated for this connection
    #[error("Client '{client_id}' is not authenticated")]
    NotAuthenticated { client_id: String },

    /// The connection is not tracked by the registry
    #[error("Connection {peer} is not registered")]
    UnknownConnection { peer: String },

    /// The presented token did not match the configured one
    #[error("Invalid authentication token")]
    InvalidToken,

    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Writing a reply to the requesting connection failed
    #[error("Failed to write reply: {0}")]
    Write(#[from] io::Error),
}

/// Errors from routing an event to its handler
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No handler registered for '{0}'")]
    NoHandlerRegistered(EventKind),

    /// Content does not carry the shape the handler accepts. The dispatch
    /// table keys handlers by their own content kind, so decoded events
    /// cannot reach this.
    #[error("Content does not match handler for '{0}'")]
    ContentMismatch(EventKind),

    #[error("Handler for '{kind}' failed: {source}")]
    Handler {
        kind: EventKind,
        #[source]
        source: HandlerError,
    },
}

/// A failed delivery to one recipient of a broadcast
#[derive(Error, Debug)]
#[error("Failed to deliver to {client_id} ({peer}): {source}")]
pub struct BroadcastError {
    pub client_id: String,
    pub peer: String,
    #[source]
    pub source: io::Error,
}

/// Errors that stop the server from starting or serving
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
