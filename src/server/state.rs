//! Shared server state
//!
//! One `ServerState` is shared (behind an `Arc`) by every session task.

use std::sync::Arc;

use super::auth::AuthenticationTable;
use super::connection::Connection;
use super::dispatch::EventDispatcher;
use super::error::BroadcastError;
use super::fanout::{AuthorizedFanout, Fanout};
use super::registry::ConnectionRegistry;
use crate::config::ServerConfig;
use crate::events::{encode, EncodeError, Event};
use crate::ids::generate_server_id;

/// State shared by all connection sessions
pub struct ServerState {
    id: String,
    config: ServerConfig,
    registry: ConnectionRegistry,
    auth: AuthenticationTable,
    dispatcher: EventDispatcher,
    fanout: Arc<dyn Fanout>,
}

impl ServerState {
    /// Create state with the default handlers and fan-out
    pub fn new(config: ServerConfig) -> Self {
        let registry = ConnectionRegistry::new(config.max_connections, config.capacity_policy);

        Self {
            id: generate_server_id(),
            config,
            registry,
            auth: AuthenticationTable::new(),
            dispatcher: EventDispatcher::with_default_handlers(),
            fanout: Arc::new(AuthorizedFanout),
        }
    }

    /// Replace the fan-out strategy
    pub fn with_fanout(mut self, fanout: Arc<dyn Fanout>) -> Self {
        self.fanout = fanout;
        self
    }

    /// Replace the dispatch table
    pub fn with_dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Server ID, used as the originator of server events
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn auth(&self) -> &AuthenticationTable {
        &self.auth
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Encode `event` and fan it out to every authorized connection except
    /// `exclude`. Failed deliveries are logged and returned.
    pub async fn broadcast(
        &self,
        event: &Event,
        exclude: &Connection,
    ) -> Result<Vec<BroadcastError>, EncodeError> {
        let frame = encode(event)?;
        let failures = self.fanout.broadcast(&self.auth, &frame, exclude).await;

        for failure in &failures {
            tracing::warn!(
                event = %event.kind(),
                client_id = %failure.client_id,
                peer = %failure.peer,
                error = %failure.source,
                "Broadcast delivery failed"
            );
        }

        Ok(failures)
    }
}
