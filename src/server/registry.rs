//! Connection Registry
//!
//! Tracks every live connection against the configured capacity bound.
//! Membership is exactly "accepted and not yet closed".

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::connection::Connection;
use super::error::RegistryError;

/// How `max_connections` bounds the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
    /// At most `max_connections` live connections
    #[default]
    Exact,
    /// Reject only once the count already exceeds `max_connections`,
    /// which admits `max_connections + 1`
    OneOver,
}

impl CapacityPolicy {
    /// Whether one more connection fits when `current` are live
    pub fn admits(&self, current: usize, max_connections: usize) -> bool {
        match self {
            CapacityPolicy::Exact => current < max_connections,
            CapacityPolicy::OneOver => current <= max_connections,
        }
    }

    /// Largest number of live connections this policy allows
    pub fn effective_limit(&self, max_connections: usize) -> usize {
        match self {
            CapacityPolicy::Exact => max_connections,
            CapacityPolicy::OneOver => max_connections.saturating_add(1),
        }
    }
}

/// Insertion-ordered set of live connections
pub struct ConnectionRegistry {
    connections: RwLock<Vec<Connection>>,
    max_connections: usize,
    policy: CapacityPolicy,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize, policy: CapacityPolicy) -> Self {
        Self {
            connections: RwLock::new(Vec::new()),
            max_connections,
            policy,
        }
    }

    /// Register a connection, unless the registry is full
    pub async fn add(&self, conn: Connection) -> Result<(), RegistryError> {
        let mut connections = self.connections.write().await;
        if !self.policy.admits(connections.len(), self.max_connections) {
            return Err(RegistryError::CapacityExceeded {
                limit: self.policy.effective_limit(self.max_connections),
            });
        }

        tracing::debug!(peer = %conn.peer(), live = connections.len() + 1, "Connection registered");
        connections.push(conn);
        Ok(())
    }

    /// Remove a connection by peer identity. Returns false if it was absent.
    pub async fn remove(&self, conn: &Connection) -> bool {
        let mut connections = self.connections.write().await;
        match connections.iter().position(|c| c == conn) {
            Some(index) => {
                connections.remove(index);
                tracing::debug!(peer = %conn.peer(), live = connections.len(), "Connection deregistered");
                true
            }
            None => false,
        }
    }

    pub async fn contains(&self, conn: &Connection) -> bool {
        self.connections.read().await.iter().any(|c| c == conn)
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Copy of the live connections, in insertion order
    pub async fn snapshot(&self) -> Vec<Connection> {
        self.connections.read().await.clone()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn policy(&self) -> CapacityPolicy {
        self.policy
    }
}
