//! Authentication Table
//!
//! Maps each authenticated client ID to the connection that owns it. A client
//! only counts as authenticated when the ID is present *and* the caller is the
//! owning connection, so a different socket cannot claim someone else's ID.

use std::collections::HashMap;
use tokio::sync::RwLock;

use super::connection::Connection;

/// Client ID → owning connection
#[derive(Default)]
pub struct AuthenticationTable {
    entries: RwLock<HashMap<String, Connection>>,
}

impl AuthenticationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `client_id` to `conn`, replacing any previous owner
    pub async fn authorize(&self, client_id: impl Into<String>, conn: Connection) {
        let client_id = client_id.into();
        tracing::debug!(client_id = %client_id, peer = %conn.peer(), "Client authorized");
        self.entries.write().await.insert(client_id, conn);
    }

    pub async fn is_authenticated(&self, client_id: &str, conn: &Connection) -> bool {
        self.entries
            .read()
            .await
            .get(client_id)
            .is_some_and(|owner| owner == conn)
    }

    /// Remove `client_id`. Returns false if it was not present.
    pub async fn deauthorize(&self, client_id: &str) -> bool {
        self.entries.write().await.remove(client_id).is_some()
    }

    /// Remove every ID owned by `conn`, returning the removed IDs
    pub async fn deauthorize_connection(&self, conn: &Connection) -> Vec<String> {
        let mut entries = self.entries.write().await;
        let owned: Vec<String> = entries
            .iter()
            .filter(|(_, owner)| *owner == conn)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &owned {
            entries.remove(id);
        }
        owned
    }

    /// Copy of every (client ID, connection) pair
    pub async fn snapshot(&self) -> Vec<(String, Connection)> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(id, conn)| (id.clone(), conn.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(peer: &str) -> Connection {
        let (local, _remote) = tokio::io::duplex(64);
        Connection::new(peer, local)
    }

    #[tokio::test]
    async fn test_authorize_and_check() {
        let table = AuthenticationTable::new();
        let a = conn("a:1");

        assert!(!table.is_authenticated("client-1", &a).await);
        table.authorize("client-1", a.clone()).await;
        assert!(table.is_authenticated("client-1", &a).await);
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn test_id_claimed_from_other_connection() {
        let table = AuthenticationTable::new();
        let a = conn("a:1");
        let b = conn("b:2");

        table.authorize("client-1", b.clone()).await;
        assert!(!table.is_authenticated("client-1", &a).await);
        assert!(table.is_authenticated("client-1", &b).await);
    }

    #[tokio::test]
    async fn test_authorize_overwrites_owner() {
        let table = AuthenticationTable::new();
        let a = conn("a:1");
        let b = conn("b:2");

        table.authorize("client-1", a.clone()).await;
        table.authorize("client-1", b.clone()).await;

        assert!(!table.is_authenticated("client-1", &a).await);
        assert!(table.is_authenticated("client-1", &b).await);
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn test_deauthorize_is_idempotent() {
        let table = AuthenticationTable::new();
        let a = conn("a:1");
        table.authorize("client-1", a.clone()).await;

        assert!(table.deauthorize("client-1").await);
        assert!(!table.deauthorize("client-1").await);
        assert!(!table.is_authenticated("client-1", &a).await);
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_deauthorize_connection() {
        let table = AuthenticationTable::new();
        let a = conn("a:1");
        let b = conn("b:2");
        table.authorize("client-1", a.clone()).await;
        table.authorize("client-2", b.clone()).await;

        let removed = table.deauthorize_connection(&a).await;
        assert_eq!(removed, vec!["client-1".to_string()]);
        assert_eq!(table.len().await, 1);
        assert!(table.is_authenticated("client-2", &b).await);

        assert!(table.deauthorize_connection(&a).await.is_empty());
    }
}
