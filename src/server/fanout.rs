//! Broadcast Fan-out
//!
//! Delivers one encoded frame to every authorized connection except the
//! sender. Delivery is best effort and at most once per recipient: writes
//! happen one after another, a failed write is recorded and the fan-out moves
//! on. A recipient that stalls delays the ones after it unless a write
//! timeout is configured. Recipients whose connection is already closed are
//! skipped without an error.

use async_trait::async_trait;
use std::collections::HashSet;
use std::io;

use super::auth::AuthenticationTable;
use super::connection::Connection;
use super::error::BroadcastError;

/// Strategy for delivering a frame to the authorized set
#[async_trait]
pub trait Fanout: Send + Sync {
    /// Write `frame` to every authorized connection other than `exclude`.
    /// Returns one error per failed recipient.
    async fn broadcast(
        &self,
        table: &AuthenticationTable,
        frame: &[u8],
        exclude: &Connection,
    ) -> Vec<BroadcastError>;
}

/// Serial fan-out over a snapshot of the authentication table
#[derive(Debug, Default, Clone, Copy)]
pub struct AuthorizedFanout;

#[async_trait]
impl Fanout for AuthorizedFanout {
    async fn broadcast(
        &self,
        table: &AuthenticationTable,
        frame: &[u8],
        exclude: &Connection,
    ) -> Vec<BroadcastError> {
        // Snapshot so no lock is held across writes
        let recipients = table.snapshot().await;

        let mut errors = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut delivered = 0;
        let mut skipped = 0;

        for (client_id, conn) in recipients {
            if conn == *exclude || !visited.insert(conn.peer().to_string()) {
                continue;
            }

            match conn.send(frame).await {
                Ok(()) => delivered += 1,
                Err(e) if e.kind() == io::ErrorKind::NotConnected => skipped += 1,
                Err(source) => errors.push(BroadcastError {
                    client_id,
                    peer: conn.peer().to_string(),
                    source,
                }),
            }
        }

        tracing::trace!(
            delivered,
            skipped,
            failed = errors.len(),
            "Broadcast frame"
        );

        errors
    }
}
