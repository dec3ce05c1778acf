//! Server event handlers
//!
//! One handler per event kind a client may send.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use super::dispatch::{EventHandler, HandlerContext};
use super::error::HandlerError;
use crate::events::{
    ClientDisconnecting, Event, RequestAuthentication, SendMessage, UNAUTHORIZED,
    UNAUTHORIZED_REASON,
};
use crate::ids::generate_client_id;

/// Mints a client ID for the requesting connection and announces it
///
/// The connection must already be registered; the session registers it
/// before reading its first frame.
pub struct RequestAuthenticationHandler;

#[async_trait]
impl EventHandler for RequestAuthenticationHandler {
    type Content = RequestAuthentication;

    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        content: RequestAuthentication,
    ) -> Result<(), HandlerError> {
        let state = ctx.state;

        if !state.registry().contains(ctx.conn).await {
            error!(peer = %ctx.conn.peer(), "Authentication requested by an unregistered connection");
            return Err(HandlerError::UnknownConnection {
                peer: ctx.conn.peer().to_string(),
            });
        }

        if let Some(expected) = state.config().auth_token.as_deref() {
            if content.token != expected {
                warn!(peer = %ctx.conn.peer(), "Rejected authentication with invalid token");
                let rejection =
                    Event::connection_rejected(state.id(), UNAUTHORIZED, UNAUTHORIZED_REASON);
                ctx.conn.send_event(&rejection).await?;
                return Err(HandlerError::InvalidToken);
            }
        }

        let client_id = generate_client_id();
        state.auth().authorize(client_id.clone(), ctx.conn.clone()).await;
        info!(client_id = %client_id, peer = %ctx.conn.peer(), "Client authenticated");

        let accepted = Event::connection_accepted(state.id(), &client_id);
        if let Err(e) = ctx.conn.send_event(&accepted).await {
            // The requester never learned its ID, so nobody else may hear of it
            state.auth().deauthorize(&client_id).await;
            warn!(client_id = %client_id, peer = %ctx.conn.peer(), error = %e, "Failed to deliver client ID");
            return Err(e);
        }

        state
            .broadcast(&Event::client_authenticated(state.id(), &client_id), ctx.conn)
            .await?;

        Ok(())
    }
}

/// Releases the sender's client ID and tells everyone else it left
///
/// Only the connection that owns the ID may release it.
pub struct ClientDisconnectingHandler;

#[async_trait]
impl EventHandler for ClientDisconnectingHandler {
    type Content = ClientDisconnecting;

    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        _content: ClientDisconnecting,
    ) -> Result<(), HandlerError> {
        let state = ctx.state;
        let client_id = ctx.origin;

        if !state.auth().is_authenticated(client_id, ctx.conn).await {
            return Err(HandlerError::NotAuthenticated {
                client_id: client_id.to_string(),
            });
        }

        state.auth().deauthorize(client_id).await;
        debug!(client_id = %client_id, "Client has disconnected");

        state
            .broadcast(&Event::client_disconnected(state.id(), client_id), ctx.conn)
            .await?;

        Ok(())
    }
}

/// Relays a message from an authenticated client to every other client
pub struct SendMessageHandler;

#[async_trait]
impl EventHandler for SendMessageHandler {
    type Content = SendMessage;

    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        content: SendMessage,
    ) -> Result<(), HandlerError> {
        let state = ctx.state;
        let sender = ctx.origin;

        if sender.is_empty() {
            return Err(HandlerError::EmptyClientId);
        }
        if !state.auth().is_authenticated(sender, ctx.conn).await {
            return Err(HandlerError::NotAuthenticated {
                client_id: sender.to_string(),
            });
        }

        state
            .broadcast(
                &Event::broadcast_message(state.id(), sender, &content.message),
                ctx.conn,
            )
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::events::{decode, EventContent, EventKind};
    use crate::server::connection::Connection;
    use crate::server::error::{BroadcastError, DispatchError};
    use crate::server::fanout::{AuthorizedFanout, Fanout};
    use crate::server::{AuthenticationTable, ServerState};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, DuplexStream};

    /// Counts fan-out calls, then delegates to the real fan-out
    #[derive(Default)]
    struct SpyFanout {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fanout for SpyFanout {
        async fn broadcast(
            &self,
            table: &AuthenticationTable,
            frame: &[u8],
            exclude: &Connection,
        ) -> Vec<BroadcastError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            AuthorizedFanout.broadcast(table, frame, exclude).await
        }
    }

    fn state_with_spy(config: ServerConfig) -> (ServerState, Arc<SpyFanout>) {
        let spy = Arc::new(SpyFanout::default());
        let state = ServerState::new(config).with_fanout(spy.clone());
        (state, spy)
    }

    fn pair(peer: &str) -> (Connection, DuplexStream) {
        let (local, remote) = tokio::io::duplex(1024);
        (Connection::new(peer, local), remote)
    }

    async fn read_event(remote: &mut DuplexStream) -> Event {
        let mut buf = vec![0u8; 1024];
        let n = remote.read(&mut buf).await.unwrap();
        decode(&buf[..n]).unwrap()
    }

    #[tokio::test]
    async fn test_authentication_replies_and_announces() {
        let (state, spy) = state_with_spy(ServerConfig::default());
        let (existing, mut existing_remote) = pair("a:1");
        let (requester, mut requester_remote) = pair("b:2");
        state.registry().add(existing.clone()).await.unwrap();
        state.registry().add(requester.clone()).await.unwrap();
        state.auth().authorize("client-a", existing.clone()).await;

        state
            .dispatcher()
            .dispatch(&state, &requester, Event::request_authentication(""))
            .await
            .unwrap();

        let reply = read_event(&mut requester_remote).await;
        assert_eq!(reply.id, state.id());
        let client_id = match reply.content {
            EventContent::ConnectionAccepted(accepted) => accepted.client_id,
            other => panic!("Expected ConnectionAccepted, got {:?}", other),
        };
        assert!(client_id.starts_with("client-"));
        assert!(state.auth().is_authenticated(&client_id, &requester).await);

        let announcement = read_event(&mut existing_remote).await;
        assert_eq!(announcement.kind(), EventKind::ClientAuthenticated);
        match announcement.content {
            EventContent::ClientAuthenticated(c) => assert_eq!(c.client_id, client_id),
            other => panic!("Expected ClientAuthenticated, got {:?}", other),
        }
        assert_eq!(spy.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_undelivered_client_id_is_released() {
        let (state, spy) = state_with_spy(ServerConfig::default());
        let (requester, requester_remote) = pair("b:2");
        state.registry().add(requester.clone()).await.unwrap();
        drop(requester_remote);

        let result = state
            .dispatcher()
            .dispatch(&state, &requester, Event::request_authentication(""))
            .await;

        assert!(matches!(
            result,
            Err(DispatchError::Handler {
                source: HandlerError::Write(_),
                ..
            })
        ));
        assert!(state.auth().is_empty().await);
        assert!(state.auth().deauthorize_connection(&requester).await.is_empty());
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_authentication_requires_registered_connection() {
        let (state, spy) = state_with_spy(ServerConfig::default());
        let (stranger, _remote) = pair("x:9");

        let result = state
            .dispatcher()
            .dispatch(&state, &stranger, Event::request_authentication(""))
            .await;

        assert!(matches!(
            result,
            Err(DispatchError::Handler {
                source: HandlerError::UnknownConnection { .. },
                ..
            })
        ));
        assert!(state.auth().is_empty().await);
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_authentication_with_wrong_token_is_rejected() {
        let config = ServerConfig {
            auth_token: Some("secret".to_string()),
            ..ServerConfig::default()
        };
        let (state, spy) = state_with_spy(config);
        let (requester, mut remote) = pair("b:2");
        state.registry().add(requester.clone()).await.unwrap();

        let result = state
            .dispatcher()
            .dispatch(&state, &requester, Event::request_authentication("guess"))
            .await;
        assert!(result.is_err());

        match read_event(&mut remote).await.content {
            EventContent::ConnectionRejected(r) => {
                assert_eq!(r.code, UNAUTHORIZED);
                assert_eq!(r.reason, UNAUTHORIZED_REASON);
            }
            other => panic!("Expected ConnectionRejected, got {:?}", other),
        }
        assert!(state.auth().is_empty().await);
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);

        state
            .dispatcher()
            .dispatch(&state, &requester, Event::request_authentication("secret"))
            .await
            .unwrap();
        assert_eq!(state.auth().len().await, 1);
    }

    #[tokio::test]
    async fn test_send_message_with_empty_id_never_broadcasts() {
        let (state, spy) = state_with_spy(ServerConfig::default());
        let (conn, _remote) = pair("a:1");
        state.registry().add(conn.clone()).await.unwrap();
        state.auth().authorize("client-a", conn.clone()).await;

        let result = state
            .dispatcher()
            .dispatch(&state, &conn, Event::send_message("", "hi"))
            .await;

        assert!(matches!(
            result,
            Err(DispatchError::Handler {
                source: HandlerError::EmptyClientId,
                ..
            })
        ));
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_message_from_unauthenticated_never_broadcasts() {
        let (state, spy) = state_with_spy(ServerConfig::default());
        let (owner, _owner_remote) = pair("a:1");
        let (impostor, _impostor_remote) = pair("b:2");
        state.auth().authorize("client-a", owner).await;

        for (conn, id) in [(&impostor, "client-a"), (&impostor, "client-zzz")] {
            let result = state
                .dispatcher()
                .dispatch(&state, conn, Event::send_message(id, "hi"))
                .await;
            assert!(matches!(
                result,
                Err(DispatchError::Handler {
                    source: HandlerError::NotAuthenticated { .. },
                    ..
                })
            ));
        }
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_message_relays_without_echo() {
        let (state, spy) = state_with_spy(ServerConfig::default());
        let (a, mut a_remote) = pair("a:1");
        let (b, mut b_remote) = pair("b:2");
        state.auth().authorize("client-a", a.clone()).await;
        state.auth().authorize("client-b", b.clone()).await;

        state
            .dispatcher()
            .dispatch(&state, &a, Event::send_message("client-a", "hi"))
            .await
            .unwrap();

        match read_event(&mut b_remote).await.content {
            EventContent::BroadcastMessage(m) => {
                assert_eq!(m.sender, "client-a");
                assert_eq!(m.message, "hi");
            }
            other => panic!("Expected BroadcastMessage, got {:?}", other),
        }
        assert_eq!(spy.calls.load(Ordering::SeqCst), 1);

        // A got nothing: closing its writer leaves an empty stream
        state.auth().deauthorize("client-a").await;
        drop(a);
        let mut buf = [0u8; 16];
        assert_eq!(a_remote.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_disconnecting_releases_id_and_announces() {
        let (state, _spy) = state_with_spy(ServerConfig::default());
        let (a, _a_remote) = pair("a:1");
        let (b, mut b_remote) = pair("b:2");
        state.auth().authorize("client-a", a.clone()).await;
        state.auth().authorize("client-b", b.clone()).await;

        state
            .dispatcher()
            .dispatch(&state, &a, Event::disconnecting("client-a"))
            .await
            .unwrap();

        assert!(!state.auth().is_authenticated("client-a", &a).await);
        match read_event(&mut b_remote).await.content {
            EventContent::ClientDisconnected(d) => assert_eq!(d.client_id, "client-a"),
            other => panic!("Expected ClientDisconnected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disconnecting_cannot_release_foreign_id() {
        let (state, spy) = state_with_spy(ServerConfig::default());
        let (a, _a_remote) = pair("a:1");
        let (b, _b_remote) = pair("b:2");
        state.auth().authorize("client-a", a.clone()).await;

        let result = state
            .dispatcher()
            .dispatch(&state, &b, Event::disconnecting("client-a"))
            .await;

        assert!(result.is_err());
        assert!(state.auth().is_authenticated("client-a", &a).await);
        assert_eq!(spy.calls.load(Ordering::SeqCst), 0);
    }
}
