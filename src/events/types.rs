//! Event Types
//!
//! Defines the events exchanged between relay clients and the server.
//! Every event shares the same envelope (`event`, `id`, `timestamp`,
//! `content`); the `event` discriminant selects the content shape.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rejection code sent when the server is at capacity
pub const SERVER_FULL: i32 = 504;

/// Rejection reason sent when the server is at capacity
pub const SERVER_FULL_REASON: &str = "Server Full: Server is at its max capacity";

/// Rejection code sent when an authentication token does not match
pub const UNAUTHORIZED: i32 = 401;

/// Rejection reason sent when an authentication token does not match
pub const UNAUTHORIZED_REASON: &str = "Unauthorized: invalid token";

/// Event discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RequestAuthentication,
    ConnectionAccepted,
    ConnectionRejected,
    ClientAuthenticated,
    ClientDisconnecting,
    ClientDisconnected,
    SendMessage,
    BroadcastMessage,
}

impl EventKind {
    /// Every known kind, in wire-table order
    pub const ALL: [EventKind; 8] = [
        EventKind::RequestAuthentication,
        EventKind::ConnectionAccepted,
        EventKind::ConnectionRejected,
        EventKind::ClientAuthenticated,
        EventKind::ClientDisconnecting,
        EventKind::ClientDisconnected,
        EventKind::SendMessage,
        EventKind::BroadcastMessage,
    ];

    /// Wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RequestAuthentication => "request_authentication",
            EventKind::ConnectionAccepted => "connection_accepted",
            EventKind::ConnectionRejected => "connection_rejected",
            EventKind::ClientAuthenticated => "client_authenticated",
            EventKind::ClientDisconnecting => "disconnecting",
            EventKind::ClientDisconnected => "client_disconnected",
            EventKind::SendMessage => "send_message",
            EventKind::BroadcastMessage => "broadcast_message",
        }
    }

    /// Look up a kind by its wire name
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sent by a client to ask for a client ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestAuthentication {
    /// Shared token, only checked when the server configures one
    pub token: String,
}

/// Sent by the server to a client that has been authenticated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionAccepted {
    pub client_id: String,
}

/// Sent by the server before it drops a connection it will not serve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionRejected {
    pub code: i32,
    pub reason: String,
}

/// Broadcast when another client has authenticated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientAuthenticated {
    pub client_id: String,
}

/// Sent by a client that is about to close its connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientDisconnecting {}

/// Broadcast when an authenticated client has left
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientDisconnected {
    pub client_id: String,
}

/// Sent by a client to have a message relayed to every other client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessage {
    pub message: String,
}

/// Relayed message, as delivered to the other clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BroadcastMessage {
    pub sender: String,
    pub message: String,
}

/// Kind-specific payload of an event
///
/// Serialized without a tag: the discriminant lives in the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EventContent {
    RequestAuthentication(RequestAuthentication),
    ConnectionAccepted(ConnectionAccepted),
    ConnectionRejected(ConnectionRejected),
    ClientAuthenticated(ClientAuthenticated),
    ClientDisconnecting(ClientDisconnecting),
    ClientDisconnected(ClientDisconnected),
    SendMessage(SendMessage),
    BroadcastMessage(BroadcastMessage),
}

impl EventContent {
    pub fn kind(&self) -> EventKind {
        match self {
            EventContent::RequestAuthentication(_) => EventKind::RequestAuthentication,
            EventContent::ConnectionAccepted(_) => EventKind::ConnectionAccepted,
            EventContent::ConnectionRejected(_) => EventKind::ConnectionRejected,
            EventContent::ClientAuthenticated(_) => EventKind::ClientAuthenticated,
            EventContent::ClientDisconnecting(_) => EventKind::ClientDisconnecting,
            EventContent::ClientDisconnected(_) => EventKind::ClientDisconnected,
            EventContent::SendMessage(_) => EventKind::SendMessage,
            EventContent::BroadcastMessage(_) => EventKind::BroadcastMessage,
        }
    }
}

/// A content shape bound to exactly one event kind
pub trait EventPayload: DeserializeOwned + Into<EventContent> + Send + 'static {
    /// The discriminant that carries this shape
    const KIND: EventKind;

    /// Extract this shape from a content value, if it holds one
    fn from_content(content: EventContent) -> Option<Self>;
}

macro_rules! event_payload {
    ($($variant:ident),* $(,)?) => {
        $(
            impl EventPayload for $variant {
                const KIND: EventKind = EventKind::$variant;

                fn from_content(content: EventContent) -> Option<Self> {
                    match content {
                        EventContent::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }

            impl From<$variant> for EventContent {
                fn from(inner: $variant) -> Self {
                    EventContent::$variant(inner)
                }
            }
        )*
    };
}

event_payload!(
    RequestAuthentication,
    ConnectionAccepted,
    ConnectionRejected,
    ClientAuthenticated,
    ClientDisconnecting,
    ClientDisconnected,
    SendMessage,
    BroadcastMessage,
);

/// A decoded wire event
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Originator: a client ID, a server ID, or empty before authentication
    pub id: String,
    /// Creation time, always UTC
    pub timestamp: DateTime<Utc>,
    pub content: EventContent,
}

impl Event {
    /// Create an event stamped with the current time
    pub fn new(id: impl Into<String>, content: impl Into<EventContent>) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now(),
            content: content.into(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.content.kind()
    }

    /// Authentication request; clients have no ID yet so the originator is empty
    pub fn request_authentication(token: impl Into<String>) -> Self {
        Self::new(
            "",
            RequestAuthentication {
                token: token.into(),
            },
        )
    }

    pub fn connection_accepted(server_id: &str, client_id: &str) -> Self {
        Self::new(
            server_id,
            ConnectionAccepted {
                client_id: client_id.to_string(),
            },
        )
    }

    pub fn connection_rejected(server_id: &str, code: i32, reason: &str) -> Self {
        Self::new(
            server_id,
            ConnectionRejected {
                code,
                reason: reason.to_string(),
            },
        )
    }

    pub fn client_authenticated(server_id: &str, client_id: &str) -> Self {
        Self::new(
            server_id,
            ClientAuthenticated {
                client_id: client_id.to_string(),
            },
        )
    }

    pub fn disconnecting(client_id: &str) -> Self {
        Self::new(client_id, ClientDisconnecting {})
    }

    pub fn client_disconnected(server_id: &str, client_id: &str) -> Self {
        Self::new(
            server_id,
            ClientDisconnected {
                client_id: client_id.to_string(),
            },
        )
    }

    pub fn send_message(client_id: &str, message: impl Into<String>) -> Self {
        Self::new(
            client_id,
            SendMessage {
                message: message.into(),
            },
        )
    }

    pub fn broadcast_message(server_id: &str, sender: &str, message: &str) -> Self {
        Self::new(
            server_id,
            BroadcastMessage {
                sender: sender.to_string(),
                message: message.to_string(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names_are_unique() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_wire(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_wire("client_disconnecting"), None);
        assert_eq!(EventKind::from_wire(""), None);
    }

    #[test]
    fn test_content_kind_matches_payload_kind() {
        let content: EventContent = SendMessage {
            message: "hi".to_string(),
        }
        .into();
        assert_eq!(content.kind(), SendMessage::KIND);
        assert!(SendMessage::from_content(content.clone()).is_some());
        assert!(BroadcastMessage::from_content(content).is_none());
    }

    #[test]
    fn test_empty_content_serializes_as_object() {
        let json = serde_json::to_string(&EventContent::ClientDisconnecting(ClientDisconnecting {}))
            .unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_request_authentication_has_empty_originator() {
        let event = Event::request_authentication("");
        assert!(event.id.is_empty());
        assert_eq!(event.kind(), EventKind::RequestAuthentication);
    }
}
