//! Relay Client
//!
//! Async client for the relay protocol, used by the `tcp-notify-client`
//! binary and by the integration tests.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tcp_notify::client::{Notification, RelayClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = RelayClient::connect("127.0.0.1:8080").await?;
//!     let id = client.authenticate("").await?;
//!     println!("Authenticated as {}", id);
//!
//!     client.send_message("hello").await?;
//!
//!     while let Some(event) = client.next_event().await? {
//!         if let Some(Notification::Message { sender, message }) = Notification::from_event(&event) {
//!             println!("{}: {}", sender, message);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use std::collections::VecDeque;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::events::{decode_frames, encode, EncodeError, Event, EventContent};

const READ_CHUNK: usize = 4096;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The server answered with `connection_rejected`
    #[error("Connection rejected ({code}): {reason}")]
    Rejected { code: i32, reason: String },

    #[error("Server closed the connection")]
    Closed,

    #[error("Client is not authenticated")]
    NotAuthenticated,
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Server events a client surfaces to its user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ClientAuthenticated { client_id: String },
    ClientDisconnected { client_id: String },
    Message { sender: String, message: String },
}

impl Notification {
    /// `None` for events that are protocol plumbing rather than news
    pub fn from_event(event: &Event) -> Option<Self> {
        match &event.content {
            EventContent::ClientAuthenticated(c) => Some(Notification::ClientAuthenticated {
                client_id: c.client_id.clone(),
            }),
            EventContent::ClientDisconnected(c) => Some(Notification::ClientDisconnected {
                client_id: c.client_id.clone(),
            }),
            EventContent::BroadcastMessage(m) => Some(Notification::Message {
                sender: m.sender.clone(),
                message: m.message.clone(),
            }),
            _ => None,
        }
    }
}

/// A connection to a relay server
pub struct RelayClient {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    /// Bytes read but not yet decoded
    buffer: Vec<u8>,
    /// Events decoded but not yet returned
    pending: VecDeque<Event>,
    client_id: Option<String>,
}

impl RelayClient {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> ClientResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();

        Ok(Self {
            reader,
            writer,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            client_id: None,
        })
    }

    /// ID assigned by the server, once authenticated
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Request a client ID and wait for the server's answer
    ///
    /// Broadcasts that arrive before the answer stay queued for
    /// [`next_event`](Self::next_event).
    pub async fn authenticate(&mut self, token: &str) -> ClientResult<String> {
        self.send(&Event::request_authentication(token)).await?;

        let mut held = Vec::new();
        let outcome = loop {
            let event = match self.next_event().await? {
                Some(event) => event,
                None => break Err(ClientError::Closed),
            };

            match event.content {
                EventContent::ConnectionAccepted(accepted) => break Ok(accepted.client_id),
                EventContent::ConnectionRejected(rejected) => {
                    break Err(ClientError::Rejected {
                        code: rejected.code,
                        reason: rejected.reason,
                    })
                }
                _ => held.push(event),
            }
        };

        for event in held.into_iter().rev() {
            self.pending.push_front(event);
        }

        let client_id = outcome?;
        tracing::debug!(client_id = %client_id, "Authenticated with relay");
        self.client_id = Some(client_id.clone());
        Ok(client_id)
    }

    /// Ask the server to relay `message` to every other client
    pub async fn send_message(&mut self, message: &str) -> ClientResult<()> {
        let id = self.client_id.as_deref().ok_or(ClientError::NotAuthenticated)?;
        let event = Event::send_message(id, message);
        self.send(&event).await
    }

    /// Next event from the server, or `None` once the server closes the
    /// stream. Undecodable frames are logged and skipped.
    pub async fn next_event(&mut self) -> ClientResult<Option<Event>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.reader.read(&mut chunk).await?;
            if n == 0 {
                return Ok(None);
            }
            self.buffer.extend_from_slice(&chunk[..n]);

            let (frames, consumed) = decode_frames(&self.buffer);
            self.buffer.drain(..consumed);

            for frame in frames {
                match frame {
                    Ok(event) => self.pending.push_back(event),
                    Err(e) => tracing::warn!(error = %e, "Skipping undecodable frame"),
                }
            }
        }
    }

    /// Announce departure and close the write half
    pub async fn disconnect(mut self) -> ClientResult<()> {
        if let Some(id) = self.client_id.take() {
            self.send(&Event::disconnecting(&id)).await?;
        }
        self.writer.shutdown().await?;
        Ok(())
    }

    /// Write one frame
    pub async fn send(&mut self, event: &Event) -> ClientResult<()> {
        let frame = encode(event)?;
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
