//! Connection handle
//!
//! A `Connection` is the shareable write side of one accepted stream. The
//! owning session keeps the read side; the registry and the authentication
//! table hold clones of this handle. Identity is the peer address.
//!
//! A connection stops accepting frames once it is shut down or once a write
//! to it fails. A failed write may have left part of a frame on the wire, and
//! anything appended after it would be unreadable for the peer.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::events::{encode, Event};
use crate::server::error::HandlerError;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Handle for writing to one connected peer
#[derive(Clone)]
pub struct Connection {
    peer: Arc<str>,
    /// Frames are written whole while holding this lock, so concurrent
    /// broadcasts never interleave on the wire
    writer: Arc<Mutex<BoxedWriter>>,
    /// Cleared under the writer lock, on shutdown or on the first failed write
    open: Arc<AtomicBool>,
    write_timeout: Option<Duration>,
}

impl Connection {
    /// Wrap the write half of a stream; `peer` is its remote address
    pub fn new<W>(peer: impl Into<String>, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let peer: String = peer.into();
        Self {
            peer: Arc::from(peer),
            writer: Arc::new(Mutex::new(Box::new(writer))),
            open: Arc::new(AtomicBool::new(true)),
            write_timeout: None,
        }
    }

    /// Bound every write by `timeout`
    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Remote address identity
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Whether frames can still be written
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Write one frame
    ///
    /// Fails with `NotConnected` once the connection is closed. Any other
    /// failure, including a timeout, closes the connection.
    pub async fn send(&self, frame: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        if !self.is_open() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("connection to {} is closed", self.peer),
            ));
        }

        let write = async {
            writer.write_all(frame).await?;
            writer.flush().await?;
            Ok::<(), io::Error>(())
        };

        let result = match self.write_timeout {
            Some(limit) => match tokio::time::timeout(limit, write).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("write to {} timed out after {:?}", self.peer, limit),
                )),
            },
            None => write.await,
        };

        if result.is_err() {
            self.open.store(false, Ordering::Release);
        }
        result
    }

    /// Encode and write one event
    pub async fn send_event(&self, event: &Event) -> Result<(), HandlerError> {
        let frame = encode(event)?;
        self.send(&frame).await?;
        Ok(())
    }

    /// Close the write side of the stream
    pub async fn shutdown(&self) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        self.open.store(false, Ordering::Release);
        writer.shutdown().await
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.peer == other.peer
    }
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("open", &self.is_open())
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}
