//! Event Dispatcher
//!
//! Routes a decoded event to the handler registered for its kind. Handlers
//! declare the content type they accept, and the table is keyed by that
//! type's own [`EventPayload::KIND`], so a handler can never be registered
//! under a kind whose content it cannot take.

use async_trait::async_trait;
use std::collections::HashMap;

use super::connection::Connection;
use super::error::{DispatchError, HandlerError};
use super::handlers::{ClientDisconnectingHandler, RequestAuthenticationHandler, SendMessageHandler};
use super::state::ServerState;
use crate::events::{Event, EventContent, EventKind, EventPayload};

/// What a handler knows about the event it is handling
pub struct HandlerContext<'a> {
    pub state: &'a ServerState,
    /// The connection the event arrived on
    pub conn: &'a Connection,
    /// The event's `id` field
    pub origin: &'a str,
}

/// Handles one event kind
#[async_trait]
pub trait EventHandler: Send + Sync {
    type Content: EventPayload;

    async fn handle(
        &self,
        ctx: &HandlerContext<'_>,
        content: Self::Content,
    ) -> Result<(), HandlerError>;
}

/// Type-erased handler stored in the table
#[async_trait]
trait ErasedHandler: Send + Sync {
    async fn call(&self, ctx: &HandlerContext<'_>, content: EventContent) -> Result<(), DispatchError>;
}

struct Typed<H>(H);

#[async_trait]
impl<H: EventHandler> ErasedHandler for Typed<H> {
    async fn call(&self, ctx: &HandlerContext<'_>, content: EventContent) -> Result<(), DispatchError> {
        let kind = H::Content::KIND;
        let content =
            H::Content::from_content(content).ok_or(DispatchError::ContentMismatch(kind))?;

        self.0
            .handle(ctx, content)
            .await
            .map_err(|source| DispatchError::Handler { kind, source })
    }
}

/// Kind → handler table
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<EventKind, Box<dyn ErasedHandler>>,
}

impl EventDispatcher {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the server's handlers for every client-originated kind
    pub fn with_default_handlers() -> Self {
        Self::new()
            .on(RequestAuthenticationHandler)
            .on(ClientDisconnectingHandler)
            .on(SendMessageHandler)
    }

    /// Register `handler` under the kind of the content it accepts,
    /// replacing any previous handler for that kind
    pub fn on<H: EventHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers
            .insert(H::Content::KIND, Box::new(Typed(handler)));
        self
    }

    pub fn handles(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Registered kinds, in wire-table order
    pub fn kinds(&self) -> Vec<EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(|kind| self.handles(*kind))
            .collect()
    }

    /// Run the handler registered for `event`'s kind
    pub async fn dispatch(
        &self,
        state: &ServerState,
        conn: &Connection,
        event: Event,
    ) -> Result<(), DispatchError> {
        let kind = event.kind();
        let handler = self
            .handlers
            .get(&kind)
            .ok_or(DispatchError::NoHandlerRegistered(kind))?;

        let Event { id, content, .. } = event;
        let ctx = HandlerContext {
            state,
            conn,
            origin: &id,
        };

        tracing::trace!(event = %kind, origin = %id, peer = %conn.peer(), "Dispatching event");
        handler.call(&ctx, content).await
    }
}
