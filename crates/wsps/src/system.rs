//! The packet system: handler table, dispatcher, and receive loop.
//!
//! A [`PacketSystem`] is configured once (handlers and an error
//! callback), then wrapped in an `Arc` and shared by every connection.
//! Registration needs `&mut self`, so the table cannot change while it is
//! being served.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use wsps_protocol::{Decode, PacketBuffer, ProtocolError, VarInt, read_packet_id};
use wsps_transport::{Connection, Frame};

use crate::{PacketConnection, WspsError};

/// Decodes a payload for one packet id and starts its callback.
///
/// Decoding runs synchronously against the read buffer. The returned
/// future owns the decoded record and is awaited by the dispatcher.
type PacketHandler<C> = Box<
    dyn Fn(
            Arc<PacketConnection<C>>,
            &mut PacketBuffer,
        ) -> Result<BoxFuture<'static, ()>, ProtocolError>
        + Send
        + Sync,
>;

/// Receives every non-fatal error raised while serving connections.
type ErrorHandler = Box<dyn Fn(WspsError) + Send + Sync>;

/// What a single [`PacketSystem::dispatch`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A packet was decoded and its handler ran to completion.
    Handled(VarInt),
    /// A text or control frame arrived and was skipped.
    Ignored,
    /// The transport closed cleanly. Nothing more will arrive.
    Closed,
}

/// Maps packet ids to handlers and drives connections.
pub struct PacketSystem<C> {
    handlers: HashMap<VarInt, PacketHandler<C>>,
    error_handler: Option<ErrorHandler>,
}

impl<C: Connection> PacketSystem<C> {
    /// Creates a system with no handlers and no error callback.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            error_handler: None,
        }
    }

    /// Registers `handler` for packets with the given id.
    ///
    /// The record type is taken from the handler's second argument. A
    /// later registration for the same id replaces this one.
    ///
    /// ```rust,ignore
    /// system.add_handler(2u64, |conn, greeting: Greeting| async move {
    ///     conn.send(3u64, &Reply { text: greeting.name }).await;
    /// });
    /// ```
    pub fn add_handler<T, F, Fut>(&mut self, id: impl Into<VarInt>, handler: F) -> &mut Self
    where
        T: Decode + Send + 'static,
        F: Fn(Arc<PacketConnection<C>>, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = id.into();
        let decode_and_call: PacketHandler<C> = Box::new(
            move |conn: Arc<PacketConnection<C>>,
                  buf: &mut PacketBuffer|
                  -> Result<BoxFuture<'static, ()>, ProtocolError> {
                let packet = T::decode(buf)?;
                Ok(handler(conn, packet).boxed())
            },
        );
        if self.handlers.insert(id, decode_and_call).is_some() {
            tracing::debug!(%id, "replaced packet handler");
        }
        self
    }

    /// Installs the callback that receives decode failures, unknown packet
    /// ids, and transport errors.
    pub fn set_error_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(WspsError) + Send + Sync + 'static,
    {
        self.error_handler = Some(Box::new(handler));
        self
    }

    /// Returns `true` if a handler is registered for `id`.
    pub fn has_handler(&self, id: VarInt) -> bool {
        self.handlers.contains_key(&id)
    }

    /// Hands `err` to the error callback.
    pub fn report(&self, err: WspsError) {
        tracing::debug!(error = %err, "packet system error");
        if let Some(handler) = &self.error_handler {
            handler(err);
        }
    }

    /// Waits for one inbound frame and dispatches it.
    ///
    /// # Errors
    /// - `UnknownPacket` if no handler is registered for the id.
    /// - `Protocol` if the id or payload fails to decode.
    /// - `Transport` if receiving failed.
    ///
    /// None of these close the connection by themselves.
    pub async fn dispatch(
        &self,
        conn: &Arc<PacketConnection<C>>,
    ) -> Result<Dispatch, WspsError> {
        let data = match conn.recv().await? {
            Some(Frame::Binary(data)) => data,
            Some(_) => {
                tracing::trace!(conn_id = %conn.id(), "ignoring non-binary frame");
                return Ok(Dispatch::Ignored);
            }
            None => return Ok(Dispatch::Closed),
        };

        let mut buf = PacketBuffer::from_bytes(data);
        let id = read_packet_id(&mut buf)?;
        let handler = self
            .handlers
            .get(&id)
            .ok_or(WspsError::UnknownPacket(id))?;

        handler(Arc::clone(conn), &mut buf)?.await;
        Ok(Dispatch::Handled(id))
    }

    /// Dispatches packets until the connection closes.
    ///
    /// Errors are handed to the error callback and the loop carries on;
    /// only the transport going away ends it. A clean close is not
    /// reported, and a failing transport is reported once.
    pub async fn listen(&self, conn: &Arc<PacketConnection<C>>) {
        loop {
            match self.dispatch(conn).await {
                Ok(Dispatch::Closed) => {
                    conn.mark_closed();
                    break;
                }
                Ok(_) => {}
                Err(WspsError::Transport(e)) => {
                    if conn.mark_closed() {
                        self.report(WspsError::Transport(e));
                    }
                    break;
                }
                Err(e) => self.report(e),
            }
        }
        tracing::info!(conn_id = %conn.id(), "connection closed");
    }

    /// Runs one connection from start to finish.
    ///
    /// Wraps the transport connection, opens it, runs `on_open` (which may
    /// already send packets), dispatches until the peer goes away, and
    /// finally closes the transport.
    pub async fn serve<F, Fut>(&self, transport: C, on_open: F)
    where
        F: FnOnce(Arc<PacketConnection<C>>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let conn = Arc::new(PacketConnection::new(transport));
        conn.open();
        tracing::info!(conn_id = %conn.id(), "connection open");

        on_open(Arc::clone(&conn)).await;
        self.listen(&conn).await;
        conn.close().await;
    }
}

impl<C: Connection> Default for PacketSystem<C> {
    fn default() -> Self {
        Self::new()
    }
}
