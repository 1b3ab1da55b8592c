//! Transport contract for wsps.
//!
//! The packet layer never touches sockets directly. It talks to a
//! [`Connection`]: something that can hand over one complete inbound
//! message at a time and transmit one complete outbound message. How the
//! connection was established (TCP accept, HTTP upgrade) and how messages
//! are framed on the wire is the transport's business.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{PendingUpgrade, WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// One complete message received from the remote peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A binary message. Packets always travel in binary frames.
    Binary(Vec<u8>),
    /// A text message.
    Text(String),
    /// A control message (ping, pong, raw frame) with no application data.
    Control,
}

impl Frame {
    /// Returns `true` for binary frames.
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// An accepted connection whose handshake has not run yet.
    type Incoming: Handshake;

    /// Waits for the next incoming connection.
    ///
    /// Only the raw accept happens here. The handshake is left to
    /// [`Handshake::complete`] so that a peer that stalls mid-handshake
    /// cannot hold up the accept loop.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Incoming, TransportError>> + Send;
}

/// The second half of accepting a connection: the protocol handshake.
pub trait Handshake: Send + 'static {
    /// The connection produced once the handshake succeeds.
    type Connection: Connection;

    /// Runs the handshake to completion.
    fn complete(
        self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single established connection that exchanges whole messages.
///
/// The futures are `Send` so that code generic over the connection type
/// can still be spawned onto the Tokio runtime.
pub trait Connection: Send + Sync + 'static {
    /// Sends one binary message to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Waits for the next message from the remote peer.
    ///
    /// Returns `Ok(None)` once the connection is closed, including when
    /// [`close`](Self::close) is called while a receive is pending.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Frame>, TransportError>> + Send;

    /// Closes the connection.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
