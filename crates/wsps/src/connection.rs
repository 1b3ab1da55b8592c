//! Per-connection state and the send path.
//!
//! A [`PacketConnection`] wraps one transport connection. It tracks
//! whether the connection is usable and serializes outgoing packets so
//! that concurrent senders never interleave their frames.

use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::Mutex;
use wsps_protocol::{Encode, Packet, PacketBuffer, VarInt, encode_packet};
use wsps_transport::{Connection, ConnectionId, Frame, TransportError};

/// Lifecycle of a [`PacketConnection`].
///
/// ```text
///   Connecting ──(open)──→ Open ──(transport closed / close())──→ Closed
/// ```
///
/// `Closed` is terminal. Packets are only transmitted while `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Wrapped, but the session has not started yet.
    Connecting,
    /// Sending and dispatching are live.
    Open,
    /// The transport is gone. Sends are dropped.
    Closed,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}

/// One session over a transport connection.
///
/// Shared as `Arc<PacketConnection<C>>`: the dispatch loop holds one
/// reference and handlers or other tasks can hold more to send from
/// anywhere.
pub struct PacketConnection<C> {
    transport: C,
    state: AtomicU8,
    /// Reused encode buffer. The lock covers encode plus transmit, and
    /// nothing else.
    write: Mutex<PacketBuffer>,
}

impl<C: Connection> PacketConnection<C> {
    /// Wraps a transport connection in the `Connecting` state.
    pub fn new(transport: C) -> Self {
        Self {
            transport,
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            write: Mutex::new(PacketBuffer::new()),
        }
    }

    /// Returns the transport's connection id.
    pub fn id(&self) -> ConnectionId {
        self.transport.id()
    }

    /// Returns the wrapped transport connection.
    pub fn transport(&self) -> &C {
        &self.transport
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` while packets can be sent.
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Moves `Connecting → Open`. Returns `false` if the connection was
    /// not in `Connecting`.
    pub fn open(&self) -> bool {
        self.state
            .compare_exchange(
                ConnectionState::Connecting as u8,
                ConnectionState::Open as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Moves to `Closed`. Returns `true` if this call made the transition.
    pub(crate) fn mark_closed(&self) -> bool {
        self.state.swap(ConnectionState::Closed as u8, Ordering::AcqRel)
            != ConnectionState::Closed as u8
    }

    /// Encodes `data` as packet `id` and transmits it.
    ///
    /// Best effort: if the connection is not open this does nothing, and
    /// if the transport fails the packet is dropped (and logged). No error
    /// reaches the caller either way.
    pub async fn send<T>(&self, id: impl Into<VarInt>, data: &T)
    where
        T: Encode + Sync + ?Sized,
    {
        let id = id.into();
        if !self.is_open() {
            return;
        }

        let mut buf = self.write.lock().await;
        // Closed while we waited for the lock.
        if !self.is_open() {
            return;
        }

        buf.reset();
        encode_packet(id, data, &mut buf);
        if let Err(e) = self.transport.send(buf.as_bytes()).await {
            tracing::debug!(conn_id = %self.id(), %id, error = %e, "dropping packet");
            if e.is_closed() {
                self.mark_closed();
            }
        }
    }

    /// Sends a prepared [`Packet`]. Same contract as [`send`](Self::send).
    pub async fn send_packet<T: Encode + Sync>(&self, packet: &Packet<T>) {
        self.send(packet.id, &packet.data).await;
    }

    /// Closes the connection. Pending and future sends become no-ops and
    /// the dispatch loop ends once the transport reports the close.
    pub async fn close(&self) {
        self.mark_closed();
        if let Err(e) = self.transport.close().await {
            tracing::debug!(conn_id = %self.id(), error = %e, "close failed");
        }
    }

    /// Waits for the next inbound frame.
    pub(crate) async fn recv(&self) -> Result<Option<Frame>, TransportError> {
        self.transport.recv().await
    }
}
