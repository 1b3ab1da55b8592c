//! WebSocket transport implementation using `tokio-tungstenite`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, watch};
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, Frame, Handshake, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Incoming = PendingUpgrade;

    async fn accept(&mut self) -> Result<Self::Incoming, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::trace!(%addr, "accepted TCP connection");
        Ok(PendingUpgrade { stream, addr })
    }
}

/// A TCP connection waiting for its WebSocket upgrade request.
pub struct PendingUpgrade {
    stream: TcpStream,
    addr: SocketAddr,
}

impl PendingUpgrade {
    /// Returns the address of the remote peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Handshake for PendingUpgrade {
    type Connection = WebSocketConnection;

    async fn complete(self) -> Result<Self::Connection, TransportError> {
        let conn = WebSocketConnection::upgrade(self.stream).await?;
        tracing::debug!(id = %conn.id, addr = %self.addr, "accepted WebSocket connection");
        Ok(conn)
    }
}

/// A single WebSocket connection.
///
/// The socket is split into a sink and a stream, each behind its own
/// lock, so a task parked in [`recv`](Connection::recv) never holds up
/// senders.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
    closed: watch::Sender<bool>,
}

impl WebSocketConnection {
    /// Performs the server side of the WebSocket handshake on an accepted
    /// TCP stream.
    pub async fn upgrade(stream: TcpStream) -> Result<Self, TransportError> {
        let ws = tokio_tungstenite::accept_async(stream).await.map_err(|e| {
            TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let id =
            ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        let (sink, stream) = ws.split();
        let (closed, _) = watch::channel(false);

        Ok(Self {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            closed,
        })
    }
}

impl Connection for WebSocketConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if *self.closed.borrow() {
            return Err(TransportError::ConnectionClosed(self.id.to_string()));
        }
        let msg = Message::Binary(data.to_vec().into());
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Frame>, TransportError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Ok(None);
        }

        let mut stream = self.stream.lock().await;
        let msg = tokio::select! {
            _ = closed.changed() => return Ok(None),
            msg = stream.next() => msg,
        };

        match msg {
            Some(Ok(Message::Binary(data))) => Ok(Some(Frame::Binary(data.to_vec()))),
            Some(Ok(Message::Text(text))) => {
                Ok(Some(Frame::Text(text.as_str().to_owned())))
            }
            Some(Ok(Message::Close(_))) | None => {
                self.closed.send_replace(true);
                Ok(None)
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                Ok(Some(Frame::Control))
            }
            Some(Err(e)) => Err(TransportError::ReceiveFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                e,
            ))),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        // Flip the flag first so a parked `recv` returns immediately.
        let was_closed = self.closed.send_replace(true);
        match self.sink.lock().await.close().await {
            Ok(()) => Ok(()),
            // The peer closed first; the socket is already gone.
            Err(_) if was_closed => Ok(()),
            Err(e) => Err(TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))),
        }
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
