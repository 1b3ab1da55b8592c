//! # wsps
//!
//! Typed binary packets over WebSocket.
//!
//! Declare records with [`record!`], give each one a packet id, and
//! register a handler per id on a [`PacketSystem`]. Incoming binary
//! messages are decoded into the right record and handed to its handler;
//! outgoing records are encoded with [`PacketConnection::send`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wsps::prelude::*;
//!
//! record! {
//!     #[derive(Debug)]
//!     pub struct Greeting {
//!         pub name: String,
//!         pub age: u8,
//!     }
//! }
//!
//! # async fn run() -> Result<(), WspsError> {
//! let mut system: PacketSystem<WebSocketConnection> = PacketSystem::new();
//! system.add_handler(2u64, |conn, greeting: Greeting| async move {
//!     conn.send(2u64, &greeting).await;
//! });
//!
//! let server = PacketServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(system)
//!     .await?;
//! server.run(|_conn| async {}).await
//! # }
//! ```

mod connection;
mod error;
mod server;
mod system;

pub use connection::{ConnectionState, PacketConnection};
pub use error::WspsError;
pub use server::{PacketServer, PacketServerBuilder, ServerConfig};
pub use system::{Dispatch, PacketSystem};

pub use wsps_protocol::{
    Decode, Encode, MapKey, Packet, PacketBuffer, ProtocolError, VarInt, from_bytes,
    record, to_bytes,
};
pub use wsps_transport::{
    Connection, ConnectionId, Frame, Handshake, PendingUpgrade, Transport, TransportError,
    WebSocketConnection, WebSocketTransport,
};

/// Everything needed to declare records and serve them.
pub mod prelude {
    pub use crate::{
        Connection, ConnectionState, Decode, Dispatch, Encode, Frame, Packet,
        PacketBuffer, PacketConnection, PacketServer, PacketServerBuilder,
        PacketSystem, ProtocolError, ServerConfig, TransportError, VarInt,
        WebSocketConnection, WspsError, record,
    };
}
