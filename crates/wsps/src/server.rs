//! `PacketServer` builder and accept loop.
//!
//! Ties the layers together for the common case: listen for WebSocket
//! connections and serve each one with a shared [`PacketSystem`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use wsps_transport::{
    Handshake, PendingUpgrade, Transport, TransportError, WebSocketConnection,
    WebSocketTransport,
};

use crate::{PacketConnection, PacketSystem, WspsError};

/// Settings for a [`PacketServer`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to. Port `0` picks a free one.
    pub bind_addr: String,
    /// How long a peer may take to complete the WebSocket upgrade.
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

/// Builder for configuring and starting a [`PacketServer`].
///
/// # Example
///
/// ```rust,ignore
/// let mut system = PacketSystem::new();
/// system.add_handler(2u64, on_greeting);
///
/// let server = PacketServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(system)
///     .await?;
/// server.run(|conn| async move { /* greet */ }).await
/// ```
pub struct PacketServerBuilder {
    config: ServerConfig,
}

impl PacketServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a peer may take to complete the upgrade.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener. The handler table is frozen from here on.
    pub async fn build(
        self,
        system: PacketSystem<WebSocketConnection>,
    ) -> Result<PacketServer, WspsError> {
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        Ok(PacketServer {
            transport,
            system: Arc::new(system),
            handshake_timeout: self.config.handshake_timeout,
        })
    }
}

impl Default for PacketServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound server, ready to accept connections.
///
/// Call [`run()`](Self::run) to start accepting.
pub struct PacketServer {
    transport: WebSocketTransport,
    system: Arc<PacketSystem<WebSocketConnection>>,
    handshake_timeout: Duration,
}

impl PacketServer {
    /// Creates a new builder.
    pub fn builder() -> PacketServerBuilder {
        PacketServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Returns the shared packet system.
    pub fn system(&self) -> &Arc<PacketSystem<WebSocketConnection>> {
        &self.system
    }

    /// Runs the accept loop.
    ///
    /// Each accepted connection is upgraded and served on its own task, so
    /// a slow or broken handshake only affects that peer. `on_open` runs
    /// once per connection before dispatching starts. Failed accepts and
    /// failed upgrades are logged and reported to the error callback, and
    /// the loop keeps going. Runs until the process is terminated.
    pub async fn run<F, Fut>(mut self, on_open: F) -> Result<(), WspsError>
    where
        F: Fn(Arc<PacketConnection<WebSocketConnection>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("packet server running");
        let on_open = Arc::new(on_open);

        loop {
            match self.transport.accept().await {
                Ok(incoming) => {
                    let system = Arc::clone(&self.system);
                    let on_open = Arc::clone(&on_open);
                    let timeout = self.handshake_timeout;
                    tokio::spawn(async move {
                        let addr = incoming.peer_addr();
                        match upgrade(incoming, timeout).await {
                            Ok(conn) => system.serve(conn, |conn| (*on_open)(conn)).await,
                            Err(e) => {
                                tracing::error!(error = %e, %addr, "upgrade failed");
                                system.report(e.into());
                            }
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                    self.system.report(e.into());
                }
            }
        }
    }
}

async fn upgrade(
    incoming: PendingUpgrade,
    timeout: Duration,
) -> Result<WebSocketConnection, TransportError> {
    tokio::time::timeout(timeout, incoming.complete())
        .await
        .map_err(|_| {
            TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "WebSocket handshake timed out",
            ))
        })?
}
