/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was already closed when it was used.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending a message failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving a message failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding, accepting, or upgrading a connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),
}

impl TransportError {
    /// Returns `true` if the error means the peer is gone for good.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed(_))
    }
}
