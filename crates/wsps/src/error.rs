//! Unified error type for wsps.

use wsps_protocol::{ProtocolError, VarInt};
use wsps_transport::TransportError;

/// Top-level error that wraps the crate-specific errors.
///
/// This is what the error callback registered with
/// [`PacketSystem::set_error_handler`](crate::PacketSystem::set_error_handler)
/// receives. None of these are fatal to the process; only transport
/// errors end a connection.
#[derive(Debug, thiserror::Error)]
pub enum WspsError {
    /// A transport-level error (accept, send, receive, closed).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A packet could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A packet arrived with an id nobody registered a handler for.
    #[error("no packet handler for packet {0}")]
    UnknownPacket(VarInt),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let wsps_err: WspsError = err.into();
        assert!(matches!(wsps_err, WspsError::Transport(_)));
        assert!(wsps_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::VarIntOverflow;
        let wsps_err: WspsError = err.into();
        assert!(matches!(wsps_err, WspsError::Protocol(_)));
    }

    #[test]
    fn test_unknown_packet_message() {
        let err = WspsError::UnknownPacket(VarInt(9));
        assert_eq!(err.to_string(), "no packet handler for packet 9");
    }
}
