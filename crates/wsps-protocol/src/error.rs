//! Error types for the protocol layer.
//!
//! Encoding into a [`PacketBuffer`](crate::PacketBuffer) is infallible (it
//! only appends to memory), so every error here comes from *reading*:
//! the bytes ran out, or they describe a value that cannot exist.

/// Errors that can occur while decoding wire data.
///
/// Any of these aborts the whole decode. The buffer's read cursor is left
/// wherever the failing read stopped, and whatever was decoded so far is
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The buffer ended in the middle of a value.
    ///
    /// `needed` is how many bytes the failing read asked for and
    /// `remaining` how many were left. For varints `needed` is always 1:
    /// the next group byte.
    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// A varint carried more than 64 bits of payload.
    #[error("varint overflows 64 bits")]
    VarIntOverflow,
}

impl ProtocolError {
    /// Returns `true` if more input could have completed the read.
    pub fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}
