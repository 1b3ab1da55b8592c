//! Unsigned variable-length integers (LEB128).
//!
//! A varint stores 7 bits of the value per byte, least-significant group
//! first. The high bit of each byte is a continuation flag: set on every
//! byte except the last. Small numbers therefore cost one byte, and the
//! full `u64` range fits in at most [`MAX_LEN`] bytes.
//!
//! ```text
//! 300 = 0b1_0010_1100
//!     → groups (LSB first): 010_1100, 000_0010
//!     → bytes:              0xAC,     0x02
//! ```

use std::fmt;

use crate::ProtocolError;

/// Maximum encoded length of a `u64` varint.
pub const MAX_LEN: usize = 10;

/// A `u64` that travels on the wire in varint form.
///
/// Packet ids are `VarInt`s, and record fields declared as `VarInt` use
/// the compact encoding instead of a fixed-width one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarInt(pub u64);

impl VarInt {
    /// Returns the number of bytes this value occupies on the wire.
    pub fn encoded_len(self) -> usize {
        encoded_len(self.0)
    }
}

impl From<u64> for VarInt {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<u32> for VarInt {
    fn from(value: u32) -> Self {
        Self(value.into())
    }
}

impl From<VarInt> for u64 {
    fn from(value: VarInt) -> Self {
        value.0
    }
}

impl fmt::Display for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns the number of bytes `value` occupies on the wire (1 to 10).
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Appends the varint encoding of `value` to `out`.
pub fn encode(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Decodes a varint from the front of `input`.
///
/// Returns the value and the number of bytes consumed.
///
/// # Errors
/// - `Truncated` if `input` ends while the continuation bit is still set.
/// - `VarIntOverflow` if the encoding does not fit in 64 bits.
pub fn decode(input: &[u8]) -> Result<(u64, usize), ProtocolError> {
    let mut value = 0u64;
    let mut shift = 0u32;

    for (i, &byte) in input.iter().enumerate() {
        // The tenth group only has room for the single top bit.
        if i == MAX_LEN - 1 && byte > 1 {
            return Err(ProtocolError::VarIntOverflow);
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte < 0x80 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }

    Err(ProtocolError::Truncated {
        needed: 1,
        remaining: 0,
    })
}
