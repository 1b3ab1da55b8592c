//! The wire buffer: bytes plus a read cursor.
//!
//! A [`PacketBuffer`] is written by appending and read by consuming from
//! the front. The two cursors are independent: writing never moves the
//! read position, and reading never discards written bytes. Reading past
//! the end of what was written returns [`ProtocolError::Truncated`].
//!
//! Multi-byte scalars use big-endian (network) byte order. Text and byte
//! runs are prefixed with their length as a varint.

use crate::{ProtocolError, varint};

/// Generates a big-endian write/read pair for a fixed-width number.
macro_rules! fixed_width {
    ($($ty:ty => $write:ident, $read:ident;)*) => {
        $(
            #[doc = concat!("Appends a big-endian `", stringify!($ty), "`.")]
            pub fn $write(&mut self, value: $ty) {
                self.data.extend_from_slice(&value.to_be_bytes());
            }

            #[doc = concat!("Reads a big-endian `", stringify!($ty), "`.")]
            pub fn $read(&mut self) -> Result<$ty, ProtocolError> {
                let bytes = self.take(size_of::<$ty>())?;
                let mut raw = [0u8; size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                Ok(<$ty>::from_be_bytes(raw))
            }
        )*
    };
}

/// Growable byte buffer with a write end and a read cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketBuffer {
    data: Vec<u8>,
    read_pos: usize,
}

impl PacketBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            read_pos: 0,
        }
    }

    /// Wraps received bytes for reading, cursor at the start.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            read_pos: 0,
        }
    }

    /// All bytes written so far, including any already read.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the buffer and returns its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Total number of bytes written.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.read_pos
    }

    /// Position of the read cursor.
    pub fn position(&self) -> usize {
        self.read_pos
    }

    /// Discards all contents and rewinds both cursors, keeping the
    /// allocation for reuse.
    pub fn reset(&mut self) {
        self.data.clear();
        self.read_pos = 0;
    }

    /// Consumes exactly `n` bytes from the read cursor.
    fn take(&mut self, n: usize) -> Result<&[u8], ProtocolError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(ProtocolError::Truncated {
                needed: n,
                remaining,
            });
        }
        let start = self.read_pos;
        self.read_pos += n;
        Ok(&self.data[start..self.read_pos])
    }

    // -- varint -----------------------------------------------------------

    /// Appends `value` as a varint (1 to 10 bytes).
    pub fn write_varint(&mut self, value: u64) {
        varint::encode(value, &mut self.data);
    }

    /// Reads a varint.
    ///
    /// # Errors
    /// `Truncated` if the input ends mid-varint, `VarIntOverflow` if it
    /// does not fit in 64 bits.
    pub fn read_varint(&mut self) -> Result<u64, ProtocolError> {
        let (value, consumed) = varint::decode(&self.data[self.read_pos..])?;
        self.read_pos += consumed;
        Ok(value)
    }

    /// Reads a varint length or count and converts it to `usize`.
    ///
    /// A length that cannot be addressed on this platform can never be
    /// satisfied by the bytes at hand, so it is reported as truncation.
    pub fn read_len(&mut self) -> Result<usize, ProtocolError> {
        let len = self.read_varint()?;
        usize::try_from(len).map_err(|_| ProtocolError::Truncated {
            needed: usize::MAX,
            remaining: self.remaining(),
        })
    }

    /// Reads a sequence or map element count.
    ///
    /// A count larger than the unread input is rejected as truncation
    /// before any element is decoded. Elements that encode to zero bytes
    /// (empty records) are therefore capped at the remaining byte count.
    pub fn read_count(&mut self) -> Result<usize, ProtocolError> {
        let count = self.read_len()?;
        if count > self.remaining() {
            return Err(ProtocolError::Truncated {
                needed: count,
                remaining: self.remaining(),
            });
        }
        Ok(count)
    }

    // -- raw and length-prefixed bytes -------------------------------------

    /// Appends bytes with no length prefix.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Reads exactly `n` bytes with no length prefix.
    pub fn read_raw(&mut self, n: usize) -> Result<&[u8], ProtocolError> {
        self.take(n)
    }

    /// Appends a varint length followed by the bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as u64);
        self.write_raw(bytes);
    }

    /// Reads a varint length followed by that many bytes.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let len = self.read_len()?;
        Ok(self.take(len)?.to_vec())
    }

    /// Appends a string as length-prefixed UTF-8.
    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Reads a length-prefixed string.
    ///
    /// Text is not validated on the way in: bytes that are not valid UTF-8
    /// are replaced with U+FFFD instead of failing the read. Use
    /// [`read_bytes`](Self::read_bytes) (or a `Vec<u8>` field) to get the
    /// exact bytes.
    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let bytes = self.read_bytes()?;
        Ok(String::from_utf8(bytes)
            .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned()))
    }

    // -- fixed-width scalars -----------------------------------------------

    /// Appends a boolean as one byte, `1` or `0`.
    pub fn write_bool(&mut self, value: bool) {
        self.data.push(u8::from(value));
    }

    /// Reads a boolean. Any nonzero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_u8()? != 0)
    }

    /// Appends a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    fixed_width! {
        i8 => write_i8, read_i8;
        u16 => write_u16, read_u16;
        i16 => write_i16, read_i16;
        u32 => write_u32, read_u32;
        i32 => write_i32, read_i32;
        f32 => write_f32, read_f32;
        f64 => write_f64, read_f64;
    }
}

impl From<Vec<u8>> for PacketBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursors_are_independent() {
        let mut buf = PacketBuffer::new();
        buf.write_u8(1);
        buf.write_u8(2);
        assert_eq!(buf.read_u8().unwrap(), 1);

        buf.write_u8(3);
        assert_eq!(buf.position(), 1);
        assert_eq!(buf.remaining(), 2);
        assert_eq!(buf.read_u8().unwrap(), 2);
        assert_eq!(buf.read_u8().unwrap(), 3);
        assert_eq!(buf.as_bytes(), [1, 2, 3]);
    }

    #[test]
    fn test_read_past_end_is_truncated() {
        let mut buf = PacketBuffer::from_bytes(vec![0x01]);
        assert_eq!(
            buf.read_u32(),
            Err(ProtocolError::Truncated {
                needed: 4,
                remaining: 1
            })
        );
    }

    #[test]
    fn test_scalars_are_big_endian() {
        let mut buf = PacketBuffer::new();
        buf.write_u16(0x0102);
        buf.write_i32(-2);
        buf.write_f32(1.0);
        assert_eq!(
            buf.as_bytes(),
            [0x01, 0x02, 0xFF, 0xFF, 0xFF, 0xFE, 0x3F, 0x80, 0x00, 0x00]
        );

        assert_eq!(buf.read_u16().unwrap(), 0x0102);
        assert_eq!(buf.read_i32().unwrap(), -2);
        assert_eq!(buf.read_f32().unwrap(), 1.0);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn test_f64_and_signed_bytes() {
        let mut buf = PacketBuffer::new();
        buf.write_f64(-0.5);
        buf.write_i8(-1);
        buf.write_i16(-300);
        assert_eq!(buf.read_f64().unwrap(), -0.5);
        assert_eq!(buf.read_i8().unwrap(), -1);
        assert_eq!(buf.read_i16().unwrap(), -300);
    }

    #[test]
    fn test_bool_decode_is_permissive() {
        let mut buf = PacketBuffer::new();
        buf.write_bool(true);
        buf.write_bool(false);
        assert_eq!(buf.as_bytes(), [1, 0]);

        let mut buf = PacketBuffer::from_bytes(vec![0x00, 0x01, 0x7F, 0xFF]);
        assert!(!buf.read_bool().unwrap());
        assert!(buf.read_bool().unwrap());
        assert!(buf.read_bool().unwrap());
        assert!(buf.read_bool().unwrap());
    }

    #[test]
    fn test_length_prefixed_bytes() {
        let mut buf = PacketBuffer::new();
        buf.write_bytes(&[9, 8, 7]);
        assert_eq!(buf.as_bytes(), [3, 9, 8, 7]);
        assert_eq!(buf.read_bytes().unwrap(), [9, 8, 7]);
    }

    #[test]
    fn test_length_prefixed_bytes_short_input() {
        let mut buf = PacketBuffer::from_bytes(vec![5, 1, 2]);
        assert_eq!(
            buf.read_bytes(),
            Err(ProtocolError::Truncated {
                needed: 5,
                remaining: 2
            })
        );
    }

    #[test]
    fn test_string_round_trip() {
        let mut buf = PacketBuffer::new();
        buf.write_str("Jacob");
        assert_eq!(buf.as_bytes(), [0x05, 0x4A, 0x61, 0x63, 0x6F, 0x62]);
        assert_eq!(buf.read_string().unwrap(), "Jacob");
    }

    #[test]
    fn test_invalid_utf8_is_not_rejected() {
        let mut buf = PacketBuffer::from_bytes(vec![3, b'a', 0xFF, b'b']);
        assert_eq!(buf.read_string().unwrap(), "a\u{FFFD}b");
    }

    #[test]
    fn test_reset_rewinds_everything() {
        let mut buf = PacketBuffer::new();
        buf.write_varint(300);
        buf.read_varint().unwrap();
        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.position(), 0);
        assert!(buf.read_u8().unwrap_err().is_truncated());
    }

    #[test]
    fn test_huge_length_prefix_is_truncated() {
        let mut buf = PacketBuffer::new();
        buf.write_varint(u64::MAX);
        assert!(buf.read_bytes().unwrap_err().is_truncated());
    }

    #[test]
    fn test_count_larger_than_input_is_truncated() {
        let mut buf = PacketBuffer::new();
        buf.write_varint(3);
        buf.write_raw(&[0, 0]);
        assert_eq!(
            buf.read_count(),
            Err(ProtocolError::Truncated {
                needed: 3,
                remaining: 2,
            })
        );

        let mut buf = PacketBuffer::from_bytes(vec![0x02, 0xAA, 0xBB]);
        assert_eq!(buf.read_count().unwrap(), 2);
        assert_eq!(buf.remaining(), 2);
    }
}
