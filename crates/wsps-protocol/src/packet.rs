//! Packet envelopes.
//!
//! A packet on the wire is its id as a varint followed directly by the
//! encoded record:
//!
//! ```text
//! envelope := varint(id) payload
//! ```
//!
//! There is no payload length and no type tag. The receiver picks the
//! record type from the id alone, so both sides must agree on which record
//! belongs to which id. A mismatch is not detected; it decodes garbage or
//! fails with a truncation error.

use crate::{Decode, Encode, PacketBuffer, ProtocolError, VarInt};

/// A record paired with the id that tells the receiver how to decode it.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet<T> {
    /// Which record shape `data` is.
    pub id: VarInt,
    /// The record itself.
    pub data: T,
}

impl<T> Packet<T> {
    /// Creates a packet.
    pub fn new(id: impl Into<VarInt>, data: T) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

impl<T: Encode> Packet<T> {
    /// Encodes the packet into a fresh byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = PacketBuffer::new();
        self.encode(&mut buf);
        buf.into_bytes()
    }
}

impl<T: Encode> Encode for Packet<T> {
    fn encode(&self, buf: &mut PacketBuffer) {
        encode_packet(self.id, &self.data, buf);
    }
}

impl<T: Decode> Decode for Packet<T> {
    fn decode(buf: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        let id = read_packet_id(buf)?;
        let data = T::decode(buf)?;
        Ok(Self { id, data })
    }
}

/// Writes an envelope for `data` without building a [`Packet`].
pub fn encode_packet<T: Encode + ?Sized>(id: VarInt, data: &T, buf: &mut PacketBuffer) {
    buf.write_varint(id.0);
    data.encode(buf);
}

/// Reads the id at the front of an envelope, leaving the cursor at the
/// start of the payload.
pub fn read_packet_id(buf: &mut PacketBuffer) -> Result<VarInt, ProtocolError> {
    buf.read_varint().map(VarInt)
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::record! {
        #[derive(Debug, Clone, PartialEq)]
        struct Person {
            name: String,
            age: u8,
        }
    }

    #[test]
    fn test_jacob_packet_bytes() {
        let packet = Packet::new(
            2u64,
            Person {
                name: "Jacob".into(),
                age: 2,
            },
        );
        assert_eq!(
            packet.to_bytes(),
            [0x02, 0x05, 0x4A, 0x61, 0x63, 0x6F, 0x62, 0x02]
        );
    }

    #[test]
    fn test_packet_round_trip() {
        let packet = Packet::new(
            300u64,
            Person {
                name: "Ada".into(),
                age: 36,
            },
        );
        let bytes = packet.to_bytes();
        // A two-byte id.
        assert_eq!(&bytes[..2], [0xAC, 0x02]);

        let decoded: Packet<Person> = crate::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_read_packet_id_leaves_payload() {
        let mut buf = PacketBuffer::new();
        encode_packet(VarInt(7), &42u32, &mut buf);

        assert_eq!(read_packet_id(&mut buf).unwrap(), VarInt(7));
        assert_eq!(buf.remaining(), 4);
        assert_eq!(u32::decode(&mut buf).unwrap(), 42);
    }

    #[test]
    fn test_empty_message_has_no_id() {
        let mut buf = PacketBuffer::new();
        assert!(read_packet_id(&mut buf).unwrap_err().is_truncated());
    }
}
