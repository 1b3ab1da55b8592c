//! Wire format for wsps.
//!
//! This crate defines how typed records become bytes and back:
//!
//! - **Varint** ([`VarInt`], [`varint`]) — compact unsigned integers used
//!   for packet ids, lengths, and counts.
//! - **Buffer** ([`PacketBuffer`]) — bytes with an append-only write end
//!   and a consuming read cursor, plus the primitive read/write calls.
//! - **Codec** ([`Encode`], [`Decode`], [`record!`]) — walks a value's
//!   static structure and emits or parses each part.
//! - **Packets** ([`Packet`]) — the `{id, payload}` envelope.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while decoding.
//!
//! It knows nothing about connections: it turns values into bytes and
//! bytes into values.
//!
//! ```text
//! Transport (frames) → Protocol (id + record) → Dispatch (handlers)
//! ```

mod buffer;
mod codec;
mod error;
mod packet;
pub mod varint;

pub use buffer::PacketBuffer;
pub use codec::{Decode, Encode, MapKey, from_bytes, to_bytes};
pub use error::ProtocolError;
pub use packet::{Packet, encode_packet, read_packet_id};
pub use varint::VarInt;
