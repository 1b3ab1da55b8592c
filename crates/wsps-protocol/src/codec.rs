//! Type-directed encoding and decoding of values.
//!
//! Every type that can travel inside a packet implements [`Encode`] and
//! [`Decode`]. The implementation is picked at compile time from the
//! static type of each field, so there is no runtime type inspection and
//! no type tag on the wire: a value's encoding is just the concatenation
//! of its parts.
//!
//! | Rust type                   | Wire form                                   |
//! |-----------------------------|---------------------------------------------|
//! | `u8 i8 u16 i16 u32 i32`     | big-endian, fixed width                     |
//! | `f32 f64`                   | big-endian IEEE-754                         |
//! | `bool`                      | one byte, nonzero is `true`                 |
//! | [`VarInt`]                  | varint                                      |
//! | `String`, `str`             | varint length + UTF-8 bytes                 |
//! | `Vec<u8>`, `[u8]`           | varint length + raw bytes                   |
//! | `Vec<T>`, `[T]`             | varint count + each element                 |
//! | `HashMap<K, V>`, `BTreeMap` | varint count + (key, value) per entry       |
//! | records ([`record!`])       | each field in declaration order             |
//!
//! ## Byte runs
//!
//! A `Vec<u8>` is not encoded element by element. [`Encode::encode_slice`]
//! and [`Decode::decode_vec`] are the sequence hooks: the default
//! implementations write a count and then each element, and `u8`
//! overrides both to move the whole run as one length-prefixed block. The
//! length prefix of a byte run and the count prefix of a sequence are the
//! same number, so the override changes cost, not meaning.
//!
//! ## Maps
//!
//! Entries are written in the map's own iteration order, which for
//! `HashMap` is unspecified. Two encodings of equal maps may differ byte
//! for byte; compare decoded maps instead.

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use crate::{PacketBuffer, ProtocolError, VarInt};

/// A value that can be written to a [`PacketBuffer`].
///
/// Writing to a buffer only appends to memory, so encoding cannot fail.
pub trait Encode {
    /// Appends this value's wire representation to `buf`.
    fn encode(&self, buf: &mut PacketBuffer);

    /// Appends a sequence of values: a varint count, then each element.
    ///
    /// Override this only to change how sequences of `Self` are laid out
    /// (and override [`Decode::decode_vec`] to match).
    fn encode_slice(items: &[Self], buf: &mut PacketBuffer)
    where
        Self: Sized,
    {
        buf.write_varint(items.len() as u64);
        for item in items {
            item.encode(buf);
        }
    }
}

/// A value that can be read back from a [`PacketBuffer`].
pub trait Decode: Sized {
    /// Reads one value, consuming exactly the bytes [`Encode::encode`]
    /// produced for it.
    ///
    /// # Errors
    /// Any [`ProtocolError`] from the buffer aborts the whole decode.
    fn decode(buf: &mut PacketBuffer) -> Result<Self, ProtocolError>;

    /// Reads a sequence written by [`Encode::encode_slice`].
    fn decode_vec(buf: &mut PacketBuffer) -> Result<Vec<Self>, ProtocolError> {
        let count = buf.read_count()?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(Self::decode(buf)?);
        }
        Ok(items)
    }
}

/// Marker for types allowed as map keys: scalars and text.
pub trait MapKey: Encode + Decode {}

/// Encodes `value` into a fresh byte vector.
pub fn to_bytes<T: Encode + ?Sized>(value: &T) -> Vec<u8> {
    let mut buf = PacketBuffer::new();
    value.encode(&mut buf);
    buf.into_bytes()
}

/// Decodes a `T` from the start of `bytes`. Trailing bytes are ignored.
pub fn from_bytes<T: Decode>(bytes: &[u8]) -> Result<T, ProtocolError> {
    T::decode(&mut PacketBuffer::from_bytes(bytes))
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

macro_rules! scalar {
    ($($ty:ty => $write:ident, $read:ident;)*) => {
        $(
            impl Encode for $ty {
                fn encode(&self, buf: &mut PacketBuffer) {
                    buf.$write(*self);
                }
            }

            impl Decode for $ty {
                fn decode(buf: &mut PacketBuffer) -> Result<Self, ProtocolError> {
                    buf.$read()
                }
            }
        )*
    };
}

scalar! {
    i8 => write_i8, read_i8;
    u16 => write_u16, read_u16;
    i16 => write_i16, read_i16;
    u32 => write_u32, read_u32;
    i32 => write_i32, read_i32;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
    bool => write_bool, read_bool;
}

impl Encode for u8 {
    fn encode(&self, buf: &mut PacketBuffer) {
        buf.write_u8(*self);
    }

    fn encode_slice(items: &[Self], buf: &mut PacketBuffer) {
        buf.write_bytes(items);
    }
}

impl Decode for u8 {
    fn decode(buf: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        buf.read_u8()
    }

    fn decode_vec(buf: &mut PacketBuffer) -> Result<Vec<Self>, ProtocolError> {
        buf.read_bytes()
    }
}

impl Encode for VarInt {
    fn encode(&self, buf: &mut PacketBuffer) {
        buf.write_varint(self.0);
    }
}

impl Decode for VarInt {
    fn decode(buf: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        buf.read_varint().map(VarInt)
    }
}

impl Encode for str {
    fn encode(&self, buf: &mut PacketBuffer) {
        buf.write_str(self);
    }
}

impl Encode for String {
    fn encode(&self, buf: &mut PacketBuffer) {
        buf.write_str(self);
    }
}

impl Decode for String {
    fn decode(buf: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        buf.read_string()
    }
}

impl MapKey for u8 {}
impl MapKey for i8 {}
impl MapKey for u16 {}
impl MapKey for i16 {}
impl MapKey for u32 {}
impl MapKey for i32 {}
impl MapKey for bool {}
impl MapKey for VarInt {}
impl MapKey for String {}

// ---------------------------------------------------------------------------
// Sequences
// ---------------------------------------------------------------------------

impl<T: Encode> Encode for [T] {
    fn encode(&self, buf: &mut PacketBuffer) {
        T::encode_slice(self, buf);
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, buf: &mut PacketBuffer) {
        T::encode_slice(self, buf);
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(buf: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        T::decode_vec(buf)
    }
}

// ---------------------------------------------------------------------------
// Maps
// ---------------------------------------------------------------------------

impl<K: MapKey, V: Encode, S> Encode for HashMap<K, V, S> {
    fn encode(&self, buf: &mut PacketBuffer) {
        buf.write_varint(self.len() as u64);
        for (key, value) in self {
            key.encode(buf);
            value.encode(buf);
        }
    }
}

impl<K, V, S> Decode for HashMap<K, V, S>
where
    K: MapKey + Eq + Hash,
    V: Decode,
    S: BuildHasher + Default,
{
    fn decode(buf: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        let count = buf.read_count()?;
        let mut map = HashMap::with_capacity_and_hasher(count, S::default());
        for _ in 0..count {
            let key = K::decode(buf)?;
            let value = V::decode(buf)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl<K: MapKey, V: Encode> Encode for BTreeMap<K, V> {
    fn encode(&self, buf: &mut PacketBuffer) {
        buf.write_varint(self.len() as u64);
        for (key, value) in self {
            key.encode(buf);
            value.encode(buf);
        }
    }
}

impl<K: MapKey + Ord, V: Decode> Decode for BTreeMap<K, V> {
    fn decode(buf: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        let count = buf.read_count()?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let key = K::decode(buf)?;
            let value = V::decode(buf)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

// ---------------------------------------------------------------------------
// Indirection
// ---------------------------------------------------------------------------

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, buf: &mut PacketBuffer) {
        (**self).encode(buf);
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode(&self, buf: &mut PacketBuffer) {
        (**self).encode(buf);
    }
}

impl<T: Decode> Decode for Box<T> {
    fn decode(buf: &mut PacketBuffer) -> Result<Self, ProtocolError> {
        T::decode(buf).map(Box::new)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Declares a record struct and implements [`Encode`] and [`Decode`] for
/// it.
///
/// Fields are written in the order they are declared, with no framing
/// between them. Attributes (including `#[derive]` and doc comments) are
/// passed through to the generated struct.
///
/// ```
/// use wsps_protocol::{record, to_bytes, from_bytes};
///
/// record! {
///     #[derive(Debug, PartialEq)]
///     pub struct Greeting {
///         pub name: String,
///         pub age: u8,
///     }
/// }
///
/// let hello = Greeting { name: "Jacob".into(), age: 2 };
/// let bytes = to_bytes(&hello);
/// assert_eq!(bytes, [0x05, b'J', b'a', b'c', b'o', b'b', 0x02]);
/// assert_eq!(from_bytes::<Greeting>(&bytes).unwrap(), hello);
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::Encode for $name {
            #[allow(unused_variables)]
            fn encode(&self, buf: &mut $crate::PacketBuffer) {
                $( $crate::Encode::encode(&self.$field, buf); )*
            }
        }

        impl $crate::Decode for $name {
            #[allow(unused_variables)]
            fn decode(
                buf: &mut $crate::PacketBuffer,
            ) -> ::core::result::Result<Self, $crate::ProtocolError> {
                // Struct expression fields are evaluated in source order,
                // which is the wire order.
                ::core::result::Result::Ok(Self {
                    $( $field: <$ty as $crate::Decode>::decode(buf)?, )*
                })
            }
        }
    };
}
