//! `tagwire` is a tagged binary wire format in two variants: a self-describing native format and a
//! wire compatible subset of Protocol Buffers.
//!
//! Values are written through a container interface. Types implement `Encode` by requesting a
//! keyed, unkeyed or single value container from a `Slot` and filling it, and `Decode` by reading
//! the same container back from a `Source`. The encoder first builds a tree of `EncodedValue`s and
//! serializes it once complete, so lengths are always known before a container is written. The
//! decoder is pull based: a keyed container is scanned once into a table of fields and every field
//! is decoded only when it is asked for.
//!
//! Every field is a tag followed by a payload. The tag carries the key and one of six wire types,
//! length prefixed payloads carry their length in the lowest bits of which the native format also
//! signals nil. Errors carry the `CodingPath` of the field they occurred in.
//!
//! # A note on `usize`
//!
//! Lengths are 64 bit unsigned integers on the wire. On architectures where `usize` is smaller,
//! some valid messages can not be decoded and a `Corruption::Length` will be raised. Likewise, some
//! values can not be encoded where `usize` is larger, which raises `EncodeError::Length`.
//!
//! # Examples
//!
//! ```
//! use tagwire::*;
//! use std::collections::BTreeMap;
//!
//! let value = BTreeMap::from([("key".to_owned(), 5u32)]);
//! let bytes = Encoder::new().encode(&value).unwrap();
//! assert_eq!(bytes, [
//!     0x38, // key of length 3, string key, wire type VarInt
//!     0x6b, // 'k'
//!     0x65, // 'e'
//!     0x79, // 'y'
//!     0x05, // 5
//! ]);
//! assert_eq!(value, Decoder::new().decode::<BTreeMap<String, u32>>(&bytes).unwrap());
//! ```
//!
//! Protobuf messages must have a keyed root. Integer keys are field numbers:
//!
//! ```
//! use tagwire::*;
//!
//! let bytes = Encoder::protobuf().encode_with(|slot: &mut Slot<'_>| {
//!     slot.begin_keyed()?.put(1, &150u32)
//! }).unwrap();
//! assert_eq!(bytes, [
//!     0x08, // field 1, wire type VarInt
//!     0x96, // 150, low seven bits
//!     0x01, // 150, high bits
//! ]);
//! let decoded = Decoder::protobuf().decode_with(&bytes, |source: Source<'_>| source.keyed()?.decode::<u32>(1));
//! assert_eq!(decoded, Ok(150));
//! ```

mod codable;
mod decoder;
mod encoder;
mod error;
mod key;
mod stream;
mod value;
pub mod varint;
pub mod wire;

pub use codable::*;
pub use decoder::*;
pub use encoder::*;
pub use error::*;
pub use key::*;
pub use stream::*;
pub use value::*;
pub use wire::{Format, WireType};
