//! The structural mapping between Rust types and the container interface, implemented by hand for
//! the types of the standard library.
//!
//! | type                         | native                | protobuf                      |
//! |------------------------------|-----------------------|-------------------------------|
//! | `bool`                       | Byte                  | VarInt                        |
//! | `u8`, `i8`                   | Byte                  | unsupported                   |
//! | `u16`, `i16`                 | TwoByte               | unsupported                   |
//! | `u32`, `u64`, `usize`        | VarInt                | VarInt                        |
//! | `i32`, `i64`, `isize`        | VarInt, zigzag        | VarInt, two's complement      |
//! | `f32`, `f64`                 | FourByte, EightByte   | FourByte, EightByte           |
//! | `char`, `String`, `Bytes`    | LengthPrefixed        | LengthPrefixed                |
//!
//! Fixed-width integers are little endian in both formats. Floats are big endian in the native
//! format and little endian under protobuf.

use crate::decoder::Source;
use crate::encoder::Slot;
use crate::error::{Corruption, DecodeError, DecoderError, EncoderError};
use crate::key::Key;
use crate::value::Primitive;
use crate::varint;
use crate::wire::{Format, WireType};
use std::collections::{BTreeMap, HashMap};
use std::convert::TryFrom;
use std::hash::Hash;

pub trait Encode {
    fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError>;
}

pub trait Decode: Sized {

    fn decode(source: Source<'_>) -> Result<Self, DecoderError>;

    /// The wire type of an encoded value. Elements of unkeyed containers don't carry one, so the
    /// decoder has to be told.
    fn wire_type(_format: Format) -> WireType {
        WireType::LengthPrefixed
    }

    /// The value of a key which is not present, or `None` if a missing key is an error.
    fn absent(_format: Format) -> Option<Self> {
        None
    }

}

/// The zero value protobuf substitutes for absent fields.
fn zero<T: Default>(format: Format) -> Option<T> {
    if format.is_protobuf() {
        Some(T::default())
    } else {
        None
    }
}

fn integer<T: TryFrom<u64>>(source: &Source<'_>, v: u64) -> Result<T, DecoderError> {
    T::try_from(v).map_err(|_| source.error(Corruption::IntegerOutOfRange))
}

fn signed<T: TryFrom<i64>>(source: &Source<'_>, v: i64) -> Result<T, DecoderError> {
    T::try_from(v).map_err(|_| source.error(Corruption::IntegerOutOfRange))
}

impl Encode for bool {
    fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
        match slot.format() {
            Format::Native   => slot.primitive(Primitive::Byte(*self as u8)),
            Format::Protobuf => slot.primitive(Primitive::VarInt(*self as u64)),
        }
    }
}

impl Decode for bool {

    fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
        let v = match source.format() {
            Format::Native   => u64::from(source.byte()?),
            Format::Protobuf => source.varint()?,
        };
        match v {
            0 => Ok(false),
            1 => Ok(true),
            x => Err(source.error(Corruption::InvalidBool(x))),
        }
    }

    fn wire_type(format: Format) -> WireType {
        match format {
            Format::Native   => WireType::Byte,
            Format::Protobuf => WireType::VarInt,
        }
    }

    fn absent(format: Format) -> Option<Self> {
        zero(format)
    }

}

macro_rules! byte {
    ($($t:ty),*) => {$(
        impl Encode for $t {
            fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
                slot.primitive(Primitive::Byte(*self as u8))
            }
        }

        impl Decode for $t {
            fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
                source.byte().map(|b| b as $t)
            }

            fn wire_type(_format: Format) -> WireType {
                WireType::Byte
            }

            fn absent(format: Format) -> Option<Self> {
                zero(format)
            }
        }
    )*}
}

macro_rules! two_byte {
    ($($t:ty),*) => {$(
        impl Encode for $t {
            fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
                slot.primitive(Primitive::TwoByte(self.to_le_bytes()))
            }
        }

        impl Decode for $t {
            fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
                source.two_bytes().map(<$t>::from_le_bytes)
            }

            fn wire_type(_format: Format) -> WireType {
                WireType::TwoByte
            }

            fn absent(format: Format) -> Option<Self> {
                zero(format)
            }
        }
    )*}
}

macro_rules! unsigned {
    ($($t:ty),*) => {$(
        impl Encode for $t {
            fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
                slot.primitive(Primitive::VarInt(*self as u64))
            }
        }

        impl Decode for $t {
            fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
                let v = source.varint()?;
                integer(&source, v)
            }

            fn wire_type(_format: Format) -> WireType {
                WireType::VarInt
            }

            fn absent(format: Format) -> Option<Self> {
                zero(format)
            }
        }
    )*}
}

macro_rules! signed {
    ($($t:ty),*) => {$(
        impl Encode for $t {
            fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
                let v = match slot.format() {
                    Format::Native   => varint::zigzag_encode(*self as i64),
                    Format::Protobuf => *self as i64 as u64,
                };
                slot.primitive(Primitive::VarInt(v))
            }
        }

        impl Decode for $t {
            fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
                let v = match source.format() {
                    Format::Native   => source.zigzag()?,
                    Format::Protobuf => source.varint()? as i64,
                };
                signed(&source, v)
            }

            fn wire_type(_format: Format) -> WireType {
                WireType::VarInt
            }

            fn absent(format: Format) -> Option<Self> {
                zero(format)
            }
        }
    )*}
}

byte!(u8, i8);
two_byte!(u16, i16);
unsigned!(u32, u64, usize);
signed!(i32, i64, isize);

impl Encode for f32 {
    fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
        match slot.format() {
            Format::Native   => slot.primitive(Primitive::FourByte(self.to_be_bytes())),
            Format::Protobuf => slot.primitive(Primitive::FourByte(self.to_le_bytes())),
        }
    }
}

impl Decode for f32 {

    fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
        let bytes = source.four_bytes()?;
        match source.format() {
            Format::Native   => Ok(f32::from_be_bytes(bytes)),
            Format::Protobuf => Ok(f32::from_le_bytes(bytes)),
        }
    }

    fn wire_type(_format: Format) -> WireType {
        WireType::FourByte
    }

    fn absent(format: Format) -> Option<Self> {
        zero(format)
    }

}

impl Encode for f64 {
    fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
        match slot.format() {
            Format::Native   => slot.primitive(Primitive::EightByte(self.to_be_bytes())),
            Format::Protobuf => slot.primitive(Primitive::EightByte(self.to_le_bytes())),
        }
    }
}

impl Decode for f64 {

    fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
        let bytes = source.eight_bytes()?;
        match source.format() {
            Format::Native   => Ok(f64::from_be_bytes(bytes)),
            Format::Protobuf => Ok(f64::from_le_bytes(bytes)),
        }
    }

    fn wire_type(_format: Format) -> WireType {
        WireType::EightByte
    }

    fn absent(format: Format) -> Option<Self> {
        zero(format)
    }

}

impl Encode for str {
    fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
        slot.primitive(Primitive::LengthPrefixed(self.as_bytes().to_vec()))
    }
}

impl Encode for String {
    fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
        self.as_str().encode(slot)
    }
}

impl Decode for String {

    fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
        let s = source.str()?;
        let mut owned = String::new();
        owned.try_reserve_exact(s.len()).map_err(|e| source.error(Corruption::from(e)))?;
        owned.push_str(s);
        Ok(owned)
    }

    fn absent(format: Format) -> Option<Self> {
        zero(format)
    }

}

impl Encode for char {
    fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
        self.encode_utf8(&mut [0; 4]).encode(slot)
    }
}

impl Decode for char {

    fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
        let mut chars = source.str()?.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(source.error(Corruption::Invalid("expected exactly one character".to_owned()))),
        }
    }

}

impl Encode for () {
    fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
        slot.primitive(Primitive::LengthPrefixed(Vec::new()))
    }
}

impl Decode for () {

    fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
        match source.bytes()?.len() {
            0 => Ok(()),
            n => Err(source.error(Corruption::InvalidDataSize { expected: 0, actual: n })),
        }
    }

    fn absent(format: Format) -> Option<Self> {
        zero(format)
    }

}

/// A byte string. A plain `Vec<u8>` is a sequence of `u8` elements instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Bytes(pub Vec<u8>);

impl Encode for Bytes {
    fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
        slot.primitive(Primitive::LengthPrefixed(self.0.clone()))
    }
}

impl Decode for Bytes {

    fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
        let bytes = source.bytes()?;
        let mut owned = Vec::new();
        owned.try_reserve_exact(bytes.len()).map_err(|e| source.error(Corruption::from(e)))?;
        owned.extend_from_slice(bytes);
        Ok(Bytes(owned))
    }

    fn absent(format: Format) -> Option<Self> {
        zero(format)
    }

}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
        (**self).encode(slot)
    }
}

impl<T: Encode + ?Sized> Encode for Box<T> {
    fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
        (**self).encode(slot)
    }
}

impl<T: Decode> Decode for Box<T> {

    fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
        T::decode(source).map(Box::new)
    }

    fn wire_type(format: Format) -> WireType {
        T::wire_type(format)
    }

    fn absent(format: Format) -> Option<Self> {
        T::absent(format).map(Box::new)
    }

}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
        let mut value = slot.begin_single_value()?;
        match self {
            Some(v) => value.set(v),
            None    => value.set_nil(),
        }
    }
}

impl<T: Decode> Decode for Option<T> {

    fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
        source.single_value()?.decode()
    }

    fn wire_type(format: Format) -> WireType {
        T::wire_type(format)
    }

    fn absent(_format: Format) -> Option<Self> {
        Some(None)
    }

}

impl<T: Encode> Encode for [T] {
    fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
        let mut unkeyed = slot.begin_unkeyed()?;
        for item in self.iter() {
            unkeyed.append(item)?;
        }
        Ok(())
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
        self.as_slice().encode(slot)
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
        self.as_slice().encode(slot)
    }
}

impl<T: Decode> Decode for Vec<T> {

    fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
        let mut unkeyed = source.unkeyed()?;
        let mut items = Vec::new();
        while let Some(item) = unkeyed.decode_next()? {
            items.try_reserve(1).map_err(|e| source.error(Corruption::from(e)))?;
            items.push(item);
        }
        Ok(items)
    }

    fn absent(format: Format) -> Option<Self> {
        zero(format)
    }

}

/// Types which can be the key of a map. Native maps are keyed containers, so their keys must
/// convert to a `Key`. Protobuf maps encode keys as ordinary fields.
pub trait MapKey: Encode + Decode {

    fn to_key(&self) -> Key;

    fn from_key(key: &Key) -> Option<Self>;

}

impl MapKey for String {

    fn to_key(&self) -> Key {
        Key::Str(self.clone())
    }

    fn from_key(key: &Key) -> Option<Self> {
        key.as_str().map(str::to_owned)
    }

}

macro_rules! unsigned_key {
    ($($t:ty),*) => {$(
        impl MapKey for $t {
            fn to_key(&self) -> Key {
                Key::Int(*self as u64)
            }

            fn from_key(key: &Key) -> Option<Self> {
                key.as_int().and_then(|i| <$t>::try_from(i).ok())
            }
        }
    )*}
}

macro_rules! signed_key {
    ($($t:ty),*) => {$(
        impl MapKey for $t {
            fn to_key(&self) -> Key {
                Key::Int(varint::zigzag_encode(*self as i64))
            }

            fn from_key(key: &Key) -> Option<Self> {
                key.as_int().and_then(|i| <$t>::try_from(varint::zigzag_decode(i)).ok())
            }
        }
    )*}
}

unsigned_key!(u8, u16, u32, u64, usize);
signed_key!(i8, i16, i32, i64, isize);

/// Protobuf map entries are messages with the key in field 1 and the value in field 2.
const MAP_KEY: u64 = 1;
const MAP_VALUE: u64 = 2;

fn encode_map<'a, K, V, I>(slot: &mut Slot<'_>, entries: I) -> Result<(), EncoderError>
where
    K: MapKey + 'a,
    V: Encode + 'a,
    I: Iterator<Item = (&'a K, &'a V)>,
{
    match slot.format() {
        Format::Native => {
            let mut keyed = slot.begin_keyed()?;
            for (k, v) in entries {
                keyed.put(k.to_key(), v)?;
            }
        },
        Format::Protobuf => {
            let mut unkeyed = slot.begin_unkeyed()?;
            for (k, v) in entries {
                unkeyed.append_with(|slot: &mut Slot<'_>| {
                    let mut entry = slot.begin_keyed()?;
                    entry.put(MAP_KEY, k)?;
                    entry.put(MAP_VALUE, v)
                })?;
            }
        },
    }
    Ok(())
}

fn decode_map<K, V, F>(source: Source<'_>, mut insert: F) -> Result<(), DecoderError>
where
    K: MapKey,
    V: Decode,
    F: FnMut(K, V),
{
    match source.format() {
        Format::Native => {
            let keyed = source.keyed()?;
            for key in keyed.keys() {
                let k = K::from_key(key).ok_or_else(|| keyed_error(&source, key))?;
                insert(k, keyed.decode(key)?);
            }
        },
        Format::Protobuf => {
            let mut unkeyed = source.unkeyed()?;
            while let Some(entry) = unkeyed.next(WireType::LengthPrefixed)? {
                let entry = entry.keyed()?;
                insert(entry.decode(MAP_KEY)?, entry.decode(MAP_VALUE)?);
            }
        },
    }
    Ok(())
}

fn keyed_error(source: &Source<'_>, key: &Key) -> DecoderError {
    DecodeError::from(Corruption::InvalidKey(key.clone())).at(&source.path().child(key.clone()))
}

impl<K: MapKey + Eq + Hash, V: Encode> Encode for HashMap<K, V> {
    fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
        encode_map(slot, self.iter())
    }
}

impl<K: MapKey + Eq + Hash, V: Decode> Decode for HashMap<K, V> {

    fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
        let mut map = HashMap::new();
        decode_map(source, |k, v| { map.insert(k, v); })?;
        Ok(map)
    }

    fn absent(format: Format) -> Option<Self> {
        zero(format)
    }

}

impl<K: MapKey + Ord, V: Encode> Encode for BTreeMap<K, V> {
    fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
        encode_map(slot, self.iter())
    }
}

impl<K: MapKey + Ord, V: Decode> Decode for BTreeMap<K, V> {

    fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
        let mut map = BTreeMap::new();
        decode_map(source, |k, v| { map.insert(k, v); })?;
        Ok(map)
    }

    fn absent(format: Format) -> Option<Self> {
        zero(format)
    }

}

/// Encodes an integer as a fixed-width little endian value (protobuf `fixed32`, `sfixed64`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Fixed<T>(pub T);

/// Encodes an integer as a varint of its bit pattern, without zigzag mapping. Negative numbers are
/// sign extended to 64 bit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Variable<T>(pub T);

/// Encodes a signed integer as a zigzag varint in both formats (protobuf `sint32`, `sint64`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ZigZag<T>(pub T);

macro_rules! fixed {
    ($($t:ty => $variant:ident, $read:ident, $wire:ident);*) => {$(
        impl Encode for Fixed<$t> {
            fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
                slot.primitive(Primitive::$variant(self.0.to_le_bytes()))
            }
        }

        impl Decode for Fixed<$t> {
            fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
                source.$read().map(|b| Fixed(<$t>::from_le_bytes(b)))
            }

            fn wire_type(_format: Format) -> WireType {
                WireType::$wire
            }

            fn absent(format: Format) -> Option<Self> {
                zero(format)
            }
        }
    )*}
}

fixed!(u32 => FourByte, four_bytes, FourByte; i32 => FourByte, four_bytes, FourByte;
       u64 => EightByte, eight_bytes, EightByte; i64 => EightByte, eight_bytes, EightByte);

macro_rules! variable {
    ($($t:ty => $via:ty, $read:ident);*) => {$(
        impl Encode for Variable<$t> {
            fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
                slot.primitive(Primitive::VarInt(self.0 as $via as u64))
            }
        }

        impl Decode for Variable<$t> {
            fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
                let v = source.varint()?;
                $read(&source, v as $via).map(Variable)
            }

            fn wire_type(_format: Format) -> WireType {
                WireType::VarInt
            }

            fn absent(format: Format) -> Option<Self> {
                zero(format)
            }
        }
    )*}
}

variable!(u32 => u64, integer; u64 => u64, integer; i32 => i64, signed; i64 => i64, signed);

macro_rules! zigzag {
    ($($t:ty),*) => {$(
        impl Encode for ZigZag<$t> {
            fn encode(&self, slot: &mut Slot<'_>) -> Result<(), EncoderError> {
                slot.primitive(Primitive::VarInt(varint::zigzag_encode(self.0 as i64)))
            }
        }

        impl Decode for ZigZag<$t> {
            fn decode(source: Source<'_>) -> Result<Self, DecoderError> {
                let v = source.zigzag()?;
                signed(&source, v).map(ZigZag)
            }

            fn wire_type(_format: Format) -> WireType {
                WireType::VarInt
            }

            fn absent(format: Format) -> Option<Self> {
                zero(format)
            }
        }
    )*}
}

zigzag!(i32, i64);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use crate::encoder::Encoder;
    use crate::error::{EncodeError, Unsupported};
    use proptest::prelude::*;
    use std::fmt::Debug;

    fn assert_roundtrip<T: Encode + Decode + PartialEq + Debug>(value: T) {
        let bytes = Encoder::new().encode(&value).unwrap();
        assert_eq!(value, Decoder::new().decode::<T>(&bytes).unwrap());
    }

    /// Protobuf needs a message around everything.
    fn assert_protobuf_roundtrip<T: Encode + Decode + PartialEq + Debug>(value: T) {
        let bytes = Encoder::protobuf().encode_with(|slot: &mut Slot<'_>| slot.begin_keyed()?.put(1, &value)).unwrap();
        let decoded = Decoder::protobuf().decode_with(&bytes, |s: Source<'_>| s.keyed()?.decode::<T>(1)).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn integer_limits() {
        for v in [0u8, 1, u8::MAX] { assert_roundtrip(v); }
        for v in [0i8, -1, i8::MIN, i8::MAX] { assert_roundtrip(v); }
        for v in [0u16, 1, u16::MAX] { assert_roundtrip(v); }
        for v in [0i16, -1, i16::MIN, i16::MAX] { assert_roundtrip(v); }
        for v in [0u32, 1, u32::MAX] { assert_roundtrip(v); assert_protobuf_roundtrip(v); }
        for v in [0i32, -1, i32::MIN, i32::MAX] { assert_roundtrip(v); assert_protobuf_roundtrip(v); }
        for v in [0u64, 1, u64::MAX] { assert_roundtrip(v); assert_protobuf_roundtrip(v); }
        for v in [0i64, -1, i64::MIN, i64::MAX] { assert_roundtrip(v); assert_protobuf_roundtrip(v); }
        for v in [0usize, usize::MAX] { assert_roundtrip(v); }
        for v in [0isize, isize::MIN, isize::MAX] { assert_roundtrip(v); }
    }

    #[test]
    fn wrappers() {
        assert_roundtrip(Fixed(u32::MAX));
        assert_roundtrip(Fixed(-1i64));
        assert_roundtrip(Variable(i64::MIN));
        assert_roundtrip(Variable(-1i32));
        assert_roundtrip(ZigZag(i32::MIN));
        assert_protobuf_roundtrip(Fixed(-5i32));
        assert_protobuf_roundtrip(Variable(-5i32));
        assert_protobuf_roundtrip(ZigZag(-5i64));
    }

    #[test]
    fn protobuf_integer_encodings() {
        let encode = |slot: &mut Slot<'_>| slot.begin_keyed()?.put(1, &-1i32);
        let bytes = Encoder::protobuf().encode_with(encode).unwrap();
        assert_eq!(bytes, [0x08, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]);
        let encode = |slot: &mut Slot<'_>| slot.begin_keyed()?.put(1, &ZigZag(-1i32));
        assert_eq!(Encoder::protobuf().encode_with(encode).unwrap(), [0x08, 0x01]);
        let encode = |slot: &mut Slot<'_>| slot.begin_keyed()?.put(1, &Fixed(1u32));
        assert_eq!(Encoder::protobuf().encode_with(encode).unwrap(), [0x0d, 0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn floats() {
        assert_eq!(Encoder::new().encode(&1.0f32).unwrap(), [0x3f, 0x80, 0x00, 0x00]);
        for v in [0.0f64, -0.0, 1.5, f64::MIN, f64::MAX, f64::INFINITY] {
            assert_roundtrip(v);
            assert_protobuf_roundtrip(v);
        }
        let bytes = Encoder::new().encode(&f64::NAN).unwrap();
        assert!(Decoder::new().decode::<f64>(&bytes).unwrap().is_nan());
    }

    #[test]
    fn strings_and_bytes() {
        assert_roundtrip(String::new());
        assert_roundtrip("Üñíçødé".to_owned());
        assert_roundtrip('ß');
        assert_roundtrip(Bytes(vec![0, 1, 2, 255]));
        assert_roundtrip(());
        assert_protobuf_roundtrip("x".to_owned());
        assert_protobuf_roundtrip(Bytes(vec![7; 300]));
        assert_eq!(Encoder::new().encode("abc").unwrap(), b"abc");
    }

    #[test]
    fn bool_values() {
        assert_roundtrip(true);
        assert_roundtrip(false);
        assert_protobuf_roundtrip(true);
        let e = Decoder::new().decode::<bool>(&[0x02]).unwrap_err();
        assert_eq!(e.into_inner(), DecodeError::Corrupted(Corruption::InvalidBool(2)));
    }

    #[test]
    fn collections() {
        assert_roundtrip(vec![1u32, 2, 3]);
        assert_roundtrip(Vec::<String>::new());
        assert_roundtrip(vec![Some("a".to_owned()), None, Some(String::new())]);
        assert_roundtrip(vec![vec![1i64, -1], vec![], vec![i64::MIN]]);
        assert_roundtrip(Box::new(Some(5u16)));
        assert_eq!(Encoder::new().encode(&[1u32, 2]).unwrap(), Encoder::new().encode(&vec![1u32, 2]).unwrap());
        assert_protobuf_roundtrip(vec![1u32, 0, 300]);
        assert_protobuf_roundtrip(vec!["a".to_owned(), String::new()]);
        assert_protobuf_roundtrip(vec![1.5f32, -2.0]);
    }

    #[test]
    fn maps() {
        let map: BTreeMap<String, u32> = [("a".to_owned(), 1), ("b".to_owned(), 2)].into_iter().collect();
        assert_roundtrip(map.clone());
        assert_protobuf_roundtrip(map);
        let map: HashMap<i32, Vec<bool>> = [(-1, vec![true]), (7, vec![])].into_iter().collect();
        assert_roundtrip(map.clone());
        assert_protobuf_roundtrip(map);
    }

    #[test]
    fn map_with_duplicate_keys() {
        let bytes = [0x18, b'a', 0x01, 0x18, b'a', 0x02];
        let e = Decoder::new().decode::<HashMap<String, u32>>(&bytes).unwrap_err();
        assert_eq!(e.into_inner(), DecodeError::Corrupted(Corruption::DuplicateKey(Key::from("a"))));
    }

    #[test]
    fn map_with_wrong_key_kind() {
        let bytes = [0x10, 0x01];
        let e = Decoder::new().decode::<HashMap<String, u32>>(&bytes).unwrap_err();
        assert_eq!(e.into_inner(), DecodeError::Corrupted(Corruption::InvalidKey(Key::Int(1))));
    }

    #[test]
    fn sorted_maps_are_deterministic() {
        let encoder = Encoder::new().sort_keys(true);
        let a: HashMap<String, u32> = (0..50).map(|i| (format!("key{}", i), i)).collect();
        let b: HashMap<String, u32> = (0..50).rev().map(|i| (format!("key{}", i), i)).collect();
        assert_eq!(encoder.encode(&a).unwrap(), encoder.encode(&b).unwrap());
    }

    #[test]
    fn protobuf_absent_values() {
        let decoder = Decoder::protobuf();
        let value = decoder.decode_with(&[], |s: Source<'_>| {
            let keyed = s.keyed()?;
            Ok::<_, DecoderError>((
                keyed.decode::<u32>(1)?,
                keyed.decode::<String>(2)?,
                keyed.decode::<Vec<u64>>(3)?,
                keyed.decode::<Option<bool>>(4)?,
                keyed.decode::<BTreeMap<u32, u32>>(5)?,
            ))
        });
        assert_eq!(value, Ok((0, String::new(), vec![], None, BTreeMap::new())));
    }

    #[test]
    fn protobuf_rejects_small_integers() {
        let e = Encoder::protobuf().encode_with(|slot: &mut Slot<'_>| slot.begin_keyed()?.put(1, &1i16)).unwrap_err();
        assert_eq!(e.into_inner(), EncodeError::Unsupported(Unsupported::WireType(WireType::TwoByte)));
    }

    proptest! {

        #[test]
        fn native_i64(v in any::<i64>()) {
            let bytes = Encoder::new().encode(&v).unwrap();
            prop_assert!(bytes.len() <= varint::MAX_NATIVE_LEN);
            prop_assert_eq!(Decoder::new().decode::<i64>(&bytes).unwrap(), v);
        }

        #[test]
        fn native_f32(v in any::<f32>().prop_filter("NaN never equals itself", |v| !v.is_nan())) {
            let bytes = Encoder::new().encode(&v).unwrap();
            prop_assert_eq!(Decoder::new().decode::<f32>(&bytes).unwrap(), v);
        }

        #[test]
        fn native_strings(v in any::<String>()) {
            let bytes = Encoder::new().encode(&v).unwrap();
            prop_assert_eq!(Decoder::new().decode::<String>(&bytes).unwrap(), v);
        }

        #[test]
        fn protobuf_i32(v in any::<i32>()) {
            let bytes = Encoder::protobuf().encode_with(|slot: &mut Slot<'_>| slot.begin_keyed()?.put(1, &v)).unwrap();
            let decoded = Decoder::protobuf().decode_with(&bytes, |s: Source<'_>| s.keyed()?.decode::<i32>(1)).unwrap();
            prop_assert_eq!(decoded, v);
        }

        #[test]
        fn optional_vectors(v in proptest::collection::vec(any::<Option<u16>>(), 0..32)) {
            let bytes = Encoder::new().encode(&v).unwrap();
            prop_assert_eq!(Decoder::new().decode::<Vec<Option<u16>>>(&bytes).unwrap(), v);
        }

    }

}
