use serde::de::{self, DeserializeOwned, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess, VariantAccess, Visitor};
use serde::de::value::{MapDeserializer, SeqDeserializer};
use serde::de::Deserializer as _;
use serde::{forward_to_deserialize_any, Deserialize};
use tagwire::{
    varint, Bytes, CodingPath, Corruption, Decode, DecodeError, Decoder, Format, Key, KeyedSource, Source,
    UnkeyedSource, Unsupported, WireType,
};
use std::convert::TryFrom;

use crate::error::{Error, Result};

/// Reads one node of a message. Fields are only decoded once they are asked for, so ignored
/// fields cost nothing.
pub struct Deserializer<'de> {
    source: Source<'de>,
}

impl<'de> Deserializer<'de> {
    pub fn new(source: Source<'de>) -> Self {
        Deserializer { source }
    }
}

pub fn from_bytes<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T> {
    from_bytes_with(&Decoder::new(), bytes)
}

pub fn from_bytes_with<'a, T: Deserialize<'a>>(decoder: &Decoder, bytes: &'a [u8]) -> Result<T> {
    decoder.decode_with(bytes, |source: Source<'a>| T::deserialize(Deserializer::new(source)))
}

/// Decodes a length delimited stream of `T`s as its chunks arrive.
pub type StreamDecoder<T> = tagwire::StreamDecoder<T, Error>;

pub fn stream_decoder<T: DeserializeOwned>(decoder: Decoder) -> StreamDecoder<T> {
    tagwire::StreamDecoder::with_fn(decoder, |source: Source<'_>| T::deserialize(Deserializer::new(source)))
}

fn out_of_range(path: &CodingPath) -> Error {
    Error::Decode(DecodeError::from(Corruption::IntegerOutOfRange).at(path))
}

/// The one key of an enum container. It names the variant.
fn variant_key(keyed: &KeyedSource<'_>) -> Result<Key> {
    let mut keys = keyed.keys();
    match (keys.next(), keyed.len()) {
        (Some(key), 1) => Ok(key.clone()),
        (None, _) => Err(Error::NoVariant),
        (Some(_), n) => Err(Error::Decode(DecodeError::from(Unsupported::MultipleOneOfCases(n)).at(keyed.path()))),
    }
}

macro_rules! decode_primitive {
    ($($method:ident => $t:ty, $visit:ident);* $(;)?) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
            visitor.$visit(<$t>::decode(self.source)?)
        }
    )*}
}

impl<'de> de::Deserializer<'de> for Deserializer<'de> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if self.source.is_nil() {
            return visitor.visit_none();
        }
        match self.source.wire_type() {
            None => Err(Error::Untyped("the root of a message")),
            Some(WireType::VarInt) => visitor.visit_u64(self.source.varint()?),
            Some(WireType::Byte) => visitor.visit_u8(self.source.byte()?),
            Some(WireType::TwoByte) => visitor.visit_u16(u16::decode(self.source)?),
            Some(WireType::FourByte) => visitor.visit_f32(f32::decode(self.source)?),
            Some(WireType::EightByte) => visitor.visit_f64(f64::decode(self.source)?),
            Some(WireType::LengthPrefixed) => {
                let bytes = self.source.bytes()?;
                match std::str::from_utf8(bytes) {
                    Ok(s) => visitor.visit_borrowed_str(s),
                    Err(_) => visitor.visit_borrowed_bytes(bytes),
                }
            },
        }
    }

    decode_primitive! {
        deserialize_bool => bool, visit_bool;
        deserialize_i8 => i8, visit_i8;
        deserialize_i16 => i16, visit_i16;
        deserialize_i32 => i32, visit_i32;
        deserialize_i64 => i64, visit_i64;
        deserialize_u8 => u8, visit_u8;
        deserialize_u16 => u16, visit_u16;
        deserialize_u32 => u32, visit_u32;
        deserialize_u64 => u64, visit_u64;
        deserialize_f32 => f32, visit_f32;
        deserialize_f64 => f64, visit_f64;
        deserialize_char => char, visit_char;
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_str(self.source.str()?)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_bytes(self.source.bytes()?)
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let value = self.source.single_value()?;
        if value.is_nil() {
            visitor.visit_none()
        } else {
            visitor.visit_some(Deserializer::new(value.get()?))
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        <()>::decode(self.source)?;
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_seq(ElementAccess { items: self.source.unkeyed()? })
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(self, _name: &'static str, _len: usize, visitor: V) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.source.format() {
            Format::Native   => visitor.visit_map(KeyedAccess::new(self.source.keyed()?)),
            Format::Protobuf => visitor.visit_map(EntryAccess { entries: self.source.unkeyed()?, entry: None }),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(self, _name: &'static str, fields: &'static [&'static str], visitor: V) -> Result<V::Value> {
        let keyed = self.source.keyed()?;
        match keyed.format() {
            Format::Native   => visitor.visit_map(KeyedAccess::new(keyed)),
            Format::Protobuf => visitor.visit_map(FieldAccess { keyed: Some(keyed), fields, pos: 0 }),
        }
    }

    fn deserialize_enum<V: Visitor<'de>>(self, _name: &'static str, _variants: &'static [&'static str], visitor: V) -> Result<V::Value> {
        match self.source.format() {
            Format::Native => {
                let keyed = self.source.keyed()?;
                let key = variant_key(&keyed)?;
                let name = match key.as_str() {
                    Some(name) => name.to_owned(),
                    None => return Err(Error::Decode(DecodeError::from(Corruption::InvalidKey(key)).at(keyed.path()))),
                };
                let value = keyed.get(&key).ok_or(Error::NoVariant)?;
                visitor.visit_enum(VariantDeserializer { variant: name, value })
            },
            Format::Protobuf => match self.source.wire_type() {
                Some(WireType::VarInt) => visitor.visit_enum(u32::decode(self.source)?.into_deserializer()),
                _ => {
                    let keyed = self.source.keyed()?;
                    let key = variant_key(&keyed)?;
                    let index = key.as_int()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|i| u32::try_from(i).ok())
                        .ok_or_else(|| out_of_range(keyed.path()))?;
                    let value = keyed.get(&key).ok_or(Error::NoVariant)?;
                    visitor.visit_enum(VariantDeserializer { variant: index, value })
                },
            },
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn is_human_readable(&self) -> bool {
        false
    }

}

/// Natively keyed containers: maps and structs keyed by field name.
struct KeyedAccess<'de> {
    keyed: KeyedSource<'de>,
    keys: std::vec::IntoIter<Key>,
    current: Option<Key>,
}

impl<'de> KeyedAccess<'de> {
    fn new(keyed: KeyedSource<'de>) -> Self {
        let keys: Vec<Key> = keyed.keys().cloned().collect();
        KeyedAccess { keyed, keys: keys.into_iter(), current: None }
    }
}

impl<'de> MapAccess<'de> for KeyedAccess<'de> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        match self.keys.next() {
            None => Ok(None),
            Some(key) => {
                let path = self.keyed.path().child(key.clone());
                self.current = Some(key.clone());
                seed.deserialize(KeyDeserializer { key, path }).map(Some)
            },
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        let source = self.current.take().and_then(|key| self.keyed.get(key));
        match source {
            Some(source) => seed.deserialize(Deserializer::new(source)),
            None => Err(Error::Message("map value requested before its key".to_owned())),
        }
    }

    #[inline]
    fn size_hint(&self) -> Option<usize> {
        Some(self.keys.len())
    }
}

/// Protobuf structs. Field numbers are positions in the declared field list, absent fields take
/// their zero value.
struct FieldAccess<'de> {
    keyed: Option<KeyedSource<'de>>,
    fields: &'static [&'static str],
    pos: usize,
}

impl<'de> MapAccess<'de> for FieldAccess<'de> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        match self.fields.get(self.pos) {
            None => Ok(None),
            Some(name) => {
                self.pos += 1;
                seed.deserialize(name.into_deserializer()).map(Some)
            },
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        match self.keyed.as_ref().and_then(|keyed| keyed.get(self.pos as u64)) {
            Some(source) => seed.deserialize(Deserializer::new(source)),
            None => seed.deserialize(Absent),
        }
    }

    #[inline]
    fn size_hint(&self) -> Option<usize> {
        Some(self.fields.len() - self.pos)
    }
}

/// Protobuf maps: repeated entry messages holding the key in field 1 and the value in field 2.
struct EntryAccess<'de> {
    entries: UnkeyedSource<'de>,
    entry: Option<KeyedSource<'de>>,
}

impl<'de> MapAccess<'de> for EntryAccess<'de> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        let entry = match self.entries.next(WireType::LengthPrefixed)? {
            Some(source) => source.keyed()?,
            None => return Ok(None),
        };
        let key = EntryKey { path: entry.path().child(Key::Int(1)), source: entry.get(1u64) };
        self.entry = Some(entry);
        seed.deserialize(key).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        match self.entry.take().and_then(|entry| entry.get(2u64)) {
            Some(source) => seed.deserialize(Deserializer::new(source)),
            None => seed.deserialize(Absent),
        }
    }
}

/// Unkeyed containers. Elements carry no wire type, so each one is only read once the visitor
/// asked for a type.
struct ElementAccess<'de> {
    items: UnkeyedSource<'de>,
}

impl<'de> SeqAccess<'de> for ElementAccess<'de> {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        if self.items.is_at_end() {
            Ok(None)
        } else {
            seed.deserialize(Element { items: &mut self.items }).map(Some)
        }
    }
}

struct Element<'a, 'de> {
    items: &'a mut UnkeyedSource<'de>,
}

impl<'a, 'de> Element<'a, 'de> {

    fn next(self, wire: WireType) -> Result<Deserializer<'de>> {
        let path = self.items.path().child(Key::index(self.items.current_index()));
        match self.items.next(wire)? {
            Some(source) => Ok(Deserializer::new(source)),
            None => Err(Error::Decode(DecodeError::from(Corruption::Truncated).at(&path))),
        }
    }

    fn wire<T: Decode>(&self) -> WireType {
        T::wire_type(self.items.format())
    }

}

macro_rules! typed_element {
    ($($method:ident => $t:ty);* $(;)?) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
            let wire = self.wire::<$t>();
            self.next(wire)?.$method(visitor)
        }
    )*}
}

impl<'a, 'de> de::Deserializer<'de> for Element<'a, 'de> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::Untyped("an unkeyed element"))
    }

    typed_element! {
        deserialize_bool => bool;
        deserialize_i8 => i8;
        deserialize_i16 => i16;
        deserialize_i32 => i32;
        deserialize_i64 => i64;
        deserialize_u8 => u8;
        deserialize_u16 => u16;
        deserialize_u32 => u32;
        deserialize_u64 => u64;
        deserialize_f32 => f32;
        deserialize_f64 => f64;
        deserialize_char => char;
        deserialize_str => String;
        deserialize_string => String;
        deserialize_bytes => Bytes;
        deserialize_byte_buf => Bytes;
        deserialize_unit => ();
        deserialize_identifier => String;
        deserialize_seq => Vec<()>;
        deserialize_map => Vec<()>;
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if self.items.is_nil_at(self.items.current_index()) {
            self.next(WireType::LengthPrefixed)?;
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(self, _name: &'static str, _len: usize, visitor: V) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_struct<V: Visitor<'de>>(self, name: &'static str, fields: &'static [&'static str], visitor: V) -> Result<V::Value> {
        self.next(WireType::LengthPrefixed)?.deserialize_struct(name, fields, visitor)
    }

    /// Protobuf elements can only be unit variants, written as their index.
    fn deserialize_enum<V: Visitor<'de>>(self, name: &'static str, variants: &'static [&'static str], visitor: V) -> Result<V::Value> {
        let wire = match self.items.format() {
            Format::Native   => WireType::LengthPrefixed,
            Format::Protobuf => WireType::VarInt,
        };
        self.next(wire)?.deserialize_enum(name, variants, visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::Untyped("an ignored unkeyed element"))
    }

    fn is_human_readable(&self) -> bool {
        false
    }

}

/// A variant named by `K`, which is the variant name natively and the variant index under
/// protobuf.
struct VariantDeserializer<'de, K> {
    variant: K,
    value: Source<'de>,
}

impl<'de, K: IntoDeserializer<'de, Error>> EnumAccess<'de> for VariantDeserializer<'de, K> {
    type Error = Error;
    type Variant = Deserializer<'de>;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self::Variant)> {
        let variant = seed.deserialize(self.variant.into_deserializer())?;
        Ok((variant, Deserializer::new(self.value)))
    }
}

impl<'de> VariantAccess<'de> for Deserializer<'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        <()>::decode(self.source)?;
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        seed.deserialize(self)
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_seq(self, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(self, fields: &'static [&'static str], visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_struct(self, "", fields, visitor)
    }

}

macro_rules! integer_key {
    ($($method:ident => $t:ty, $visit:ident, $read:ident);* $(;)?) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
            let v = self.$read()?;
            visitor.$visit(<$t>::try_from(v).map_err(|_| out_of_range(&self.path))?)
        }
    )*}
}

/// The key of a native keyed container. Signed integers are zigzag mapped.
struct KeyDeserializer {
    key: Key,
    path: CodingPath,
}

impl KeyDeserializer {

    fn unsigned(&self) -> Result<u64> {
        self.key.as_int().ok_or(Error::KeyType)
    }

    fn signed(&self) -> Result<i64> {
        self.unsigned().map(varint::zigzag_decode)
    }

}

impl<'de> de::Deserializer<'de> for KeyDeserializer {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.key {
            Key::Int(i) => visitor.visit_u64(i),
            Key::Str(s) => visitor.visit_string(s),
        }
    }

    integer_key! {
        deserialize_i8 => i8, visit_i8, signed;
        deserialize_i16 => i16, visit_i16, signed;
        deserialize_i32 => i32, visit_i32, signed;
        deserialize_i64 => i64, visit_i64, signed;
        deserialize_u8 => u8, visit_u8, unsigned;
        deserialize_u16 => u16, visit_u16, unsigned;
        deserialize_u32 => u32, visit_u32, unsigned;
        deserialize_u64 => u64, visit_u64, unsigned;
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    forward_to_deserialize_any! {
        bool f32 f64 i128 u128 char str string bytes byte_buf option unit unit_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }

}

/// The key of a protobuf map entry. Integer keys are written as 64 bit varints whatever their
/// width, absent keys are zero.
struct EntryKey<'de> {
    source: Option<Source<'de>>,
    path: CodingPath,
}

impl<'de> EntryKey<'de> {

    fn unsigned(&self) -> Result<u64> {
        match &self.source {
            Some(source) => Ok(u64::decode(source.clone())?),
            None => Ok(0),
        }
    }

    fn signed(&self) -> Result<i64> {
        match &self.source {
            Some(source) => Ok(i64::decode(source.clone())?),
            None => Ok(0),
        }
    }

}

impl<'de> de::Deserializer<'de> for EntryKey<'de> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.source {
            Some(source) => Deserializer::new(source).deserialize_any(visitor),
            None => visitor.visit_u64(0),
        }
    }

    integer_key! {
        deserialize_i8 => i8, visit_i8, signed;
        deserialize_i16 => i16, visit_i16, signed;
        deserialize_i32 => i32, visit_i32, signed;
        deserialize_i64 => i64, visit_i64, signed;
        deserialize_u8 => u8, visit_u8, unsigned;
        deserialize_u16 => u16, visit_u16, unsigned;
        deserialize_u32 => u32, visit_u32, unsigned;
        deserialize_u64 => u64, visit_u64, unsigned;
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        match self.source {
            Some(source) => visitor.visit_borrowed_str(source.str()?),
            None => visitor.visit_borrowed_str(""),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    forward_to_deserialize_any! {
        bool f32 f64 i128 u128 char bytes byte_buf option unit unit_struct seq tuple
        tuple_struct map struct enum ignored_any
    }

}

/// The zero value protobuf substitutes for a field which is not on the wire.
struct Absent;

impl<'de> de::Deserializer<'de> for Absent {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_none()
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_bool(false)
    }

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_i8(0)
    }

    fn deserialize_i16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_i16(0)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_i32(0)
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_i64(0)
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_u8(0)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_u16(0)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_u32(0)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_u64(0)
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_f32(0.0)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_f64(0.0)
    }

    fn deserialize_char<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::Message("a char field has no zero value".to_owned()))
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_str("")
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_bytes(&[])
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_none()
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_seq(SeqDeserializer::<_, Error>::new(std::iter::empty::<()>()))
    }

    fn deserialize_tuple<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(self, _name: &'static str, _len: usize, visitor: V) -> Result<V::Value> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_map(MapDeserializer::<_, Error>::new(std::iter::empty::<((), ())>()))
    }

    fn deserialize_struct<V: Visitor<'de>>(self, _name: &'static str, fields: &'static [&'static str], visitor: V) -> Result<V::Value> {
        visitor.visit_map(FieldAccess { keyed: None, fields, pos: 0 })
    }

    fn deserialize_enum<V: Visitor<'de>>(self, _name: &'static str, _variants: &'static [&'static str], visitor: V) -> Result<V::Value> {
        visitor.visit_enum(Absent)
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value> {
        Err(Error::Untyped("an absent identifier"))
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

}

/// An absent enum is its first variant, holding zero values.
impl<'de> EnumAccess<'de> for Absent {
    type Error = Error;
    type Variant = Absent;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self::Variant)> {
        let first: de::value::U32Deserializer<Error> = 0u32.into_deserializer();
        Ok((seed.deserialize(first)?, Absent))
    }
}

impl<'de> VariantAccess<'de> for Absent {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        seed.deserialize(Absent)
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_seq(self, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(self, fields: &'static [&'static str], visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_struct(self, "", fields, visitor)
    }

}
