use serde::ser::{self, Impossible, Serialize};
use tagwire::{varint, Encode, Encoder, Format, Key, KeyedSink, Primitive, Slot, UnkeyedSink};
use std::io::Write;

use crate::error::{Error, Result};

/// Protobuf enum messages hold their variant as a one-of, whose own key is never written.
const VARIANT: u64 = 0;

/// Serializes a value into one slot of a message.
pub struct Serializer<'a, 'c> {
    slot: &'a mut Slot<'c>,
    element: bool,
}

pub fn to_bytes<T: ?Sized + Serialize>(value: &T) -> Result<Vec<u8>> {
    to_bytes_with(&Encoder::new(), value)
}

pub fn to_bytes_with<T: ?Sized + Serialize>(encoder: &Encoder, value: &T) -> Result<Vec<u8>> {
    encoder.encode_with(|slot: &mut Slot<'_>| value.serialize(Serializer::new(slot)))
}

pub fn to_writer<T: ?Sized + Serialize, W: Write>(mut writer: W, value: &T) -> Result<()> {
    writer.write_all(&to_bytes(value)?)?;
    Ok(())
}

/// Encodes every value as an element of a length delimited stream.
pub fn to_stream_bytes<'a, T, I>(encoder: &Encoder, values: I) -> Result<Vec<u8>>
where
    T: 'a + ?Sized + Serialize,
    I: IntoIterator<Item = &'a T>,
{
    let mut out = Vec::new();
    for value in values {
        encoder.encode_frame_with(|slot: &mut Slot<'_>| value.serialize(Serializer::new(slot)), &mut out)?;
    }
    Ok(out)
}

impl<'a, 'c> Serializer<'a, 'c> {

    pub fn new(slot: &'a mut Slot<'c>) -> Self {
        Serializer { slot, element: false }
    }

    fn element(slot: &'a mut Slot<'c>) -> Self {
        Serializer { slot, element: true }
    }

    fn encode<T: ?Sized + Encode>(self, value: &T) -> Result<()> {
        Ok(value.encode(self.slot)?)
    }

    fn data_variant(&self, variant: &'static str) -> Result<()> {
        if self.element && self.slot.format().is_protobuf() {
            Err(Error::VariantInSequence(variant))
        } else {
            Ok(())
        }
    }

}

/// Writes an enum around the content `f` writes. Native enums are a keyed container with the
/// variant name as their only key, protobuf enums a message holding the variant as a one-of with
/// the field number `index + 1`.
fn write_variant<F>(slot: &mut Slot<'_>, variant: &'static str, index: u32, f: F) -> Result<()>
where
    F: FnOnce(&mut Slot<'_>) -> Result<()>,
{
    let mut outer = slot.begin_keyed()?;
    match outer.format() {
        Format::Native => outer.put_with(variant, f),
        Format::Protobuf => outer.put_one_of_with(VARIANT, |slot: &mut Slot<'_>| -> Result<()> {
            slot.begin_keyed()?.put_with(u64::from(index) + 1, f)
        }),
    }
}

impl<'a, 'c> ser::Serializer for Serializer<'a, 'c> {

    type Ok = ();
    type Error = Error;
    type SerializeSeq = SeqSerializer<'a, 'c>;
    type SerializeTuple = SeqSerializer<'a, 'c>;
    type SerializeTupleStruct = SeqSerializer<'a, 'c>;
    type SerializeTupleVariant = VariantSerializer<'a, 'c>;
    type SerializeMap = MapSerializer<'a, 'c>;
    type SerializeStruct = StructSerializer<'a, 'c>;
    type SerializeStructVariant = VariantSerializer<'a, 'c>;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.encode(&v)
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.encode(&v)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.encode(&v)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.encode(&v)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.encode(&v)
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.encode(&v)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.encode(&v)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.encode(&v)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.encode(&v)
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.encode(&v)
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.encode(&v)
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.encode(&v)
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.encode(v)
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        Ok(self.slot.primitive(Primitive::LengthPrefixed(v.to_vec()))?)
    }

    fn serialize_none(self) -> Result<()> {
        Ok(self.slot.begin_single_value()?.set_nil()?)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<()> {
        let element = self.element;
        self.slot.begin_single_value()?.set_with(|slot: &mut Slot<'_>| value.serialize(Serializer { slot, element }))
    }

    fn serialize_unit(self) -> Result<()> {
        self.encode(&())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(self, _name: &'static str, index: u32, variant: &'static str) -> Result<()> {
        match self.slot.format() {
            Format::Native => write_variant(self.slot, variant, index, |slot: &mut Slot<'_>| Ok(().encode(slot)?)),
            Format::Protobuf => Ok(self.slot.primitive(Primitive::VarInt(u64::from(index)))?),
        }
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(self, _name: &'static str, value: &T) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(self, _name: &'static str, index: u32, variant: &'static str, value: &T) -> Result<()> {
        self.data_variant(variant)?;
        write_variant(self.slot, variant, index, |slot: &mut Slot<'_>| value.serialize(Serializer::new(slot)))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Ok(SeqSerializer { sink: self.slot.begin_unkeyed()? })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<Self::SerializeTupleStruct> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(self, _name: &'static str, index: u32, variant: &'static str, _len: usize) -> Result<Self::SerializeTupleVariant> {
        self.data_variant(variant)?;
        let mut content = self.slot.child(variant);
        content.begin_unkeyed()?;
        Ok(VariantSerializer { slot: self.slot, content, variant, index, field: 0 })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Ok(match self.slot.format() {
            Format::Native   => MapSerializer { sink: MapSink::Native(self.slot.begin_keyed()?), key: None },
            Format::Protobuf => MapSerializer { sink: MapSink::Protobuf(self.slot.begin_unkeyed()?), key: None },
        })
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Ok(StructSerializer { sink: self.slot.begin_keyed()?, field: 0 })
    }

    fn serialize_struct_variant(self, _name: &'static str, index: u32, variant: &'static str, _len: usize) -> Result<Self::SerializeStructVariant> {
        self.data_variant(variant)?;
        let mut content = self.slot.child(variant);
        content.begin_keyed()?;
        Ok(VariantSerializer { slot: self.slot, content, variant, index, field: 0 })
    }

    fn is_human_readable(&self) -> bool {
        false
    }

}

pub struct SeqSerializer<'a, 'c> {
    sink: UnkeyedSink<'a, 'c>,
}

impl<'a, 'c> SeqSerializer<'a, 'c> {
    fn append<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.sink.append_with(|slot: &mut Slot<'_>| value.serialize(Serializer::element(slot)))
    }
}

impl<'a, 'c> ser::SerializeSeq for SeqSerializer<'a, 'c> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.append(value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }

}

impl<'a, 'c> ser::SerializeTuple for SeqSerializer<'a, 'c> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.append(value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

impl<'a, 'c> ser::SerializeTupleStruct for SeqSerializer<'a, 'c> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.append(value)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}

/// Struct fields are keyed by name natively and by their 1-based position under protobuf.
/// Skipped fields still take up their position.
pub struct StructSerializer<'a, 'c> {
    sink: KeyedSink<'a, 'c>,
    field: u64,
}

fn field_key(format: Format, name: &'static str, position: u64) -> Key {
    match format {
        Format::Native   => Key::from(name),
        Format::Protobuf => Key::Int(position),
    }
}

impl<'a, 'c> ser::SerializeStruct for StructSerializer<'a, 'c> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.field += 1;
        let key = field_key(self.sink.format(), key, self.field);
        self.sink.put_with(key, |slot: &mut Slot<'_>| value.serialize(Serializer::new(slot)))
    }

    fn skip_field(&mut self, _key: &'static str) -> Result<()> {
        self.field += 1;
        Ok(())
    }

    fn end(self) -> Result<()> {
        Ok(())
    }

}

/// Tuple and struct variants. Their content is collected in a detached slot and wrapped into the
/// enum container once complete.
pub struct VariantSerializer<'a, 'c> {
    slot: &'a mut Slot<'c>,
    content: Slot<'c>,
    variant: &'static str,
    index: u32,
    field: u64,
}

impl<'a, 'c> VariantSerializer<'a, 'c> {
    fn finish(self) -> Result<()> {
        let content = self.content;
        write_variant(self.slot, self.variant, self.index, |slot: &mut Slot<'_>| Ok(slot.adopt(content)?))
    }
}

impl<'a, 'c> ser::SerializeTupleVariant for VariantSerializer<'a, 'c> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        self.content.resume_unkeyed()?.append_with(|slot: &mut Slot<'_>| value.serialize(Serializer::element(slot)))
    }

    fn end(self) -> Result<()> {
        self.finish()
    }
}

impl<'a, 'c> ser::SerializeStructVariant for VariantSerializer<'a, 'c> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.field += 1;
        let key = field_key(self.content.format(), key, self.field);
        self.content.resume_keyed()?.put_with(key, |slot: &mut Slot<'_>| value.serialize(Serializer::new(slot)))
    }

    fn skip_field(&mut self, _key: &'static str) -> Result<()> {
        self.field += 1;
        Ok(())
    }

    fn end(self) -> Result<()> {
        self.finish()
    }

}

/// Map keys as far as the wire can represent them.
enum MapKey {
    Str(String),
    Unsigned(u64),
    Signed(i64),
}

impl MapKey {

    fn into_key(self) -> Key {
        match self {
            MapKey::Str(s)      => Key::Str(s),
            MapKey::Unsigned(u) => Key::Int(u),
            MapKey::Signed(i)   => Key::Int(varint::zigzag_encode(i)),
        }
    }

    fn encode(&self, slot: &mut Slot<'_>) -> Result<()> {
        match self {
            MapKey::Str(s)      => s.encode(slot)?,
            MapKey::Unsigned(u) => u.encode(slot)?,
            MapKey::Signed(i)   => i.encode(slot)?,
        }
        Ok(())
    }

}

/// Native maps are keyed containers, protobuf maps repeated `{1: key, 2: value}` messages.
pub struct MapSerializer<'a, 'c> {
    sink: MapSink<'a, 'c>,
    key: Option<MapKey>,
}

enum MapSink<'a, 'c> {
    Native(KeyedSink<'a, 'c>),
    Protobuf(UnkeyedSink<'a, 'c>),
}

impl<'a, 'c> ser::SerializeMap for MapSerializer<'a, 'c> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        self.key = Some(key.serialize(KeySerializer)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        let key = self.key.take().ok_or_else(|| Error::Message("map value without a key".to_owned()))?;
        match &mut self.sink {
            MapSink::Native(sink) => {
                sink.put_with(key.into_key(), |slot: &mut Slot<'_>| value.serialize(Serializer::new(slot)))
            },
            MapSink::Protobuf(sink) => {
                sink.append_with(|slot: &mut Slot<'_>| -> Result<()> {
                    let mut entry = slot.begin_keyed()?;
                    entry.put_with(1u64, |slot: &mut Slot<'_>| key.encode(slot))?;
                    entry.put_with(2u64, |slot: &mut Slot<'_>| value.serialize(Serializer::new(slot)))
                })
            },
        }
    }

    fn end(self) -> Result<()> {
        Ok(())
    }

}

/// Turns a serialized map key into a `MapKey`.
struct KeySerializer;

impl ser::Serializer for KeySerializer {

    type Ok = MapKey;
    type Error = Error;
    type SerializeSeq = Impossible<MapKey, Error>;
    type SerializeTuple = Impossible<MapKey, Error>;
    type SerializeTupleStruct = Impossible<MapKey, Error>;
    type SerializeTupleVariant = Impossible<MapKey, Error>;
    type SerializeMap = Impossible<MapKey, Error>;
    type SerializeStruct = Impossible<MapKey, Error>;
    type SerializeStructVariant = Impossible<MapKey, Error>;

    fn serialize_bool(self, _v: bool) -> Result<MapKey> {
        Err(Error::KeyType)
    }

    fn serialize_i8(self, v: i8) -> Result<MapKey> {
        Ok(MapKey::Signed(i64::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<MapKey> {
        Ok(MapKey::Signed(i64::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<MapKey> {
        Ok(MapKey::Signed(i64::from(v)))
    }

    fn serialize_i64(self, v: i64) -> Result<MapKey> {
        Ok(MapKey::Signed(v))
    }

    fn serialize_u8(self, v: u8) -> Result<MapKey> {
        Ok(MapKey::Unsigned(u64::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<MapKey> {
        Ok(MapKey::Unsigned(u64::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<MapKey> {
        Ok(MapKey::Unsigned(u64::from(v)))
    }

    fn serialize_u64(self, v: u64) -> Result<MapKey> {
        Ok(MapKey::Unsigned(v))
    }

    fn serialize_f32(self, _v: f32) -> Result<MapKey> {
        Err(Error::KeyType)
    }

    fn serialize_f64(self, _v: f64) -> Result<MapKey> {
        Err(Error::KeyType)
    }

    fn serialize_char(self, v: char) -> Result<MapKey> {
        Ok(MapKey::Str(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<MapKey> {
        Ok(MapKey::Str(v.to_owned()))
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<MapKey> {
        Err(Error::KeyType)
    }

    fn serialize_none(self) -> Result<MapKey> {
        Err(Error::KeyType)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, _value: &T) -> Result<MapKey> {
        Err(Error::KeyType)
    }

    fn serialize_unit(self) -> Result<MapKey> {
        Err(Error::KeyType)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<MapKey> {
        Err(Error::KeyType)
    }

    fn serialize_unit_variant(self, _name: &'static str, _index: u32, variant: &'static str) -> Result<MapKey> {
        Ok(MapKey::Str(variant.to_owned()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(self, _name: &'static str, value: &T) -> Result<MapKey> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(self, _name: &'static str, _index: u32, _variant: &'static str, _value: &T) -> Result<MapKey> {
        Err(Error::KeyType)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(Error::KeyType)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(Error::KeyType)
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeTupleStruct> {
        Err(Error::KeyType)
    }

    fn serialize_tuple_variant(self, _name: &'static str, _index: u32, _variant: &'static str, _len: usize) -> Result<Self::SerializeTupleVariant> {
        Err(Error::KeyType)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(Error::KeyType)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(Error::KeyType)
    }

    fn serialize_struct_variant(self, _name: &'static str, _index: u32, _variant: &'static str, _len: usize) -> Result<Self::SerializeStructVariant> {
        Err(Error::KeyType)
    }

}
