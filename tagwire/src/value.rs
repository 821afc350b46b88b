//! The atom of a message is the `EncodedValue`.
//!
//! An encode pass builds a tree of `EncodedValue`s root to leaf and serializes it right away. Leaf
//! scalars are already reduced to their bytes, so the tree knows nothing about the Rust types it
//! came from. Keyed and unkeyed containers are written as length prefixed payloads, which means a
//! writer has to know the size of a subtree before it can write the subtree's prefix; the tree
//! exists to give it that knowledge.

use crate::key::Key;
use crate::varint;
use crate::wire::{self, Format, WireType};

/// A scalar reduced to its bytes. The variant determines the wire type, so a fixed-width payload
/// always has the size its wire type demands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Primitive {
    VarInt(u64),
    Byte(u8),
    TwoByte([u8; 2]),
    FourByte([u8; 4]),
    EightByte([u8; 8]),
    LengthPrefixed(Vec<u8>),
}

impl Primitive {

    pub fn wire_type(&self) -> WireType {
        match *self {
            Primitive::VarInt(_)         => WireType::VarInt,
            Primitive::Byte(_)           => WireType::Byte,
            Primitive::TwoByte(_)        => WireType::TwoByte,
            Primitive::FourByte(_)       => WireType::FourByte,
            Primitive::EightByte(_)      => WireType::EightByte,
            Primitive::LengthPrefixed(_) => WireType::LengthPrefixed,
        }
    }

    /// True for the values protobuf leaves out of a message.
    pub fn is_zero(&self) -> bool {
        match self {
            Primitive::VarInt(v)         => *v == 0,
            Primitive::Byte(v)           => *v == 0,
            Primitive::TwoByte(v)        => v.iter().all(|b| *b == 0),
            Primitive::FourByte(v)       => v.iter().all(|b| *b == 0),
            Primitive::EightByte(v)      => v.iter().all(|b| *b == 0),
            Primitive::LengthPrefixed(v) => v.is_empty(),
        }
    }

    /// Writes the payload without any length prefix.
    fn write_raw(&self, format: Format, out: &mut Vec<u8>) {
        match self {
            Primitive::VarInt(v)         => { varint::encode_for(format, *v, out); },
            Primitive::Byte(v)           => out.push(*v),
            Primitive::TwoByte(v)        => out.extend_from_slice(v),
            Primitive::FourByte(v)       => out.extend_from_slice(v),
            Primitive::EightByte(v)      => out.extend_from_slice(v),
            Primitive::LengthPrefixed(v) => out.extend_from_slice(v),
        }
    }

}

/// Entries of a keyed container in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Keyed {
    pub entries: Vec<(Key, EncodedValue)>,
    /// A one-of is flattened into its parent message by the protobuf writer
    pub one_of: bool,
}

impl Keyed {

    fn ordered(&self, sort: bool) -> Vec<&(Key, EncodedValue)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        if sort {
            entries.sort_by(|a, b| a.0.cmp(&b.0));
        }
        entries
    }

    /// Number of entries which are not nil.
    pub fn populated(&self) -> usize {
        self.entries.iter().filter(|(_, v)| !v.is_nil()).count()
    }

}

/// Elements of an unkeyed container. `items` only holds the present elements, `nil_indices`
/// the ascending positions of nil elements within the whole sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Unkeyed {
    pub items: Vec<EncodedValue>,
    pub nil_indices: Vec<usize>,
}

impl Unkeyed {

    pub fn len(&self) -> usize {
        self.items.len() + self.nil_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedValue {
    Primitive(Primitive),
    Keyed(Keyed),
    Unkeyed(Unkeyed),
    Nil,
}

impl EncodedValue {

    pub fn wire_type(&self) -> WireType {
        match self {
            EncodedValue::Primitive(p) => p.wire_type(),
            _                          => WireType::LengthPrefixed,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, EncodedValue::Nil)
    }

    /// Returns the mnemonic of the node. This is useful for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            EncodedValue::Primitive(_) => "Primitive",
            EncodedValue::Keyed(_)     => "Keyed",
            EncodedValue::Unkeyed(_)   => "Unkeyed",
            EncodedValue::Nil          => "Nil",
        }
    }

    /// Writes the payload of this node without a length prefix. Under protobuf only keyed nodes
    /// and primitives have a payload of their own.
    pub fn write(&self, format: Format, sort: bool, out: &mut Vec<u8>) {
        match format {
            Format::Native   => self.write_native(sort, out),
            Format::Protobuf => self.write_protobuf(sort, out),
        }
    }

    fn write_native(&self, sort: bool, out: &mut Vec<u8>) {
        match self {
            EncodedValue::Primitive(p) => p.write_raw(Format::Native, out),
            EncodedValue::Keyed(k) => {
                for (key, value) in k.ordered(sort) {
                    if value.is_nil() {
                        continue;
                    }
                    wire::write_tag(Format::Native, key, value.wire_type(), out);
                    value.write_native_framed(sort, out);
                }
            },
            EncodedValue::Unkeyed(u) => {
                varint::encode(u.nil_indices.len() as u64, out);
                for i in u.nil_indices.iter() {
                    varint::encode(*i as u64, out);
                }
                for item in u.items.iter() {
                    item.write_native_framed(sort, out);
                }
            },
            EncodedValue::Nil => {},
        }
    }

    /// Writes this node as a field payload: fixed and varint payloads raw, everything else behind
    /// its length data.
    fn write_native_framed(&self, sort: bool, out: &mut Vec<u8>) {
        match self {
            EncodedValue::Primitive(Primitive::LengthPrefixed(bytes)) => {
                wire::write_length(Format::Native, bytes.len(), false, out);
                out.extend_from_slice(bytes);
            },
            EncodedValue::Primitive(p) => p.write_raw(Format::Native, out),
            EncodedValue::Nil => wire::write_length(Format::Native, 0, true, out),
            composite => {
                let mut payload = Vec::new();
                composite.write_native(sort, &mut payload);
                wire::write_length(Format::Native, payload.len(), false, out);
                out.extend_from_slice(&payload);
            },
        }
    }

    fn write_protobuf(&self, sort: bool, out: &mut Vec<u8>) {
        match self {
            EncodedValue::Primitive(p) => p.write_raw(Format::Protobuf, out),
            EncodedValue::Keyed(k) => {
                for (key, value) in k.ordered(sort) {
                    write_protobuf_field(key, value, true, sort, out);
                }
            },
            EncodedValue::Unkeyed(_) | EncodedValue::Nil => {},
        }
    }

    fn write_protobuf_framed(&self, sort: bool, out: &mut Vec<u8>) {
        match self {
            EncodedValue::Primitive(Primitive::LengthPrefixed(bytes)) => {
                wire::write_length(Format::Protobuf, bytes.len(), false, out);
                out.extend_from_slice(bytes);
            },
            EncodedValue::Primitive(p) => p.write_raw(Format::Protobuf, out),
            other => {
                let mut payload = Vec::new();
                other.write_protobuf(sort, &mut payload);
                wire::write_length(Format::Protobuf, payload.len(), false, out);
                out.extend_from_slice(&payload);
            },
        }
    }

}

/// Writes one message field. Zero values are left out if `elide` is set, one-of containers
/// contribute their populated case as a field of their own.
fn write_protobuf_field(key: &Key, value: &EncodedValue, elide: bool, sort: bool, out: &mut Vec<u8>) {
    match value {
        EncodedValue::Nil => {},
        EncodedValue::Primitive(p) if elide && p.is_zero() => {},
        EncodedValue::Keyed(k) if k.one_of => {
            for (case, value) in k.ordered(sort) {
                write_protobuf_field(case, value, false, sort, out);
            }
        },
        EncodedValue::Unkeyed(u) => match u.items.first().map(EncodedValue::wire_type) {
            None => {},
            Some(WireType::LengthPrefixed) => {
                for item in u.items.iter() {
                    wire::write_tag(Format::Protobuf, key, WireType::LengthPrefixed, out);
                    item.write_protobuf_framed(sort, out);
                }
            },
            Some(_) => {
                let mut packed = Vec::new();
                for item in u.items.iter() {
                    item.write_protobuf(sort, &mut packed);
                }
                wire::write_tag(Format::Protobuf, key, WireType::LengthPrefixed, out);
                wire::write_length(Format::Protobuf, packed.len(), false, out);
                out.extend_from_slice(&packed);
            },
        },
        other => {
            wire::write_tag(Format::Protobuf, key, other.wire_type(), out);
            other.write_protobuf_framed(sort, out);
        },
    }
}

/// Writes a complete message. `optional_depth` counts the single value containers the root was
/// wrapped in, each of which contributes a presence byte.
pub(crate) fn write_root(format: Format, sort: bool, value: &EncodedValue, optional_depth: usize, out: &mut Vec<u8>) {
    match value {
        EncodedValue::Nil => {
            out.extend(std::iter::repeat(0x00).take(optional_depth.saturating_sub(1)));
            wire::write_length(format, 0, true, out);
        },
        present => {
            out.extend(std::iter::repeat(0x00).take(optional_depth));
            present.write(format, sort, out);
        },
    }
}

/// Writes a message as one element of a stream: its length data followed by the message. A nil
/// optional root is the bare nil length data.
pub(crate) fn write_frame(format: Format, sort: bool, value: &EncodedValue, optional_depth: usize, out: &mut Vec<u8>) {
    if format == Format::Native && value.is_nil() && optional_depth <= 1 {
        wire::write_length(format, 0, true, out);
        return;
    }
    let mut root = Vec::new();
    write_root(format, sort, value, optional_depth, &mut root);
    wire::write_length(format, root.len(), false, out);
    out.extend_from_slice(&root);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed(entries: Vec<(Key, EncodedValue)>) -> EncodedValue {
        EncodedValue::Keyed(Keyed { entries, one_of: false })
    }

    fn varint(v: u64) -> EncodedValue {
        EncodedValue::Primitive(Primitive::VarInt(v))
    }

    fn string(s: &str) -> EncodedValue {
        EncodedValue::Primitive(Primitive::LengthPrefixed(s.as_bytes().to_vec()))
    }

    fn native(value: &EncodedValue) -> Vec<u8> {
        let mut buf = Vec::new();
        write_root(Format::Native, false, value, 0, &mut buf);
        buf
    }

    fn protobuf(value: &EncodedValue) -> Vec<u8> {
        let mut buf = Vec::new();
        write_root(Format::Protobuf, false, value, 0, &mut buf);
        buf
    }

    #[test]
    fn native_keyed() {
        let value = keyed(vec![
            (Key::from("a"), varint(1)),
            (Key::from("b"), EncodedValue::Nil),
            (Key::Int(2), string("xy")),
        ]);
        assert_eq!(native(&value), [
            0x18, b'a', // string key of length 1, VarInt
            0x01,       // 1
            0x22,       // integer key 2, LengthPrefixed
            0x04,       // length 2
            b'x', b'y',
        ]);
    }

    #[test]
    fn native_nested() {
        let inner = keyed(vec![(Key::Int(1), EncodedValue::Primitive(Primitive::Byte(7)))]);
        let value = keyed(vec![(Key::Int(3), inner)]);
        assert_eq!(native(&value), [0x32, 0x04, 0x16, 0x07]);
    }

    #[test]
    fn native_unkeyed() {
        let value = EncodedValue::Unkeyed(Unkeyed {
            items: vec![EncodedValue::Primitive(Primitive::TwoByte([0xd2, 0x04])), string("a")],
            nil_indices: vec![1],
        });
        assert_eq!(native(&value), [
            0x01,             // one nil index
            0x01,             // at position 1
            0xd2, 0x04,       // element 0
            0x02, b'a',       // element 2
        ]);
    }

    #[test]
    fn native_root_nil() {
        assert_eq!(native(&EncodedValue::Nil), [0x01]);
        let mut buf = Vec::new();
        write_root(Format::Native, false, &EncodedValue::Primitive(Primitive::Byte(1)), 1, &mut buf);
        assert_eq!(buf, [0x00, 0x01]);
        buf.clear();
        write_root(Format::Native, false, &EncodedValue::Nil, 2, &mut buf);
        assert_eq!(buf, [0x00, 0x01]);
    }

    #[test]
    fn sorted_keys() {
        let value = keyed(vec![(Key::from("b"), varint(2)), (Key::from("a"), varint(1)), (Key::Int(9), varint(0))]);
        let mut sorted = Vec::new();
        write_root(Format::Native, true, &value, 0, &mut sorted);
        assert_eq!(sorted, [0x90, 0x01, 0x00, 0x18, b'a', 0x01, 0x18, b'b', 0x02]);
    }

    #[test]
    fn protobuf_elision() {
        let value = keyed(vec![
            (Key::Int(1), varint(0)),
            (Key::Int(2), string("")),
            (Key::Int(3), varint(150)),
            (Key::Int(4), keyed(vec![])),
        ]);
        assert_eq!(protobuf(&value), [0x18, 0x96, 0x01, 0x22, 0x00]);
    }

    #[test]
    fn protobuf_packed() {
        let value = keyed(vec![
            (Key::Int(4), EncodedValue::Unkeyed(Unkeyed { items: vec![varint(3), varint(270), varint(0)], nil_indices: vec![] })),
            (Key::Int(5), EncodedValue::Unkeyed(Unkeyed { items: vec![string("a"), string("")], nil_indices: vec![] })),
            (Key::Int(6), EncodedValue::Unkeyed(Unkeyed::default())),
        ]);
        assert_eq!(protobuf(&value), [
            0x22, 0x04, 0x03, 0x8e, 0x02, 0x00, // packed varints
            0x2a, 0x01, b'a',                   // one field per string
            0x2a, 0x00,
        ]);
    }

    #[test]
    fn protobuf_one_of() {
        let case = EncodedValue::Keyed(Keyed { entries: vec![(Key::Int(2), varint(0)), (Key::Int(3), EncodedValue::Nil)], one_of: true });
        let value = keyed(vec![(Key::Int(1), varint(1)), (Key::Int(7), case)]);
        assert_eq!(protobuf(&value), [0x08, 0x01, 0x10, 0x00]);
    }

    #[test]
    fn frames() {
        let mut buf = Vec::new();
        write_frame(Format::Native, false, &EncodedValue::Nil, 1, &mut buf);
        assert_eq!(buf, [0x01]);
        buf.clear();
        write_frame(Format::Native, false, &varint(5), 0, &mut buf);
        assert_eq!(buf, [0x02, 0x05]);
        buf.clear();
        write_frame(Format::Protobuf, false, &keyed(vec![(Key::Int(1), varint(5))]), 0, &mut buf);
        assert_eq!(buf, [0x02, 0x08, 0x05]);
    }

}
