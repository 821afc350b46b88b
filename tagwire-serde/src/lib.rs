//! Conveniently serialize and deserialize your Rust data structures into the `tagwire` wire format,
//! natively or as Protocol Buffers.
//!
//! # Data model
//!
//! Natively, structs and maps become keyed containers, struct fields are keyed by their name and
//! enums are a keyed container with the variant name as its only key. Sequences and tuples become
//! unkeyed containers and `None` is a nil.
//!
//! Under protobuf, struct fields are numbered by their position starting at 1, fields which hold
//! their zero value are left out and read back as such. Unit variants are written as their index,
//! variants carrying data as a message with the populated variant at field number `index + 1`.
//! Maps are repeated entries holding the key in field 1 and the value in field 2. Protobuf has no
//! wire types for `u8`, `i8`, `u16` and `i16`.
//!
//! Since unkeyed elements carry no wire type, the `deserialize_any` family of types like
//! `serde_json::Value` can only be read from keyed containers.
//!
//! # Examples
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use tagwire::{Decoder, Encoder};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Point<'a> {
//!     x: u32,
//!     y: &'a str,
//! }
//!
//! let point = Point { x: 150, y: "hi" };
//!
//! let bytes = tagwire_serde::to_bytes(&point).unwrap();
//! assert_eq!(bytes, [
//!     0x18,             // key of length 1, string key, wire type VarInt
//!     0x78,             // 'x'
//!     0x96, 0x01,       // 150
//!     0x1a,             // key of length 1, string key, wire type LengthPrefixed
//!     0x79,             // 'y'
//!     0x04,             // length 2, not nil
//!     0x68, 0x69,       // 'hi'
//! ]);
//! assert_eq!(point, tagwire_serde::from_bytes(&bytes).unwrap());
//!
//! let bytes = tagwire_serde::to_bytes_with(&Encoder::protobuf(), &point).unwrap();
//! assert_eq!(bytes, [
//!     0x08,             // field 1, wire type VarInt
//!     0x96, 0x01,       // 150
//!     0x12,             // field 2, wire type LengthPrefixed
//!     0x02,             // length 2
//!     0x68, 0x69,       // 'hi'
//! ]);
//! assert_eq!(point, tagwire_serde::from_bytes_with(&Decoder::protobuf(), &bytes).unwrap());
//! ```

mod de;
mod error;
mod ser;

pub use de::{from_bytes, from_bytes_with, stream_decoder, Deserializer, StreamDecoder};
pub use error::{Error, Result};
pub use ser::{to_bytes, to_bytes_with, to_stream_bytes, to_writer, Serializer};

#[cfg(test)]
mod tests {
    use serde::{Serialize, Deserialize};
    use std::collections::{BTreeMap, HashMap};
    use tagwire::{Decoder, Encoder, EncodeError, Unsupported};
    use super::*;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    enum Enum {
        UnitVariant,
        NewtypeVariant(bool),
        TupleVariant(f32, f32),
        StructVariant{ a: usize, b: usize, c: usize },
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Struct {
        field: u8,
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct UnitStruct;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct NewtypeStruct(String);

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct TupleStruct(char, char, char);

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Test {
        bool: bool,
        i8: i8,
        i16: i16,
        i32: i32,
        i64: i64,
        u8: u8,
        u16: u16,
        u32: u32,
        u64: u64,
        f32: f32,
        f64: f64,
        char: char,
        str: String,
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
        none: Option<u8>,
        some: Option<u8>,
        unit: (),
        unit_struct: UnitStruct,
        newtype_struct: NewtypeStruct,
        tuple_struct: TupleStruct,
        seq: Vec<String>,
        nils: Vec<Option<i32>>,
        tuple: (u16, u16, u16),
        map: HashMap<usize, String>,
        signed_map: BTreeMap<i16, bool>,
        r#struct: Struct,
        unit_variant: Enum,
        newtype_variant: Enum,
        tuple_variant: Enum,
        struct_variant: Enum,
        variants: Vec<Enum>,
    }

    fn native_message() -> Test {
        Test {
            bool: true,
            i8: -1,
            i16: -20,
            i32: -7000,
            i64: i64::MIN,
            u8: 1,
            u16: 20,
            u32: 7000,
            u64: u64::MAX,
            f32: 1337.8472,
            f64: 1337.8472,
            char: 'x',
            str: "Test".to_string(),
            bytes: vec![0x38, 0x6b, 0x65, 0x79, 0x05, 0x00, 0x01, 0xff],
            none: None,
            some: Some(0),
            unit: (),
            unit_struct: UnitStruct,
            newtype_struct: NewtypeStruct("Qapla'".to_string()),
            tuple_struct: TupleStruct('a', 'ß', '❤'),
            seq: vec![
                "Elen".to_string(),
                "síla".to_string(),
                "lúmenn'".to_string(),
                "omentielvo".to_string(),
            ],
            nils: vec![Some(1), None, Some(-3), None],
            tuple: (0, 0, 0),
            map: [
                (1701, "Enterprise".to_string()),
                (74656, "Voyager".to_string())
            ].into_iter().collect(),
            signed_map: [(-1, true), (0, false), (300, true)].into_iter().collect(),
            r#struct: Struct {
                field: 42,
            },
            unit_variant: Enum::UnitVariant,
            newtype_variant: Enum::NewtypeVariant(false),
            tuple_variant: Enum::TupleVariant(1.0, 0.999),
            struct_variant: Enum::StructVariant {
                a: 255,
                b: 0,
                c: 33,
            },
            variants: vec![Enum::UnitVariant, Enum::NewtypeVariant(true)],
        }
    }

    #[test]
    fn roundtrip() {
        let message = native_message();
        let bytes = to_bytes(&message).unwrap();
        assert_eq!(message, from_bytes::<Test>(&bytes).unwrap());
    }

    #[test]
    fn borrowed() {
        #[derive(Serialize, Deserialize, Debug, PartialEq)]
        struct Borrowed<'a> {
            name: &'a str,
            #[serde(with = "serde_bytes")]
            raw: &'a [u8],
        }
        let message = Borrowed { name: "Jessica", raw: &[1, 2, 3] };
        let bytes = to_bytes(&message).unwrap();
        assert_eq!(message, from_bytes::<Borrowed<'_>>(&bytes).unwrap());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        #[derive(Serialize)]
        struct Wide {
            a: u32,
            b: Vec<String>,
            c: Enum,
        }
        #[derive(Deserialize, Debug, PartialEq)]
        struct Narrow {
            a: u32,
        }
        let bytes = to_bytes(&Wide { a: 7, b: vec!["x".to_owned()], c: Enum::UnitVariant }).unwrap();
        assert_eq!(from_bytes::<Narrow>(&bytes).unwrap(), Narrow { a: 7 });
    }

    #[test]
    fn untyped_keyed_values() {
        let bytes = to_bytes(&BTreeMap::from([("a", 3u32), ("b", 4u32)])).unwrap();
        let map: BTreeMap<String, u64> = from_bytes(&bytes).unwrap();
        assert_eq!(map, BTreeMap::from([("a".to_owned(), 3), ("b".to_owned(), 4)]));
    }

    #[test]
    fn invalid_map_key() {
        let map = BTreeMap::from([(vec![1u8], 1u32)]);
        assert!(matches!(to_bytes(&map), Err(Error::KeyType)));
    }

    #[test]
    fn coding_path_in_errors() {
        #[derive(Serialize)]
        struct Outer {
            inner: Inner,
        }
        #[derive(Serialize)]
        struct Inner {
            value: u64,
        }
        #[derive(Deserialize, Debug)]
        struct SmallOuter {
            #[allow(dead_code)]
            inner: SmallInner,
        }
        #[derive(Deserialize, Debug)]
        struct SmallInner {
            #[allow(dead_code)]
            value: u32,
        }
        let bytes = to_bytes(&Outer { inner: Inner { value: u64::MAX } }).unwrap();
        match from_bytes::<SmallOuter>(&bytes) {
            Err(Error::Decode(e)) => assert_eq!(e.path().to_string(), "$.inner.value"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
    enum Colour {
        Red,
        Green,
        Blue,
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    enum Shape {
        Circle(f64),
        Rectangle { width: u32, height: u32 },
        Polygon(Vec<u32>),
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Nested {
        label: String,
        weight: i64,
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Proto {
        id: u32,
        name: String,
        flag: bool,
        ratio: f64,
        scores: Vec<u32>,
        deltas: Vec<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
        colour: Colour,
        palette: Vec<Colour>,
        shape: Shape,
        tags: BTreeMap<String, u32>,
        nested: Nested,
        children: Vec<Nested>,
        #[serde(with = "serde_bytes")]
        blob: Vec<u8>,
    }

    fn proto_message() -> Proto {
        Proto {
            id: 150,
            name: "testing".to_owned(),
            flag: true,
            ratio: 0.25,
            scores: vec![3, 270, 86942],
            deltas: vec![-1, 0, 1],
            comment: Some("hello".to_owned()),
            colour: Colour::Blue,
            palette: vec![Colour::Red, Colour::Green],
            shape: Shape::Rectangle { width: 3, height: 0 },
            tags: BTreeMap::from([("a".to_owned(), 1), ("b".to_owned(), 0)]),
            nested: Nested { label: "inner".to_owned(), weight: -5 },
            children: vec![
                Nested { label: "first".to_owned(), weight: 1 },
                Nested { label: String::new(), weight: 0 },
            ],
            blob: vec![0, 1, 2],
        }
    }

    #[test]
    fn protobuf_roundtrip() {
        let message = proto_message();
        let bytes = to_bytes_with(&Encoder::protobuf(), &message).unwrap();
        assert_eq!(&bytes[..3], [0x08, 0x96, 0x01]);
        assert_eq!(message, from_bytes_with::<Proto>(&Decoder::protobuf(), &bytes).unwrap());
    }

    #[test]
    fn protobuf_zero_values() {
        let message = Proto {
            id: 0,
            name: String::new(),
            flag: false,
            ratio: 0.0,
            scores: vec![],
            deltas: vec![],
            comment: None,
            colour: Colour::Red,
            palette: vec![],
            shape: Shape::Circle(0.0),
            tags: BTreeMap::new(),
            nested: Nested { label: String::new(), weight: 0 },
            children: vec![],
            blob: vec![],
        };
        let bytes = to_bytes_with(&Encoder::protobuf(), &message).unwrap();
        // zero scalars and empty repeated fields are left out, messages and variants are not
        assert_eq!(bytes, [
            0x52, 0x09,                                     // field 10, length 9
            0x09,                                           // variant 1, wire type EightByte
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // 0.0
            0x62, 0x00,                                     // field 12, empty message
        ]);
        assert_eq!(message, from_bytes_with::<Proto>(&Decoder::protobuf(), &bytes).unwrap());
    }

    #[test]
    fn protobuf_absent_fields() {
        #[derive(Serialize)]
        struct Sparse {
            id: u32,
        }
        let bytes = to_bytes_with(&Encoder::protobuf(), &Sparse { id: 4 }).unwrap();
        let message: Proto = from_bytes_with(&Decoder::protobuf(), &bytes).unwrap();
        assert_eq!(message.id, 4);
        assert_eq!(message.name, "");
        assert_eq!(message.comment, None);
        assert_eq!(message.colour, Colour::Red);
        assert_eq!(message.shape, Shape::Circle(0.0));
        assert_eq!(message.nested, Nested { label: String::new(), weight: 0 });
        assert!(message.tags.is_empty());
        assert!(message.children.is_empty());
    }

    #[test]
    fn protobuf_map_entries() {
        #[derive(Serialize, Deserialize, Debug, PartialEq)]
        struct Counts {
            counts: BTreeMap<i32, String>,
        }
        let message = Counts { counts: BTreeMap::from([(-2, "minus two".to_owned()), (7, "seven".to_owned())]) };
        let bytes = to_bytes_with(&Encoder::protobuf(), &message).unwrap();
        // first entry: field 1 holds -2 sign extended to ten bytes
        assert_eq!(&bytes[..4], [0x0a, 0x16, 0x08, 0xfe]);
        assert_eq!(message, from_bytes_with::<Counts>(&Decoder::protobuf(), &bytes).unwrap());
    }

    #[test]
    fn protobuf_data_variant_in_sequence() {
        #[derive(Serialize)]
        struct Shapes {
            shapes: Vec<Shape>,
        }
        let e = to_bytes_with(&Encoder::protobuf(), &Shapes { shapes: vec![Shape::Circle(1.0)] }).unwrap_err();
        assert!(matches!(e, Error::VariantInSequence("Circle")));
    }

    #[test]
    fn protobuf_small_integers() {
        let e = to_bytes_with(&Encoder::protobuf(), &Struct { field: 1 }).unwrap_err();
        match e {
            Error::Encode(e) => assert_eq!(e.kind(), &EncodeError::from(Unsupported::WireType(tagwire::WireType::Byte))),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn stream_roundtrip() {
        let messages = vec![
            Nested { label: "one".to_owned(), weight: 1 },
            Nested { label: "two".to_owned(), weight: -2 },
            Nested { label: "three".to_owned(), weight: 3 },
        ];
        for (encoder, decoder) in [(Encoder::new(), Decoder::new()), (Encoder::protobuf(), Decoder::protobuf())] {
            let bytes = to_stream_bytes(&encoder, &messages).unwrap();
            let mut stream: StreamDecoder<Nested> = stream_decoder(decoder);
            let mut decoded = Vec::new();
            for chunk in bytes.chunks(5) {
                decoded.extend(stream.feed(chunk).unwrap());
            }
            assert_eq!(decoded, messages);
            assert!(stream.finish().is_ok());
        }
    }

    #[test]
    fn writer() {
        let mut out = Vec::new();
        to_writer(&mut out, &Nested { label: "x".to_owned(), weight: 2 }).unwrap();
        assert_eq!(out, to_bytes(&Nested { label: "x".to_owned(), weight: 2 }).unwrap());
    }

}
