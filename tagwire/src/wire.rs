//! Every field starts with a tag, a single varint which mixes the key of the field with the
//! `WireType` of its payload. The wire type occupies the lowest three bits and tells a reader how
//! many bytes follow, so that fields can be skipped without knowing their meaning.
//!
//! Native tags look like `(key << 4) | (is_string << 3) | wire_type`. For integer keys `key` is the
//! key itself, for string keys it is the byte length of the key whose UTF-8 bytes follow the tag
//! immediately. Protobuf tags are `(field_number << 3) | wire_type`.
//!
//! Length prefixed payloads are preceded by their length. The native format folds a nil flag
//! into the lowest bit (`(length << 1) | nil`), protobuf uses the plain length.

use crate::error::{Corruption, DecodeError, EncodeError, Unsupported};
use crate::key::Key;
use crate::varint;
use std::convert::TryFrom;
use std::fmt::{self, Display, Formatter};

/// The two variants of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// Self-describing, supports nil, string keys and small fixed-width integers
    #[default]
    Native,
    /// The subset which is wire-compatible with Protocol Buffers
    Protobuf,
}

impl Format {

    pub fn is_protobuf(&self) -> bool {
        *self == Format::Protobuf
    }

}

/// The layout class of a payload.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    VarInt = 0,
    EightByte = 1,
    LengthPrefixed = 2,
    FourByte = 5,
    Byte = 6,
    TwoByte = 7,
}

const WIRE_MASK: u64 = 0b111;
const STRING_KEY: u64 = 0b1000;

/// Integer keys have to leave room for the string flag and the wire type.
pub const MAX_NATIVE_KEY: u64 = (1 << 60) - 1;
pub const MAX_FIELD_NUMBER: u64 = (1 << 29) - 1;

impl WireType {

    pub fn bits(&self) -> u8 {
        *self as u8
    }

    pub fn from_bits(bits: u8) -> Result<Self, Corruption> {
        match bits {
            x if x == WireType::VarInt as u8         => Ok(WireType::VarInt),
            x if x == WireType::EightByte as u8      => Ok(WireType::EightByte),
            x if x == WireType::LengthPrefixed as u8 => Ok(WireType::LengthPrefixed),
            x if x == WireType::FourByte as u8       => Ok(WireType::FourByte),
            x if x == WireType::Byte as u8           => Ok(WireType::Byte),
            x if x == WireType::TwoByte as u8        => Ok(WireType::TwoByte),
            x => Err(Corruption::InvalidWireType(x)),
        }
    }

    /// Returns the mnemonic of the wire type. This is useful for error messages.
    pub fn name(&self) -> &'static str {
        match *self {
            WireType::VarInt         => "VarInt",
            WireType::EightByte      => "EightByte",
            WireType::LengthPrefixed => "LengthPrefixed",
            WireType::FourByte       => "FourByte",
            WireType::Byte           => "Byte",
            WireType::TwoByte        => "TwoByte",
        }
    }

    /// The payload size of fixed-width wire types.
    pub fn fixed_size(&self) -> Option<usize> {
        match *self {
            WireType::Byte      => Some(1),
            WireType::TwoByte   => Some(2),
            WireType::FourByte  => Some(4),
            WireType::EightByte => Some(8),
            WireType::VarInt | WireType::LengthPrefixed => None,
        }
    }

    pub fn is_protobuf(&self) -> bool {
        !matches!(*self, WireType::Byte | WireType::TwoByte)
    }

    /// Fails if `format` has no representation for this wire type.
    pub fn check(&self, format: Format) -> Result<(), Unsupported> {
        if format.is_protobuf() && !self.is_protobuf() {
            Err(Unsupported::WireType(*self))
        } else {
            Ok(())
        }
    }

}

impl Display for WireType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fails if `key` can not be written in a tag of `format`.
pub fn check_key(format: Format, key: &Key) -> Result<(), EncodeError> {
    match (format, key) {
        (Format::Native, Key::Int(i)) if *i > MAX_NATIVE_KEY           => Err(EncodeError::InvalidKey(key.clone())),
        (Format::Native, Key::Str(s)) if s.len() as u64 > MAX_NATIVE_KEY => Err(EncodeError::Length(s.len())),
        (Format::Native, _)                                            => Ok(()),
        (Format::Protobuf, Key::Int(i)) if (1..=MAX_FIELD_NUMBER).contains(i) => Ok(()),
        (Format::Protobuf, _) => Err(Unsupported::FieldNumber(key.clone()).into()),
    }
}

/// Writes the tag and, for native string keys, the key bytes. `key` must have passed `check_key`.
pub fn write_tag(format: Format, key: &Key, wire: WireType, out: &mut Vec<u8>) {
    let wire = u64::from(wire.bits());
    match (format, key) {
        (Format::Native, Key::Int(i)) => {
            varint::encode(*i << 4 | wire, out);
        },
        (Format::Native, Key::Str(s)) => {
            varint::encode((s.len() as u64) << 4 | STRING_KEY | wire, out);
            out.extend_from_slice(s.as_bytes());
        },
        (Format::Protobuf, Key::Int(i)) => {
            varint::encode_protobuf(*i << 3 | wire, out);
        },
        (Format::Protobuf, Key::Str(_)) => {},
    }
}

/// Returns the key and wire type of a tag and the number of consumed bytes.
pub fn read_tag(format: Format, buf: &[u8]) -> Result<(Key, WireType, usize), DecodeError> {
    let (tag, c) = varint::decode_for(format, buf)?;
    let wire = WireType::from_bits((tag & WIRE_MASK) as u8)?;
    match format {
        Format::Native if tag & STRING_KEY == 0 => Ok((Key::Int(tag >> 4), wire, c)),
        Format::Native => {
            let len = to_usize(tag >> 4)?;
            let bytes = buf[c..].get(..len).ok_or(DecodeError::InsufficientData)?;
            let key = std::str::from_utf8(bytes).map_err(Corruption::from)?;
            Ok((Key::Str(key.to_owned()), wire, c + len))
        },
        Format::Protobuf => {
            if !wire.is_protobuf() {
                return Err(Corruption::InvalidWireType(wire.bits()).into());
            }
            let field = tag >> 3;
            if field == 0 || field > MAX_FIELD_NUMBER {
                return Err(DecodeError::from(Corruption::FieldNumber(field)));
            }
            Ok((Key::Int(field), wire, c))
        },
    }
}

/// Writes the length of a length prefixed payload.
pub fn write_length(format: Format, len: usize, nil: bool, out: &mut Vec<u8>) {
    match format {
        Format::Native   => varint::encode((len as u64) << 1 | nil as u64, out),
        Format::Protobuf => varint::encode_protobuf(len as u64, out),
    };
}

/// Fails if `len` does not fit the length field of `format`.
pub fn check_length(format: Format, len: usize) -> Result<(), EncodeError> {
    match format {
        Format::Native if len as u64 > u64::MAX >> 1 => Err(EncodeError::Length(len)),
        _ => Ok(()),
    }
}

/// Returns the length, the nil flag and the number of consumed bytes.
pub fn read_length(format: Format, buf: &[u8]) -> Result<(usize, bool, usize), DecodeError> {
    let (v, c) = varint::decode_for(format, buf)?;
    match format {
        Format::Native => {
            let nil = v & 1 == 1;
            let len = v >> 1;
            if nil && len != 0 {
                return Err(DecodeError::from(Corruption::NilWithPayload(len)));
            }
            Ok((to_usize(len)?, nil, c))
        },
        Format::Protobuf => Ok((to_usize(v)?, false, c)),
    }
}

/// A payload located by `read_payload`: the bytes belonging to the value and the nil flag of
/// a native length prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload<'a> {
    pub bytes: &'a [u8],
    pub nil: bool,
    /// Bytes consumed from the input, including any length prefix
    pub consumed: usize,
}

/// Locates the payload of a value of type `wire` at the start of `buf`. Varint payloads include
/// the varint bytes themselves, length prefixed payloads exclude the prefix.
pub fn read_payload(format: Format, wire: WireType, buf: &[u8]) -> Result<Payload<'_>, DecodeError> {
    match wire {
        WireType::VarInt => {
            let (_, c) = varint::decode_for(format, buf)?;
            Ok(Payload { bytes: &buf[..c], nil: false, consumed: c })
        },
        WireType::LengthPrefixed => {
            let (len, nil, c) = read_length(format, buf)?;
            let bytes = buf[c..].get(..len).ok_or(DecodeError::InsufficientData)?;
            Ok(Payload { bytes, nil, consumed: c + len })
        },
        fixed => {
            let size = fixed.fixed_size().unwrap_or_default();
            let bytes = buf.get(..size).ok_or(DecodeError::InsufficientData)?;
            Ok(Payload { bytes, nil: false, consumed: size })
        },
    }
}

#[inline]
pub(crate) fn to_usize(value: u64) -> Result<usize, Corruption> {
    usize::try_from(value).map_err(|_| Corruption::Length(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_bits() {
        for bits in 0..8 {
            match WireType::from_bits(bits) {
                Ok(wire) => assert_eq!(bits, wire.bits()),
                Err(e)   => {
                    assert!(bits == 3 || bits == 4);
                    assert_eq!(e, Corruption::InvalidWireType(bits));
                },
            }
        }
    }

    #[test]
    fn native_int_tag() {
        let mut buf = Vec::new();
        write_tag(Format::Native, &Key::Int(1), WireType::Byte, &mut buf);
        assert_eq!(buf, [0x16]);
        assert_eq!(read_tag(Format::Native, &buf), Ok((Key::Int(1), WireType::Byte, 1)));
    }

    #[test]
    fn native_string_tag() {
        let mut buf = Vec::new();
        write_tag(Format::Native, &Key::from("id"), WireType::VarInt, &mut buf);
        assert_eq!(buf, [0x28, b'i', b'd']);
        assert_eq!(read_tag(Format::Native, &buf), Ok((Key::from("id"), WireType::VarInt, 3)));
        assert_eq!(read_tag(Format::Native, &buf[..2]), Err(DecodeError::InsufficientData));
    }

    #[test]
    fn protobuf_tag() {
        let mut buf = Vec::new();
        write_tag(Format::Protobuf, &Key::Int(2), WireType::LengthPrefixed, &mut buf);
        assert_eq!(buf, [0x12]);
        assert_eq!(read_tag(Format::Protobuf, &buf), Ok((Key::Int(2), WireType::LengthPrefixed, 1)));
        assert_eq!(read_tag(Format::Protobuf, &[0x02]), Err(DecodeError::from(Corruption::FieldNumber(0))));
        assert_eq!(read_tag(Format::Protobuf, &[0x0e]), Err(DecodeError::from(Corruption::InvalidWireType(6))));
        assert_eq!(read_tag(Format::Native, &[0x0b]), Err(DecodeError::from(Corruption::InvalidWireType(3))));
    }

    #[test]
    fn key_checks() {
        assert!(check_key(Format::Native, &Key::Int(MAX_NATIVE_KEY)).is_ok());
        assert_eq!(check_key(Format::Native, &Key::Int(1 << 60)), Err(EncodeError::InvalidKey(Key::Int(1 << 60))));
        assert!(check_key(Format::Protobuf, &Key::Int(1)).is_ok());
        assert!(check_key(Format::Protobuf, &Key::Int(MAX_FIELD_NUMBER)).is_ok());
        for key in [Key::Int(0), Key::Int(MAX_FIELD_NUMBER + 1), Key::from("a")] {
            assert_eq!(check_key(Format::Protobuf, &key), Err(EncodeError::from(Unsupported::FieldNumber(key.clone()))));
        }
        assert_eq!(WireType::TwoByte.check(Format::Protobuf), Err(Unsupported::WireType(WireType::TwoByte)));
        assert_eq!(WireType::TwoByte.check(Format::Native), Ok(()));
    }

    #[test]
    fn length_data() {
        let mut buf = Vec::new();
        write_length(Format::Native, 3, false, &mut buf);
        write_length(Format::Native, 0, true, &mut buf);
        assert_eq!(buf, [0x06, 0x01]);
        assert_eq!(read_length(Format::Native, &buf), Ok((3, false, 1)));
        assert_eq!(read_length(Format::Native, &buf[1..]), Ok((0, true, 1)));
        assert_eq!(read_length(Format::Native, &[0x07]), Err(DecodeError::from(Corruption::NilWithPayload(3))));
        assert_eq!(read_length(Format::Protobuf, &[0x07]), Ok((7, false, 1)));
    }

    #[test]
    fn payloads() {
        let buf = [0x06, b'a', b'b', b'c', 0xff];
        let p = read_payload(Format::Native, WireType::LengthPrefixed, &buf).unwrap();
        assert_eq!(p, Payload { bytes: b"abc", nil: false, consumed: 4 });
        let p = read_payload(Format::Native, WireType::VarInt, &[0xb9, 0x60, 0x01]).unwrap();
        assert_eq!(p.bytes, [0xb9, 0x60]);
        let p = read_payload(Format::Protobuf, WireType::FourByte, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(p.bytes, [1, 2, 3, 4]);
        assert_eq!(read_payload(Format::Native, WireType::EightByte, &[0; 7]), Err(DecodeError::InsufficientData));
        assert_eq!(read_payload(Format::Native, WireType::LengthPrefixed, &[0x08, 0]), Err(DecodeError::InsufficientData));
    }

}
