//! Renders messages as a tree of raw fields, without knowing their schema.

use std::convert::TryFrom;
use std::fmt::Write;
use tagwire::{wire, varint, CodingPath, Corruption, DecodeError, DecoderError, Format, Key, WireType};

const INDENT: usize = 2;

struct RawField<'a> {
    key: Key,
    wire: WireType,
    bytes: &'a [u8],
    nil: bool,
}

/// Splits `bytes` into fields. Fails unless the fields take up every byte.
fn fields<'a>(format: Format, mut bytes: &'a [u8], path: &CodingPath) -> Result<Vec<RawField<'a>>, DecoderError> {
    let mut fields = Vec::new();
    while !bytes.is_empty() {
        let (key, wire, c) = wire::read_tag(format, bytes).map_err(|e| e.at(path))?;
        let payload = wire::read_payload(format, wire, &bytes[c..]).map_err(|e| e.at(&path.child(key.clone())))?;
        fields.push(RawField { key, wire, bytes: payload.bytes, nil: payload.nil });
        bytes = &bytes[c + payload.consumed..];
    }
    Ok(fields)
}

/// Renders every field of the message in `bytes` on a line of its own.
pub fn message(format: Format, bytes: &[u8]) -> Result<String, DecoderError> {
    let mut out = String::new();
    write_message(format, bytes, &CodingPath::root(), 0, &mut out)?;
    Ok(out)
}

fn write_message(format: Format, bytes: &[u8], path: &CodingPath, depth: usize, out: &mut String) -> Result<(), DecoderError> {
    for field in fields(format, bytes, path)? {
        let path = path.child(field.key.clone());
        let _ = write!(out, "{:indent$}{} {}: ", "", field.key, field.wire.name(), indent = depth * INDENT);
        write_value(format, &field, &path, depth, out)?;
        out.push('\n');
    }
    Ok(())
}

fn write_value(format: Format, field: &RawField<'_>, path: &CodingPath, depth: usize, out: &mut String) -> Result<(), DecoderError> {
    let bytes = field.bytes;
    match field.wire {
        WireType::VarInt => {
            let (v, _) = varint::decode_for(format, bytes).map_err(|e| e.at(path))?;
            if format.is_protobuf() && v > i64::MAX as u64 {
                let _ = write!(out, "{} ({})", v, v as i64);
            } else {
                let _ = write!(out, "{}", v);
            }
        },
        WireType::Byte => {
            let _ = write!(out, "{}", bytes[0]);
        },
        WireType::TwoByte => {
            let _ = write!(out, "{}", u16::from_le_bytes(array(bytes, path)?));
        },
        WireType::FourByte => {
            let raw = array(bytes, path)?;
            let v = match format {
                Format::Native   => f32::from_be_bytes(raw),
                Format::Protobuf => f32::from_le_bytes(raw),
            };
            let _ = write!(out, "{} (0x{})", v, hex(bytes));
        },
        WireType::EightByte => {
            let raw = array(bytes, path)?;
            let v = match format {
                Format::Native   => f64::from_be_bytes(raw),
                Format::Protobuf => f64::from_le_bytes(raw),
            };
            let _ = write!(out, "{} (0x{})", v, hex(bytes));
        },
        WireType::LengthPrefixed => write_length_prefixed(format, field, path, depth, out),
    }
    Ok(())
}

/// Text wins over nested messages, since short strings often happen to parse as fields too.
fn write_length_prefixed(format: Format, field: &RawField<'_>, path: &CodingPath, depth: usize, out: &mut String) {
    if field.nil {
        out.push_str("nil");
        return;
    }
    if let Some(text) = std::str::from_utf8(field.bytes).ok().filter(|s| is_text(s)) {
        let _ = write!(out, "{:?}", text);
        return;
    }
    let mut nested = String::new();
    match write_message(format, field.bytes, path, depth + 1, &mut nested) {
        Ok(()) => {
            let _ = write!(out, "{{\n{}{:indent$}}}", nested, "", indent = depth * INDENT);
        },
        Err(_) => {
            let _ = write!(out, "base64:{}", base64::encode(field.bytes));
        },
    }
}

fn is_text(s: &str) -> bool {
    s.chars().all(|c| !c.is_control() || c == '\n' || c == '\t')
}

fn array<const N: usize>(bytes: &[u8], path: &CodingPath) -> Result<[u8; N], DecoderError> {
    <[u8; N]>::try_from(bytes)
        .map_err(|_| DecodeError::from(Corruption::InvalidDataSize { expected: N, actual: bytes.len() }).at(path))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{:02x}", b);
        s
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagwire::{Encoder, Slot};

    #[test]
    fn native_fields() {
        let bytes = Encoder::new().encode_with(|slot: &mut Slot<'_>| {
            let mut keyed = slot.begin_keyed()?;
            keyed.put("id", &150u32)?;
            keyed.put("name", "Jessica")?;
            keyed.put_nil("none")?;
            keyed.put(3, &-1.5f64)?;
            keyed.put_with("inner", |slot: &mut Slot<'_>| slot.begin_keyed()?.put(1, &7u8))
        }).unwrap();
        assert_eq!(message(Format::Native, &bytes).unwrap(), concat!(
            "\"id\" VarInt: 150\n",
            "\"name\" LengthPrefixed: \"Jessica\"\n",
            "\"none\" LengthPrefixed: nil\n",
            "3 EightByte: -1.5 (0xbff8000000000000)\n",
            "\"inner\" LengthPrefixed: {\n",
            "  1 Byte: 7\n",
            "}\n",
        ));
    }

    #[test]
    fn protobuf_fields() {
        let bytes = Encoder::protobuf().encode_with(|slot: &mut Slot<'_>| {
            let mut keyed = slot.begin_keyed()?;
            keyed.put(1, &-2i64)?;
            keyed.put(2, &tagwire::Bytes(vec![0x00, 0xff]))?;
            keyed.put(3, &1.0f32)
        }).unwrap();
        assert_eq!(message(Format::Protobuf, &bytes).unwrap(), concat!(
            "1 VarInt: 18446744073709551614 (-2)\n",
            "2 LengthPrefixed: base64:AP8=\n",
            "3 FourByte: 1 (0x0000803f)\n",
        ));
    }

    #[test]
    fn truncated_message() {
        let e = message(Format::Protobuf, &[0x08, 0x96]).unwrap_err();
        assert_eq!(e.kind(), &DecodeError::InsufficientData);
        assert_eq!(e.path().to_string(), "$[1]");
    }

}
