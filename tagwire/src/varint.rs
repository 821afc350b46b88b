//! Base-128 variable length integers and the zigzag mapping of signed integers.
//!
//! Every byte carries seven data bits, least significant group first, and sets its most significant
//! bit if more bytes follow. The two formats differ only in how they finish a 64 bit value:
//!
//! * the native varint stops after eight 7-bit groups and stores the remaining eight bits in a
//!   ninth byte without a continuation flag, so no value needs more than nine bytes and no byte
//!   sequence can overflow.
//! * the protobuf varint keeps going for up to ten bytes. The tenth byte can only hold bit 63,
//!   anything else in it is out of range.

use crate::error::{Corruption, DecodeError};
use crate::wire::Format;

pub const MAX_NATIVE_LEN: usize = 9;
pub const MAX_PROTOBUF_LEN: usize = 10;

const CONTINUE: u8 = 0x80;
const DATA: u8 = 0x7f;

/// Appends `value` as a native varint and returns the number of written bytes.
pub fn encode(mut value: u64, out: &mut Vec<u8>) -> usize {
    for i in 0..MAX_NATIVE_LEN - 1 {
        if value <= DATA as u64 {
            out.push(value as u8);
            return i + 1;
        }
        out.push(value as u8 | CONTINUE);
        value >>= 7;
    }
    out.push(value as u8);
    MAX_NATIVE_LEN
}

/// Appends `value` as a protobuf varint and returns the number of written bytes.
pub fn encode_protobuf(mut value: u64, out: &mut Vec<u8>) -> usize {
    let mut c = 1;
    while value > DATA as u64 {
        out.push(value as u8 | CONTINUE);
        value >>= 7;
        c += 1;
    }
    out.push(value as u8);
    c
}

/// Returns the decoded value and the number of consumed bytes.
pub fn decode(buf: &[u8]) -> Result<(u64, usize), DecodeError> {
    let mut value = 0u64;
    for i in 0..MAX_NATIVE_LEN - 1 {
        let byte = *buf.get(i).ok_or(DecodeError::InsufficientData)?;
        value |= u64::from(byte & DATA) << (7 * i);
        if byte & CONTINUE == 0 {
            return Ok((value, i + 1));
        }
    }
    let last = *buf.get(MAX_NATIVE_LEN - 1).ok_or(DecodeError::InsufficientData)?;
    Ok((value | u64::from(last) << 56, MAX_NATIVE_LEN))
}

/// Returns the decoded value and the number of consumed bytes.
pub fn decode_protobuf(buf: &[u8]) -> Result<(u64, usize), DecodeError> {
    let mut value = 0u64;
    for i in 0..MAX_PROTOBUF_LEN - 1 {
        let byte = *buf.get(i).ok_or(DecodeError::InsufficientData)?;
        value |= u64::from(byte & DATA) << (7 * i);
        if byte & CONTINUE == 0 {
            return Ok((value, i + 1));
        }
    }
    match *buf.get(MAX_PROTOBUF_LEN - 1).ok_or(DecodeError::InsufficientData)? {
        0 => Ok((value, MAX_PROTOBUF_LEN)),
        1 => Ok((value | 1 << 63, MAX_PROTOBUF_LEN)),
        _ => Err(Corruption::IntegerOutOfRange.into()),
    }
}

pub fn encode_for(format: Format, value: u64, out: &mut Vec<u8>) -> usize {
    match format {
        Format::Native => encode(value, out),
        Format::Protobuf => encode_protobuf(value, out),
    }
}

pub fn decode_for(format: Format, buf: &[u8]) -> Result<(u64, usize), DecodeError> {
    match format {
        Format::Native => decode(buf),
        Format::Protobuf => decode_protobuf(buf),
    }
}

/// Number of bytes `encode_for` would write.
pub fn encoded_len(format: Format, value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    let len = if bits == 0 { 1 } else { (bits + 6) / 7 };
    match format {
        Format::Native => len.min(MAX_NATIVE_LEN),
        Format::Protobuf => len,
    }
}

/// Maps signed to unsigned integers so that values of small magnitude stay small: 0, -1, 1, -2
/// become 0, 1, 2, 3.
#[inline]
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[inline]
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Corruption, DecodeError};
    use proptest::prelude::*;

    #[test]
    fn golden_vectors() {
        let mut buf = Vec::new();
        encode(12345, &mut buf);
        assert_eq!(buf, [0xb9, 0x60]);
        buf.clear();
        encode(i64::MIN as u64, &mut buf);
        assert_eq!(buf, [0x80; 9]);
        buf.clear();
        encode_protobuf(i64::MIN as u64, &mut buf);
        assert_eq!(buf, [0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x01]);
    }

    #[test]
    fn small_values_take_one_byte() {
        let mut buf = Vec::new();
        for i in 0..0x80 {
            buf.clear();
            assert_eq!(1, encode(i, &mut buf));
            assert_eq!(buf, [i as u8]);
        }
        buf.clear();
        assert_eq!(2, encode(0x80, &mut buf));
        assert_eq!(buf, [0x80, 0x01]);
    }

    #[test]
    fn maximum_lengths() {
        let mut buf = Vec::new();
        assert_eq!(MAX_NATIVE_LEN, encode(u64::MAX, &mut buf));
        assert_eq!(buf, [0xff; 9]);
        buf.clear();
        assert_eq!(MAX_PROTOBUF_LEN, encode_protobuf(u64::MAX, &mut buf));
    }

    #[test]
    fn insufficient_data() {
        assert_eq!(decode(&[]), Err(DecodeError::InsufficientData));
        assert_eq!(decode(&[0x80, 0x80]), Err(DecodeError::InsufficientData));
        assert_eq!(decode(&[0xff; 8]), Err(DecodeError::InsufficientData));
        assert_eq!(decode_protobuf(&[0xff; 9]), Err(DecodeError::InsufficientData));
    }

    #[test]
    fn ninth_native_byte_uses_all_bits() {
        let mut buf = vec![0xff; 8];
        buf.push(0xff);
        buf.push(0x42);
        assert_eq!(decode(&buf), Ok((u64::MAX, 9)));
    }

    #[test]
    fn protobuf_overflow() {
        let mut buf = vec![0xff; 9];
        buf.push(0x01);
        assert_eq!(decode_protobuf(&buf), Ok((u64::MAX, 10)));
        buf[9] = 0x02;
        assert_eq!(decode_protobuf(&buf), Err(DecodeError::Corrupted(Corruption::IntegerOutOfRange)));
        buf[9] = 0x81;
        assert_eq!(decode_protobuf(&buf), Err(DecodeError::Corrupted(Corruption::IntegerOutOfRange)));
    }

    #[test]
    fn zigzag() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(i64::MAX), u64::MAX - 1);
        assert_eq!(zigzag_encode(i64::MIN), u64::MAX);
    }

    proptest! {

        #[test]
        fn native_roundtrip(x: u64) {
            let mut buf = Vec::new();
            let c = encode(x, &mut buf);
            prop_assert!(c <= MAX_NATIVE_LEN);
            prop_assert_eq!(c, buf.len());
            prop_assert_eq!(c, encoded_len(Format::Native, x));
            prop_assert_eq!(decode(&buf), Ok((x, c)));
        }

        #[test]
        fn protobuf_roundtrip(x: u64) {
            let mut buf = Vec::new();
            let c = encode_protobuf(x, &mut buf);
            prop_assert!(c <= MAX_PROTOBUF_LEN);
            prop_assert_eq!(c, encoded_len(Format::Protobuf, x));
            prop_assert_eq!(decode_protobuf(&buf), Ok((x, c)));
        }

        #[test]
        fn zigzag_roundtrip(x: i64) {
            prop_assert_eq!(zigzag_decode(zigzag_encode(x)), x);
        }

        #[test]
        fn zigzag_is_compact(x in -64i64..64) {
            let mut buf = Vec::new();
            prop_assert_eq!(1, encode(zigzag_encode(x), &mut buf));
        }

        #[test]
        fn trailing_input_is_not_consumed(x: u64, tail: Vec<u8>) {
            let mut buf = Vec::new();
            let c = encode(x, &mut buf);
            buf.extend_from_slice(&tail);
            prop_assert_eq!(decode(&buf), Ok((x, c)));
        }

    }

}
