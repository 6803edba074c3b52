//! The narrowest-form encoder (spec §4.3, C3).

use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};

use crate::error::EncodeError;
use crate::tags;
use crate::value::Value;

/// Encodes `value` onto `sink`, returning the number of bytes written.
///
/// Integers and container/raw lengths always take the narrowest wire form
/// that fits (spec §4.3): the encoder never emits a wider form than the
/// value requires.
pub fn encode<W: Write>(sink: &mut W, value: &Value) -> Result<usize, EncodeError> {
    match value {
        Value::Nil => {
            sink.write_u8(tags::NIL)?;
            Ok(1)
        }
        Value::Bool(b) => {
            sink.write_u8(if *b { tags::TRUE } else { tags::FALSE })?;
            Ok(1)
        }
        Value::UInt(u) => encode_uint(sink, *u),
        Value::Int(i) => encode_int(sink, *i),
        Value::Float32(f) => {
            sink.write_u8(tags::FLOAT32)?;
            sink.write_f32::<BigEndian>(*f)?;
            Ok(5)
        }
        Value::Float64(f) => {
            sink.write_u8(tags::FLOAT64)?;
            sink.write_f64::<BigEndian>(*f)?;
            Ok(9)
        }
        Value::Raw(bytes) => {
            let mut n = write_len_header(
                sink,
                bytes.len(),
                tags::FIX_RAW_MIN,
                32,
                tags::RAW16,
                tags::RAW32,
            )?;
            sink.write_all(bytes)?;
            n += bytes.len();
            Ok(n)
        }
        Value::Array(items) => {
            let mut n = write_len_header(
                sink,
                items.len(),
                tags::FIX_ARRAY_MIN,
                tags::FIX_CONTAINER_LIMIT,
                tags::ARRAY16,
                tags::ARRAY32,
            )?;
            for item in items {
                n += encode(sink, item)?;
            }
            Ok(n)
        }
        Value::Map(entries) => {
            let mut n = write_len_header(
                sink,
                entries.len(),
                tags::FIX_MAP_MIN,
                tags::FIX_CONTAINER_LIMIT,
                tags::MAP16,
                tags::MAP32,
            )?;
            for (k, v) in entries {
                n += encode(sink, k)?;
                n += encode(sink, v)?;
            }
            Ok(n)
        }
    }
}

/// Smallest wire form for an unsigned integer: fix-int, then uint8/16/32/64.
fn encode_uint<W: Write>(sink: &mut W, u: u64) -> Result<usize, EncodeError> {
    if u <= tags::POSITIVE_FIX_MAX as u64 {
        sink.write_u8(u as u8)?;
        Ok(1)
    } else if u <= u8::MAX as u64 {
        sink.write_u8(tags::UINT8)?;
        sink.write_u8(u as u8)?;
        Ok(2)
    } else if u <= u16::MAX as u64 {
        sink.write_u8(tags::UINT16)?;
        sink.write_u16::<BigEndian>(u as u16)?;
        Ok(3)
    } else if u <= u32::MAX as u64 {
        sink.write_u8(tags::UINT32)?;
        sink.write_u32::<BigEndian>(u as u32)?;
        Ok(5)
    } else {
        sink.write_u8(tags::UINT64)?;
        sink.write_u64::<BigEndian>(u)?;
        Ok(9)
    }
}

/// Smallest wire form for a signed integer: fix-int (positive or negative),
/// then int8/16/32/64.
fn encode_int<W: Write>(sink: &mut W, i: i64) -> Result<usize, EncodeError> {
    if (0..=tags::POSITIVE_FIX_MAX as i64).contains(&i) || (-32..0).contains(&i) {
        // Two's complement: the low byte of `i` already equals the fix-int
        // prefix for both halves of this range.
        sink.write_u8(i as u8)?;
        Ok(1)
    } else if i >= i8::MIN as i64 && i <= i8::MAX as i64 {
        sink.write_u8(tags::INT8)?;
        sink.write_i8(i as i8)?;
        Ok(2)
    } else if i >= i16::MIN as i64 && i <= i16::MAX as i64 {
        sink.write_u8(tags::INT16)?;
        sink.write_i16::<BigEndian>(i as i16)?;
        Ok(3)
    } else if i >= i32::MIN as i64 && i <= i32::MAX as i64 {
        sink.write_u8(tags::INT32)?;
        sink.write_i32::<BigEndian>(i as i32)?;
        Ok(5)
    } else {
        sink.write_u8(tags::INT64)?;
        sink.write_i64::<BigEndian>(i)?;
        Ok(9)
    }
}

/// Shared length-bucket cascade for raw/array/map (spec §4.3): fix form
/// below `fix_limit`, a 16-bit header below 2^16, a 32-bit header below
/// 2^32, and `LengthOverflow` beyond that.
fn write_len_header<W: Write>(
    sink: &mut W,
    len: usize,
    fix_min: u8,
    fix_limit: u64,
    short: u8,
    long: u8,
) -> Result<usize, EncodeError> {
    let len_u64 = len as u64;
    if len_u64 >= tags::MAX_LENGTH {
        return Err(EncodeError::LengthOverflow { len: len_u64 });
    }
    if len_u64 < fix_limit {
        sink.write_u8(fix_min | len as u8)?;
        Ok(1)
    } else if len_u64 < tags::SHORT_LENGTH_LIMIT {
        sink.write_u8(short)?;
        sink.write_u16::<BigEndian>(len as u16)?;
        Ok(3)
    } else {
        sink.write_u8(long)?;
        sink.write_u32::<BigEndian>(len as u32)?;
        Ok(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        let n = encode(&mut buf, value).unwrap();
        assert_eq!(n, buf.len());
        buf
    }

    #[test]
    fn nil_and_bools() {
        assert_eq!(enc(&Value::Nil), vec![0xc0]);
        assert_eq!(enc(&Value::Bool(false)), vec![0xc2]);
        assert_eq!(enc(&Value::Bool(true)), vec![0xc3]);
    }

    #[test]
    fn positive_fixint_boundaries() {
        assert_eq!(enc(&Value::UInt(0)), vec![0x00]);
        assert_eq!(enc(&Value::UInt(127)), vec![0x7f]);
        assert_eq!(enc(&Value::UInt(128)), vec![0xcc, 0x80]);
        assert_eq!(enc(&Value::UInt(256)), vec![0xcd, 0x01, 0x00]);
    }

    #[test]
    fn negative_fixint_boundaries() {
        assert_eq!(enc(&Value::Int(-1)), vec![0xff]);
        assert_eq!(enc(&Value::Int(-32)), vec![0xe0]);
        assert_eq!(enc(&Value::Int(-33)), vec![0xd0, 0xdf]);
    }

    #[test]
    fn uint_narrows_through_every_width() {
        assert_eq!(enc(&Value::UInt(u8::MAX as u64)).len(), 2);
        assert_eq!(enc(&Value::UInt(u16::MAX as u64)).len(), 3);
        assert_eq!(enc(&Value::UInt(u32::MAX as u64)).len(), 5);
        assert_eq!(enc(&Value::UInt(u64::MAX)).len(), 9);
    }

    #[test]
    fn small_array_uses_fix_form() {
        let v = Value::Array(vec![Value::UInt(1), Value::UInt(2), Value::UInt(3)]);
        assert_eq!(enc(&v), vec![0x93, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn small_map_uses_fix_form() {
        let v = Value::Map(vec![(Value::from("k"), Value::UInt(1))]);
        assert_eq!(enc(&v), vec![0x81, 0xa1, 0x6b, 0x01]);
    }

    #[test]
    fn array_length_bucket_boundaries() {
        let fifteen = Value::Array(vec![Value::Nil; 15]);
        let sixteen = Value::Array(vec![Value::Nil; 16]);
        let buf15 = enc(&fifteen);
        let buf16 = enc(&sixteen);
        assert_eq!(buf15[0], 0x9f);
        assert_eq!(buf16[0], tags::ARRAY16);
        assert_eq!(&buf16[1..3], &[0x00, 0x10]);
    }

    #[test]
    fn array_switches_to_32_bit_header_at_65536() {
        let v = Value::Array(vec![Value::Nil; 1 << 16]);
        let buf = enc(&v);
        assert_eq!(buf[0], tags::ARRAY32);
        assert_eq!(&buf[1..5], &[0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn raw_uses_32_item_fix_limit_not_16() {
        let v = Value::Raw(vec![0u8; 20]);
        let buf = enc(&v);
        assert_eq!(buf[0], tags::FIX_RAW_MIN | 20);
    }

    #[test]
    fn length_at_or_above_2_32_is_rejected() {
        let mut buf = Vec::new();
        let err = write_len_header(
            &mut buf,
            tags::MAX_LENGTH as usize,
            tags::FIX_RAW_MIN,
            32,
            tags::RAW16,
            tags::RAW32,
        )
        .unwrap_err();
        assert!(matches!(err, EncodeError::LengthOverflow { .. }));
    }
}
