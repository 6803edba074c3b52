//! The streaming recursive-descent decoder (spec §4.4, C4).

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::DecodeError;
use crate::tags;
use crate::value::Value;

/// Decode-time behavior switches (spec §4.4 point 3, §9).
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// When `true` (the default), a zero-length raw payload decodes to
    /// `Value::Nil` instead of `Value::Raw(vec![])`, matching the original
    /// implementation's historical behavior. Set to `false` for a decoder
    /// that round-trips an empty raw value faithfully.
    pub empty_raw_as_nil: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            empty_raw_as_nil: true,
        }
    }
}

/// Decodes one value from `source` using the default [`DecodeOptions`].
/// Returns the value and the exact number of bytes consumed.
pub fn decode<R: Read>(source: &mut R) -> Result<(Value, usize), DecodeError> {
    decode_with(source, &DecodeOptions::default())
}

/// Decodes one value from `source`, returning the value and the exact
/// number of bytes consumed. Recurses into container elements; a short read
/// or unknown prefix at any depth surfaces immediately with the total bytes
/// consumed so far (spec §4.4).
pub fn decode_with<R: Read>(
    source: &mut R,
    opts: &DecodeOptions,
) -> Result<(Value, usize), DecodeError> {
    let mut consumed = 0usize;
    let value = decode_value(source, &mut consumed, opts)?;
    Ok((value, consumed))
}

fn decode_value<R: Read>(
    source: &mut R,
    consumed: &mut usize,
    opts: &DecodeOptions,
) -> Result<Value, DecodeError> {
    let prefix = read_u8(source, consumed)?;

    if prefix <= tags::POSITIVE_FIX_MAX {
        return Ok(Value::UInt(prefix as u64));
    }
    if prefix >= tags::NEGATIVE_FIX_MIN {
        let v = (prefix & tags::NEGATIVE_FIX_MASK) as i64 - tags::NEGATIVE_FIX_OFFSET;
        return Ok(Value::Int(v));
    }
    if (tags::FIX_RAW_MIN..=tags::FIX_RAW_MAX).contains(&prefix) {
        let len = (prefix & tags::FIX_RAW_COUNT_MASK) as usize;
        return decode_raw(source, consumed, len, opts);
    }
    if (tags::FIX_ARRAY_MIN..=tags::FIX_ARRAY_MAX).contains(&prefix) {
        let len = (prefix & tags::FIX_ARRAY_COUNT_MASK) as usize;
        return decode_array(source, consumed, len, opts);
    }
    if (tags::FIX_MAP_MIN..=tags::FIX_MAP_MAX).contains(&prefix) {
        let len = (prefix & tags::FIX_MAP_COUNT_MASK) as usize;
        return decode_map(source, consumed, len, opts);
    }

    match prefix {
        tags::NIL => Ok(Value::Nil),
        tags::FALSE => Ok(Value::Bool(false)),
        tags::TRUE => Ok(Value::Bool(true)),
        tags::FLOAT32 => Ok(Value::Float32(read_f32(source, consumed)?)),
        tags::FLOAT64 => Ok(Value::Float64(read_f64(source, consumed)?)),
        tags::UINT8 => Ok(Value::UInt(read_u8(source, consumed)? as u64)),
        tags::UINT16 => Ok(Value::UInt(read_u16(source, consumed)? as u64)),
        tags::UINT32 => Ok(Value::UInt(read_u32(source, consumed)? as u64)),
        tags::UINT64 => Ok(Value::UInt(read_u64(source, consumed)?)),
        tags::INT8 => Ok(Value::Int(read_i8(source, consumed)? as i64)),
        tags::INT16 => Ok(Value::Int(read_i16(source, consumed)? as i64)),
        tags::INT32 => Ok(Value::Int(read_i32(source, consumed)? as i64)),
        tags::INT64 => Ok(Value::Int(read_i64(source, consumed)?)),
        tags::RAW16 => {
            let len = read_u16(source, consumed)? as usize;
            decode_raw(source, consumed, len, opts)
        }
        tags::RAW32 => {
            let len = read_u32(source, consumed)? as usize;
            decode_raw(source, consumed, len, opts)
        }
        tags::ARRAY16 => {
            let len = read_u16(source, consumed)? as usize;
            decode_array(source, consumed, len, opts)
        }
        tags::ARRAY32 => {
            let len = read_u32(source, consumed)? as usize;
            decode_array(source, consumed, len, opts)
        }
        tags::MAP16 => {
            let len = read_u16(source, consumed)? as usize;
            decode_map(source, consumed, len, opts)
        }
        tags::MAP32 => {
            let len = read_u32(source, consumed)? as usize;
            decode_map(source, consumed, len, opts)
        }
        other => Err(DecodeError::UnknownPrefix {
            prefix: other,
            consumed: *consumed,
        }),
    }
}

fn decode_raw<R: Read>(
    source: &mut R,
    consumed: &mut usize,
    len: usize,
    opts: &DecodeOptions,
) -> Result<Value, DecodeError> {
    if len == 0 {
        return Ok(if opts.empty_raw_as_nil {
            Value::Nil
        } else {
            Value::Raw(Vec::new())
        });
    }
    let mut buf = vec![0u8; len];
    source
        .read_exact(&mut buf)
        .map_err(|e| DecodeError::ShortRead {
            consumed: *consumed,
            cause: e,
        })?;
    *consumed += len;
    Ok(Value::Raw(buf))
}

fn decode_array<R: Read>(
    source: &mut R,
    consumed: &mut usize,
    len: usize,
    opts: &DecodeOptions,
) -> Result<Value, DecodeError> {
    let mut items = Vec::new();
    for _ in 0..len {
        items.push(decode_value(source, consumed, opts)?);
    }
    Ok(Value::Array(items))
}

fn decode_map<R: Read>(
    source: &mut R,
    consumed: &mut usize,
    len: usize,
    opts: &DecodeOptions,
) -> Result<Value, DecodeError> {
    let mut entries: Vec<(Value, Value)> = Vec::new();
    for _ in 0..len {
        let key = decode_value(source, consumed, opts)?;
        let val = decode_value(source, consumed, opts)?;
        Value::map_insert(&mut entries, key, val);
    }
    Ok(Value::Map(entries))
}

macro_rules! read_fixed {
    ($name:ident, $ty:ty, $read:ident, $size:expr) => {
        fn $name<R: Read>(source: &mut R, consumed: &mut usize) -> Result<$ty, DecodeError> {
            let v = source
                .$read::<BigEndian>()
                .map_err(|e| DecodeError::ShortRead {
                    consumed: *consumed,
                    cause: e,
                })?;
            *consumed += $size;
            Ok(v)
        }
    };
}

read_fixed!(read_u16, u16, read_u16, 2);
read_fixed!(read_u32, u32, read_u32, 4);
read_fixed!(read_u64, u64, read_u64, 8);
read_fixed!(read_i16, i16, read_i16, 2);
read_fixed!(read_i32, i32, read_i32, 4);
read_fixed!(read_i64, i64, read_i64, 8);
read_fixed!(read_f32, f32, read_f32, 4);
read_fixed!(read_f64, f64, read_f64, 8);

fn read_u8<R: Read>(source: &mut R, consumed: &mut usize) -> Result<u8, DecodeError> {
    let v = source.read_u8().map_err(|e| DecodeError::ShortRead {
        consumed: *consumed,
        cause: e,
    })?;
    *consumed += 1;
    Ok(v)
}

fn read_i8<R: Read>(source: &mut R, consumed: &mut usize) -> Result<i8, DecodeError> {
    let v = source.read_i8().map_err(|e| DecodeError::ShortRead {
        consumed: *consumed,
        cause: e,
    })?;
    *consumed += 1;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode;

    fn round_trip(value: &Value) -> (Value, usize) {
        let mut buf = Vec::new();
        let written = encode(&mut buf, value).unwrap();
        let (decoded, consumed) = decode(&mut &buf[..]).unwrap();
        assert_eq!(written, consumed);
        (decoded, consumed)
    }

    #[test]
    fn scalars_round_trip() {
        assert_eq!(round_trip(&Value::Nil).0, Value::Nil);
        assert_eq!(round_trip(&Value::Bool(true)).0, Value::Bool(true));
        assert_eq!(round_trip(&Value::UInt(300)).0, Value::UInt(300));
        assert_eq!(round_trip(&Value::Int(-300)).0, Value::Int(-300));
        assert_eq!(round_trip(&Value::Float64(1.5)).0, Value::Float64(1.5));
    }

    #[test]
    fn empty_raw_decodes_to_nil_by_default() {
        let mut buf = Vec::new();
        encode(&mut buf, &Value::Raw(Vec::new())).unwrap();
        let (v, _) = decode(&mut &buf[..]).unwrap();
        assert_eq!(v, Value::Nil);
    }

    #[test]
    fn empty_raw_can_be_preserved_via_options() {
        let mut buf = Vec::new();
        encode(&mut buf, &Value::Raw(Vec::new())).unwrap();
        let opts = DecodeOptions {
            empty_raw_as_nil: false,
        };
        let (v, _) = decode_with(&mut &buf[..], &opts).unwrap();
        assert_eq!(v, Value::Raw(Vec::new()));
    }

    #[test]
    fn array16_advances_its_2_byte_length_field() {
        let v = Value::Array(vec![Value::UInt(0); 16]);
        let mut buf = Vec::new();
        let written = encode(&mut buf, &v).unwrap();
        let (_, consumed) = decode(&mut &buf[..]).unwrap();
        assert_eq!(consumed, written);
        assert_eq!(buf[0], tags::ARRAY16);
    }

    #[test]
    fn array32_advances_its_4_byte_length_field() {
        let v = Value::Array(vec![Value::UInt(0); 1 << 16]);
        let mut buf = Vec::new();
        let written = encode(&mut buf, &v).unwrap();
        let (_, consumed) = decode(&mut &buf[..]).unwrap();
        assert_eq!(consumed, written);
        assert_eq!(buf[0], tags::ARRAY32);
    }

    #[test]
    fn map_decode_applies_last_write_wins_on_duplicate_keys() {
        let mut buf = vec![0x82u8]; // fix-map, 2 entries
        encode(&mut buf, &Value::from("k")).unwrap();
        encode(&mut buf, &Value::UInt(1)).unwrap();
        encode(&mut buf, &Value::from("k")).unwrap();
        encode(&mut buf, &Value::UInt(2)).unwrap();
        let (v, consumed) = decode(&mut &buf[..]).unwrap();
        assert_eq!(consumed, buf.len());
        let map = v.as_map().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[0].1, Value::UInt(2));
    }

    #[test]
    fn unknown_prefix_consumes_exactly_one_byte() {
        let buf = [0xc1u8];
        let err = decode(&mut &buf[..]).unwrap_err();
        match err {
            DecodeError::UnknownPrefix { prefix, consumed } => {
                assert_eq!(prefix, 0xc1);
                assert_eq!(consumed, 1);
            }
            other => panic!("expected UnknownPrefix, got {:?}", other),
        }
    }

    #[test]
    fn short_read_reports_bytes_consumed_so_far() {
        // fix-array of 2, first element present, second cut off mid-header.
        let buf = [0x92u8, 0x01, tags::UINT16];
        let err = decode(&mut &buf[..]).unwrap_err();
        match err {
            DecodeError::ShortRead { consumed, .. } => assert_eq!(consumed, 3),
            other => panic!("expected ShortRead, got {:?}", other),
        }
    }

    #[test]
    fn nested_containers_round_trip() {
        let v = Value::Array(vec![
            Value::Map(vec![(Value::from("a"), Value::Array(vec![Value::UInt(1)]))]),
            Value::Nil,
        ]);
        let (decoded, _) = round_trip(&v);
        assert_eq!(decoded, v);
    }
}
