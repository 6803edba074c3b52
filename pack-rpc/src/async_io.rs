//! Async mirror of `pack_core::decode` over `tokio::io::AsyncRead` (spec.md
//! SPEC_FULL §2: the server/client read frames off a socket without
//! blocking a whole OS thread per connection).
//!
//! This follows the same recursive-descent dispatch as
//! `pack_core::decode::decode_value`; see that module for the prefix-range
//! table (spec §3.2, §4.4). Encoding does not need an async mirror: a value
//! is encoded synchronously into an in-memory `Vec<u8>` via
//! `pack_core::encode` (it never blocks), and the resulting buffer is
//! written to the socket with one `AsyncWriteExt::write_all` call.

use std::future::Future;
use std::io;
use std::pin::Pin;

use pack_core::tags;
use pack_core::{DecodeError, DecodeOptions, Value};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Decodes one value from an async source, returning the value and the
/// exact number of bytes consumed (spec §4.4's byte-accounting contract,
/// carried over to the async reader).
pub async fn decode_async<R: AsyncRead + Unpin>(
    source: &mut R,
    opts: &DecodeOptions,
) -> Result<(Value, usize), DecodeError> {
    let mut consumed = 0usize;
    let value = decode_value(source, &mut consumed, opts).await?;
    Ok((value, consumed))
}

/// Boxed so the `decode_value` <-> `decode_array`/`decode_map` cycle has a
/// finite future size; the recursion depth is the container nesting depth
/// of the value on the wire, same as the sync decoder's call stack.
fn decode_value<'a, R: AsyncRead + Unpin + Send>(
    source: &'a mut R,
    consumed: &'a mut usize,
    opts: &'a DecodeOptions,
) -> Pin<Box<dyn Future<Output = Result<Value, DecodeError>> + Send + 'a>> {
    Box::pin(async move {
        let prefix = read_u8(source, consumed).await?;

        if prefix <= tags::POSITIVE_FIX_MAX {
            return Ok(Value::UInt(prefix as u64));
        }
        if prefix >= tags::NEGATIVE_FIX_MIN {
            let v = (prefix & tags::NEGATIVE_FIX_MASK) as i64 - tags::NEGATIVE_FIX_OFFSET;
            return Ok(Value::Int(v));
        }
        if (tags::FIX_RAW_MIN..=tags::FIX_RAW_MAX).contains(&prefix) {
            let len = (prefix & tags::FIX_RAW_COUNT_MASK) as usize;
            return decode_raw(source, consumed, len, opts).await;
        }
        if (tags::FIX_ARRAY_MIN..=tags::FIX_ARRAY_MAX).contains(&prefix) {
            let len = (prefix & tags::FIX_ARRAY_COUNT_MASK) as usize;
            return decode_array(source, consumed, len, opts).await;
        }
        if (tags::FIX_MAP_MIN..=tags::FIX_MAP_MAX).contains(&prefix) {
            let len = (prefix & tags::FIX_MAP_COUNT_MASK) as usize;
            return decode_map(source, consumed, len, opts).await;
        }

        match prefix {
            tags::NIL => Ok(Value::Nil),
            tags::FALSE => Ok(Value::Bool(false)),
            tags::TRUE => Ok(Value::Bool(true)),
            tags::FLOAT32 => Ok(Value::Float32(f32::from_bits(
                read_u32(source, consumed).await?,
            ))),
            tags::FLOAT64 => Ok(Value::Float64(f64::from_bits(
                read_u64(source, consumed).await?,
            ))),
            tags::UINT8 => Ok(Value::UInt(read_u8(source, consumed).await? as u64)),
            tags::UINT16 => Ok(Value::UInt(read_u16(source, consumed).await? as u64)),
            tags::UINT32 => Ok(Value::UInt(read_u32(source, consumed).await? as u64)),
            tags::UINT64 => Ok(Value::UInt(read_u64(source, consumed).await?)),
            tags::INT8 => Ok(Value::Int(read_u8(source, consumed).await? as i8 as i64)),
            tags::INT16 => Ok(Value::Int(read_u16(source, consumed).await? as i16 as i64)),
            tags::INT32 => Ok(Value::Int(read_u32(source, consumed).await? as i32 as i64)),
            tags::INT64 => Ok(Value::Int(read_u64(source, consumed).await? as i64)),
            tags::RAW16 => {
                let len = read_u16(source, consumed).await? as usize;
                decode_raw(source, consumed, len, opts).await
            }
            tags::RAW32 => {
                let len = read_u32(source, consumed).await? as usize;
                decode_raw(source, consumed, len, opts).await
            }
            tags::ARRAY16 => {
                let len = read_u16(source, consumed).await? as usize;
                decode_array(source, consumed, len, opts).await
            }
            tags::ARRAY32 => {
                let len = read_u32(source, consumed).await? as usize;
                decode_array(source, consumed, len, opts).await
            }
            tags::MAP16 => {
                let len = read_u16(source, consumed).await? as usize;
                decode_map(source, consumed, len, opts).await
            }
            tags::MAP32 => {
                let len = read_u32(source, consumed).await? as usize;
                decode_map(source, consumed, len, opts).await
            }
            other => Err(DecodeError::UnknownPrefix {
                prefix: other,
                consumed: *consumed,
            }),
        }
    })
}

async fn decode_raw<R: AsyncRead + Unpin>(
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
        .await
        .map_err(|e| short_read(*consumed, e))?;
    *consumed += len;
    Ok(Value::Raw(buf))
}

async fn decode_array<R: AsyncRead + Unpin + Send>(
    source: &mut R,
    consumed: &mut usize,
    len: usize,
    opts: &DecodeOptions,
) -> Result<Value, DecodeError> {
    let mut items = Vec::with_capacity(len.min(4096));
    for _ in 0..len {
        items.push(decode_value(source, consumed, opts).await?);
    }
    Ok(Value::Array(items))
}

async fn decode_map<R: AsyncRead + Unpin + Send>(
    source: &mut R,
    consumed: &mut usize,
    len: usize,
    opts: &DecodeOptions,
) -> Result<Value, DecodeError> {
    let mut entries: Vec<(Value, Value)> = Vec::with_capacity(len.min(4096));
    for _ in 0..len {
        let key = decode_value(source, consumed, opts).await?;
        let val = decode_value(source, consumed, opts).await?;
        Value::map_insert(&mut entries, key, val);
    }
    Ok(Value::Map(entries))
}

fn short_read(consumed: usize, cause: io::Error) -> DecodeError {
    DecodeError::ShortRead { consumed, cause }
}

async fn read_u8<R: AsyncRead + Unpin>(
    source: &mut R,
    consumed: &mut usize,
) -> Result<u8, DecodeError> {
    let mut buf = [0u8; 1];
    source
        .read_exact(&mut buf)
        .await
        .map_err(|e| short_read(*consumed, e))?;
    *consumed += 1;
    Ok(buf[0])
}

async fn read_u16<R: AsyncRead + Unpin>(
    source: &mut R,
    consumed: &mut usize,
) -> Result<u16, DecodeError> {
    let mut buf = [0u8; 2];
    source
        .read_exact(&mut buf)
        .await
        .map_err(|e| short_read(*consumed, e))?;
    *consumed += 2;
    Ok(u16::from_be_bytes(buf))
}

async fn read_u32<R: AsyncRead + Unpin>(
    source: &mut R,
    consumed: &mut usize,
) -> Result<u32, DecodeError> {
    let mut buf = [0u8; 4];
    source
        .read_exact(&mut buf)
        .await
        .map_err(|e| short_read(*consumed, e))?;
    *consumed += 4;
    Ok(u32::from_be_bytes(buf))
}

async fn read_u64<R: AsyncRead + Unpin>(
    source: &mut R,
    consumed: &mut usize,
) -> Result<u64, DecodeError> {
    let mut buf = [0u8; 8];
    source
        .read_exact(&mut buf)
        .await
        .map_err(|e| short_read(*consumed, e))?;
    *consumed += 8;
    Ok(u64::from_be_bytes(buf))
}
