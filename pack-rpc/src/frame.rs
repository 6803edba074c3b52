//! Request/response/notify framing over the pack format (spec §3.3, C5).
//!
//! Every frame is a pack-format array whose first element is a tag:
//! `0` = request `[0, msgid, method, params]`, `1` = response
//! `[1, msgid, error, result]`, `2` = notify `[2, method, params]`.

use std::fmt;

use pack_core::Value;

const TAG_REQUEST: u64 = 0;
const TAG_RESPONSE: u64 = 1;
const TAG_NOTIFY: u64 = 2;

/// A parsed RPC frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Request {
        msgid: u32,
        method: String,
        params: Value,
    },
    Response {
        msgid: u32,
        error: Value,
        result: Value,
    },
    Notify {
        method: String,
        params: Value,
    },
}

/// A frame whose outer shape parsed but whose contents don't match any
/// known tag or arity (spec §3.3: "a frame with an unrecognized tag or
/// wrong arity is a framing error, not a decode error").
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedFrame(pub String);

impl fmt::Display for MalformedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed rpc frame: {}", self.0)
    }
}

impl std::error::Error for MalformedFrame {}

/// Builds a request frame value: `[0, msgid, method, params]`.
pub fn request_value(msgid: u32, method: &str, params: Value) -> Value {
    Value::Array(vec![
        Value::UInt(TAG_REQUEST),
        Value::UInt(msgid as u64),
        Value::from(method),
        params,
    ])
}

/// Builds a successful response frame value: `[1, msgid, nil, result]`.
pub fn response_ok_value(msgid: u32, result: Value) -> Value {
    Value::Array(vec![
        Value::UInt(TAG_RESPONSE),
        Value::UInt(msgid as u64),
        Value::Nil,
        result,
    ])
}

/// Builds a failed response frame value: `[1, msgid, error, nil]`.
pub fn response_err_value(msgid: u32, error: Value) -> Value {
    Value::Array(vec![
        Value::UInt(TAG_RESPONSE),
        Value::UInt(msgid as u64),
        error,
        Value::Nil,
    ])
}

/// Builds a notify frame value: `[2, method, params]`.
pub fn notify_value(method: &str, params: Value) -> Value {
    Value::Array(vec![Value::UInt(TAG_NOTIFY), Value::from(method), params])
}

/// The pure, byte-level codec surface (spec §4.5, C5): encode a frame
/// straight to bytes, or parse bytes straight to a [`Frame`]. Built
/// entirely on top of `pack_core::encode`/`decode` and the `*_value`
/// builders/`parse_frame` above.
pub fn pack_request(msgid: u32, method: &str, params: Value) -> Vec<u8> {
    encode_value(request_value(msgid, method, params))
}

pub fn pack_response_ok(msgid: u32, result: Value) -> Vec<u8> {
    encode_value(response_ok_value(msgid, result))
}

pub fn pack_response_err(msgid: u32, message: Value) -> Vec<u8> {
    encode_value(response_err_value(msgid, message))
}

pub fn pack_notify(method: &str, params: Value) -> Vec<u8> {
    encode_value(notify_value(method, params))
}

/// Decodes one pack-format value from `bytes` and interprets it as an RPC
/// frame, reporting the frame type or [`MalformedFrame`] (spec §4.5:
/// `parse_frame(bytes) -> Request | Response | Notify | Malformed`).
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, FrameError> {
    let (value, _consumed) = pack_core::decode(&mut &bytes[..]).map_err(FrameError::Decode)?;
    parse_frame(value).map_err(FrameError::Malformed)
}

/// Either half of `decode_frame`'s failure modes: the bytes weren't even a
/// legal pack-format value, or they were a value with the wrong shape.
#[derive(Debug)]
pub enum FrameError {
    Decode(pack_core::DecodeError),
    Malformed(MalformedFrame),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Decode(err) => write!(f, "{}", err),
            FrameError::Malformed(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for FrameError {}

fn encode_value(value: Value) -> Vec<u8> {
    let mut buf = Vec::new();
    // Every `*_value` builder above produces a well-formed Array of encodable
    // variants, so encoding can never hit `UnsupportedType`/`LengthOverflow`.
    pack_core::encode(&mut buf, &value).expect("frame values are always encodable");
    buf
}

/// Interprets a decoded [`Value`] as an RPC frame.
pub fn parse_frame(value: Value) -> Result<Frame, MalformedFrame> {
    let items = match value {
        Value::Array(items) => items,
        other => return Err(MalformedFrame(format!("frame is not an array: {:?}", other))),
    };
    if items.is_empty() {
        return Err(MalformedFrame("frame array is empty".into()));
    }
    let tag = items[0].as_u64();
    match tag {
        TAG_REQUEST => {
            if items.len() != 4 {
                return Err(MalformedFrame(format!(
                    "request frame has {} elements, want 4",
                    items.len()
                )));
            }
            let mut it = items.into_iter();
            let _tag = it.next().unwrap();
            let msgid = it.next().unwrap();
            let method = it.next().unwrap();
            let params = it.next().unwrap();
            let method = method
                .as_text()
                .ok_or_else(|| MalformedFrame("request method is not text".into()))?
                .into_owned();
            Ok(Frame::Request {
                msgid: msgid.as_u64() as u32,
                method,
                params,
            })
        }
        TAG_RESPONSE => {
            if items.len() != 4 {
                return Err(MalformedFrame(format!(
                    "response frame has {} elements, want 4",
                    items.len()
                )));
            }
            let mut it = items.into_iter();
            let _tag = it.next().unwrap();
            let msgid = it.next().unwrap();
            let error = it.next().unwrap();
            let result = it.next().unwrap();
            Ok(Frame::Response {
                msgid: msgid.as_u64() as u32,
                error,
                result,
            })
        }
        TAG_NOTIFY => {
            if items.len() != 3 {
                return Err(MalformedFrame(format!(
                    "notify frame has {} elements, want 3",
                    items.len()
                )));
            }
            let mut it = items.into_iter();
            let _tag = it.next().unwrap();
            let method = it.next().unwrap();
            let params = it.next().unwrap();
            let method = method
                .as_text()
                .ok_or_else(|| MalformedFrame("notify method is not text".into()))?
                .into_owned();
            Ok(Frame::Notify { method, params })
        }
        other => Err(MalformedFrame(format!("unrecognized frame tag: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_parse() {
        let v = request_value(7, "echo", Value::Array(vec![Value::from("hi")]));
        match parse_frame(v).unwrap() {
            Frame::Request {
                msgid,
                method,
                params,
            } => {
                assert_eq!(msgid, 7);
                assert_eq!(method, "echo");
                assert_eq!(params.as_array().unwrap().len(), 1);
            }
            other => panic!("expected Request, got {:?}", other),
        }
    }

    #[test]
    fn response_ok_round_trips() {
        let v = response_ok_value(3, Value::UInt(42));
        match parse_frame(v).unwrap() {
            Frame::Response {
                msgid,
                error,
                result,
            } => {
                assert_eq!(msgid, 3);
                assert_eq!(error, Value::Nil);
                assert_eq!(result, Value::UInt(42));
            }
            other => panic!("expected Response, got {:?}", other),
        }
    }

    #[test]
    fn notify_round_trips() {
        let v = notify_value("tick", Value::Nil);
        match parse_frame(v).unwrap() {
            Frame::Notify { method, params } => {
                assert_eq!(method, "tick");
                assert_eq!(params, Value::Nil);
            }
            other => panic!("expected Notify, got {:?}", other),
        }
    }

    #[test]
    fn wrong_arity_is_malformed_not_panicking() {
        let v = Value::Array(vec![Value::UInt(0), Value::UInt(1)]);
        assert!(parse_frame(v).is_err());
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let v = Value::Array(vec![Value::UInt(9)]);
        assert!(parse_frame(v).is_err());
    }

    #[test]
    fn non_array_is_malformed() {
        assert!(parse_frame(Value::Nil).is_err());
    }

    #[test]
    fn pack_request_bytes_start_with_the_tagged_4_tuple_header() {
        // spec §8 scenario 6: a request is a 4-tuple starting with tag 0.
        let bytes = pack_request(0, "echo", Value::UInt(42));
        assert_eq!(&bytes[..2], &[0x94, 0x00]);
    }

    #[test]
    fn decode_frame_round_trips_pack_request() {
        let bytes = pack_request(3, "echo", Value::UInt(42));
        match decode_frame(&bytes).unwrap() {
            Frame::Request {
                msgid,
                method,
                params,
            } => {
                assert_eq!(msgid, 3);
                assert_eq!(method, "echo");
                assert_eq!(params, Value::UInt(42));
            }
            other => panic!("expected Request, got {:?}", other),
        }
    }

    #[test]
    fn decode_frame_round_trips_pack_response_ok_and_err() {
        let ok_bytes = pack_response_ok(1, Value::UInt(7));
        match decode_frame(&ok_bytes).unwrap() {
            Frame::Response { error, result, .. } => {
                assert_eq!(error, Value::Nil);
                assert_eq!(result, Value::UInt(7));
            }
            other => panic!("expected Response, got {:?}", other),
        }

        let err_bytes = pack_response_err(1, Value::from("boom"));
        match decode_frame(&err_bytes).unwrap() {
            Frame::Response { error, result, .. } => {
                assert_eq!(error.as_text().as_deref(), Some("boom"));
                assert_eq!(result, Value::Nil);
            }
            other => panic!("expected Response, got {:?}", other),
        }
    }

    #[test]
    fn decode_frame_round_trips_pack_notify() {
        let bytes = pack_notify("tick", Value::Nil);
        match decode_frame(&bytes).unwrap() {
            Frame::Notify { method, params } => {
                assert_eq!(method, "tick");
                assert_eq!(params, Value::Nil);
            }
            other => panic!("expected Notify, got {:?}", other),
        }
    }

    #[test]
    fn decode_frame_surfaces_malformed_shape() {
        let mut buf = Vec::new();
        pack_core::encode(&mut buf, &Value::Array(vec![Value::UInt(9)])).unwrap();
        let err = decode_frame(&buf).unwrap_err();
        assert!(matches!(err, FrameError::Malformed(_)));
    }

    #[test]
    fn decode_frame_surfaces_decode_error_on_garbage_bytes() {
        let err = decode_frame(&[0xc1]).unwrap_err();
        assert!(matches!(err, FrameError::Decode(_)));
    }
}
