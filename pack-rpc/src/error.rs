//! Errors shared across framing, the server, the client, and the pool.

use std::fmt;
use std::io;

use pack_core::{DecodeError, EncodeError};

use crate::frame::{FrameError, MalformedFrame};

/// The error type returned by every `pack-rpc` operation.
#[derive(Debug)]
pub enum RpcError {
    /// The underlying transport failed to read or write.
    Io(io::Error),
    /// A frame could not be decoded as a pack-format value.
    Decode(DecodeError),
    /// A frame could not be encoded as a pack-format value.
    Encode(EncodeError),
    /// A decoded value didn't match the request/response/notify frame shape.
    MalformedFrame(MalformedFrame),
    /// A request named a method with no registered handler.
    UnknownMethod(String),
    /// A handler returned an error, or its task panicked; the message is
    /// forwarded from the handler (or a fixed message for a panic, since the
    /// panic payload isn't guaranteed `Send`/`'static`-safe to format).
    HandlerError(String),
    /// The connection closed while a call was outstanding, or before a new
    /// call could be issued.
    Disconnected,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::Io(err) => write!(f, "io error: {}", err),
            RpcError::Decode(err) => write!(f, "decode error: {}", err),
            RpcError::Encode(err) => write!(f, "encode error: {}", err),
            RpcError::MalformedFrame(err) => write!(f, "{}", err),
            RpcError::UnknownMethod(method) => write!(f, "unknown method: {}", method),
            RpcError::HandlerError(msg) => write!(f, "handler error: {}", msg),
            RpcError::Disconnected => write!(f, "connection closed"),
        }
    }
}

impl std::error::Error for RpcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RpcError::Io(err) => Some(err),
            RpcError::Decode(err) => Some(err),
            RpcError::Encode(err) => Some(err),
            RpcError::MalformedFrame(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for RpcError {
    fn from(err: io::Error) -> Self {
        RpcError::Io(err)
    }
}

impl From<DecodeError> for RpcError {
    fn from(err: DecodeError) -> Self {
        RpcError::Decode(err)
    }
}

impl From<EncodeError> for RpcError {
    fn from(err: EncodeError) -> Self {
        RpcError::Encode(err)
    }
}

impl From<MalformedFrame> for RpcError {
    fn from(err: MalformedFrame) -> Self {
        RpcError::MalformedFrame(err)
    }
}

impl From<FrameError> for RpcError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Decode(err) => RpcError::Decode(err),
            FrameError::Malformed(err) => RpcError::MalformedFrame(err),
        }
    }
}
