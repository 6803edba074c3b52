//! Errors raised by the encoder and decoder (spec §7).

use std::fmt;
use std::io;

/// Errors the encoder can raise (spec §7: `WriteFailed`, `UnsupportedType`,
/// `LengthOverflow`).
#[derive(Debug)]
pub enum EncodeError {
    /// The sink returned an I/O error mid-write.
    WriteFailed(io::Error),
    /// The value's dynamic variant has no wire form (only reachable via
    /// code that constructs a `Value` outside the closed set described in
    /// spec §3.1; the variants defined in this crate are all encodable).
    UnsupportedType,
    /// A container or raw payload has length >= 2^32.
    LengthOverflow { len: u64 },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::WriteFailed(err) => write!(f, "write failed: {}", err),
            EncodeError::UnsupportedType => write!(f, "unsupported value type"),
            EncodeError::LengthOverflow { len } => {
                write!(f, "length {} has no legal wire form (>= 2^32)", len)
            }
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EncodeError::WriteFailed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for EncodeError {
    fn from(err: io::Error) -> Self {
        EncodeError::WriteFailed(err)
    }
}

/// Errors the decoder can raise (spec §7: `ShortRead`, `UnknownPrefix`).
///
/// Both variants carry the number of bytes consumed before the failure, so
/// callers (notably the RPC reader task) can decide whether any partial
/// progress was made.
#[derive(Debug)]
pub enum DecodeError {
    /// The source ended before a complete value was read.
    ShortRead { consumed: usize, cause: io::Error },
    /// The prefix byte does not match any range or exact value in spec §3.2.
    UnknownPrefix { prefix: u8, consumed: usize },
}

impl DecodeError {
    /// Bytes consumed from the source before this error was raised.
    pub fn consumed(&self) -> usize {
        match self {
            DecodeError::ShortRead { consumed, .. } => *consumed,
            DecodeError::UnknownPrefix { consumed, .. } => *consumed,
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::ShortRead { consumed, cause } => {
                write!(f, "short read after {} bytes: {}", consumed, cause)
            }
            DecodeError::UnknownPrefix { prefix, consumed } => {
                write!(f, "unknown prefix 0x{:02x} at byte {}", prefix, consumed)
            }
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::ShortRead { cause, .. } => Some(cause),
            DecodeError::UnknownPrefix { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_error_display_mentions_length() {
        let err = EncodeError::LengthOverflow { len: 1 << 32 };
        assert!(format!("{}", err).contains("4294967296"));
    }

    #[test]
    fn decode_error_reports_consumed_bytes() {
        let err = DecodeError::UnknownPrefix {
            prefix: 0xc1,
            consumed: 1,
        };
        assert_eq!(err.consumed(), 1);
        assert!(format!("{}", err).contains("0xc1"));
    }
}
