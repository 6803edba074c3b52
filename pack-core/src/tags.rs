//! Wire prefix constants for the pack format (spec §3.2, §4.1).
//!
//! Every encoded value begins with one prefix byte. Most of the prefix
//! space packs a small length or integer directly into the byte; the rest
//! names a fixed- or variable-width payload that follows.

/// Largest value a positive fix-int prefix can hold (prefix == value).
pub const POSITIVE_FIX_MAX: u8 = 0x7f;

/// First byte of the negative fix-int range (`[0xe0, 0xff]`, i.e. `[-32, -1]`).
pub const NEGATIVE_FIX_MIN: u8 = 0xe0;
/// Last byte of the negative fix-int range.
pub const NEGATIVE_FIX_MAX: u8 = 0xff;
/// Mask applied to a negative fix-int prefix before subtracting the offset.
pub const NEGATIVE_FIX_MASK: u8 = 0x1f;
/// Subtracted from the masked negative fix-int prefix to get the value.
pub const NEGATIVE_FIX_OFFSET: i64 = 32;

/// First byte of the fix-map range.
pub const FIX_MAP_MIN: u8 = 0x80;
/// Last byte of the fix-map range.
pub const FIX_MAP_MAX: u8 = 0x8f;
/// Mask that extracts the length from a fix-map prefix.
pub const FIX_MAP_COUNT_MASK: u8 = 0x0f;

/// First byte of the fix-array range.
pub const FIX_ARRAY_MIN: u8 = 0x90;
/// Last byte of the fix-array range.
pub const FIX_ARRAY_MAX: u8 = 0x9f;
/// Mask that extracts the length from a fix-array prefix.
pub const FIX_ARRAY_COUNT_MASK: u8 = 0x0f;

/// First byte of the fix-raw range.
pub const FIX_RAW_MIN: u8 = 0xa0;
/// Last byte of the fix-raw range.
pub const FIX_RAW_MAX: u8 = 0xbf;
/// Mask that extracts the length from a fix-raw prefix.
pub const FIX_RAW_COUNT_MASK: u8 = 0x1f;

pub const NIL: u8 = 0xc0;
pub const FALSE: u8 = 0xc2;
pub const TRUE: u8 = 0xc3;

pub const FLOAT32: u8 = 0xca;
pub const FLOAT64: u8 = 0xcb;

pub const UINT8: u8 = 0xcc;
pub const UINT16: u8 = 0xcd;
pub const UINT32: u8 = 0xce;
pub const UINT64: u8 = 0xcf;

pub const INT8: u8 = 0xd0;
pub const INT16: u8 = 0xd1;
pub const INT32: u8 = 0xd2;
pub const INT64: u8 = 0xd3;

pub const RAW16: u8 = 0xda;
pub const RAW32: u8 = 0xdb;

pub const ARRAY16: u8 = 0xdc;
pub const ARRAY32: u8 = 0xdd;

pub const MAP16: u8 = 0xde;
pub const MAP32: u8 = 0xdf;

/// Container/raw lengths at or beyond this value have no legal wire form.
pub const MAX_LENGTH: u64 = 1 << 32;

/// Thresholds for the length-bucket cascade shared by raw/array/map
/// encoding (spec §4.3): fix form below 16, a 16-bit header below 2^16,
/// a 32-bit header below 2^32.
pub const FIX_CONTAINER_LIMIT: u64 = 16;
pub const SHORT_LENGTH_LIMIT: u64 = 1 << 16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_int_ranges_cover_their_halves() {
        assert_eq!(POSITIVE_FIX_MAX, 0x7f);
        assert_eq!(NEGATIVE_FIX_MIN, 0xe0);
        assert_eq!(NEGATIVE_FIX_MAX, 0xff);
    }

    #[test]
    fn masks_match_field_widths() {
        assert_eq!(FIX_MAP_COUNT_MASK, 0x0f);
        assert_eq!(FIX_ARRAY_COUNT_MASK, 0x0f);
        assert_eq!(FIX_RAW_COUNT_MASK, 0x1f);
        assert_eq!(NEGATIVE_FIX_MASK, 0x1f);
    }
}
