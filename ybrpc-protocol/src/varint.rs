//! Variable-length integer encodings used by the framing layer.
//!
//! Request length prefixes use a compact-integer scheme:
//!
//! ```text
//! value             encoding
//! 0..=252           1 byte, the value itself
//! 253..=0xffff      0xfd + u16 little-endian
//! ..=0xffff_ffff    0xfe + u32 little-endian
//! larger            0xff + u64 little-endian
//! ```
//!
//! Response length prefixes are protobuf base-128 varints. Both encodings
//! produce the same single byte for values below 128.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut};

/// Largest value encoded as a single byte.
pub const SINGLE_BYTE_MAX: u64 = 252;
/// Marker for a 2-byte little-endian value.
pub const MARKER_U16: u8 = 0xfd;
/// Marker for a 4-byte little-endian value.
pub const MARKER_U32: u8 = 0xfe;
/// Marker for an 8-byte little-endian value.
pub const MARKER_U64: u8 = 0xff;

/// Returns the number of bytes `value` occupies in compact encoding.
pub fn compact_len(value: u64) -> usize {
    match value {
        0..=SINGLE_BYTE_MAX => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Appends `value` in compact encoding.
pub fn put_compact(buf: &mut impl BufMut, value: u64) {
    match value {
        0..=SINGLE_BYTE_MAX => buf.put_u8(value as u8),
        0xfd..=0xffff => {
            buf.put_u8(MARKER_U16);
            buf.put_u16_le(value as u16);
        }
        0x1_0000..=0xffff_ffff => {
            buf.put_u8(MARKER_U32);
            buf.put_u32_le(value as u32);
        }
        _ => {
            buf.put_u8(MARKER_U64);
            buf.put_u64_le(value);
        }
    }
}

/// Reads a compact-encoded value, consuming its bytes.
pub fn get_compact(buf: &mut impl Buf) -> Result<u64, ProtocolError> {
    if !buf.has_remaining() {
        return Err(ProtocolError::MalformedHeader(
            "missing compact length prefix".to_string(),
        ));
    }
    let width = match buf.get_u8() {
        MARKER_U16 => 2,
        MARKER_U32 => 4,
        MARKER_U64 => 8,
        b => return Ok(b as u64),
    };
    if buf.remaining() < width {
        return Err(ProtocolError::MalformedHeader(format!(
            "compact length prefix needs {} bytes, {} available",
            width,
            buf.remaining()
        )));
    }
    Ok(match width {
        2 => buf.get_u16_le() as u64,
        4 => buf.get_u32_le() as u64,
        _ => buf.get_u64_le(),
    })
}

/// Returns the number of bytes `value` occupies as a protobuf varint.
pub fn uvarint_len(value: u64) -> usize {
    prost::encoding::encoded_len_varint(value)
}

/// Appends `value` as a protobuf varint.
pub fn put_uvarint(buf: &mut impl BufMut, value: u64) {
    prost::encoding::encode_varint(value, buf);
}

/// Reads a protobuf varint, consuming its bytes.
pub fn get_uvarint(buf: &mut impl Buf) -> Result<u64, ProtocolError> {
    prost::encoding::decode_varint(buf)
        .map_err(|e| ProtocolError::MalformedHeader(format!("invalid varint length prefix: {}", e)))
}
