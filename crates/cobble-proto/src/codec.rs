//! Protocol encoding/decoding traits and helpers.

use bytes::{Buf, BufMut};

use crate::error::ProtoError;
use crate::types::VarInt;

/// Encode a value onto a buffer.
pub trait ProtoEncode {
    fn proto_encode(&self, buf: &mut impl BufMut);
}

/// Decode a value from a buffer.
pub trait ProtoDecode: Sized {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError>;
}

/// Fail with [`ProtoError::BufferTooShort`] unless `needed` bytes remain.
pub fn ensure_remaining(buf: &impl Buf, needed: usize) -> Result<(), ProtoError> {
    if buf.remaining() < needed {
        return Err(ProtoError::BufferTooShort {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

/// Read a VarInt length prefix, rejecting negative values.
pub fn read_length(buf: &mut impl Buf) -> Result<usize, ProtoError> {
    let len = VarInt::proto_decode(buf)?.0;
    if len < 0 {
        return Err(ProtoError::NegativeLength(len));
    }
    Ok(len as usize)
}

/// Write a byte array (VarInt length + raw bytes).
pub fn write_byte_array(buf: &mut impl BufMut, data: &[u8]) {
    VarInt(data.len() as i32).proto_encode(buf);
    buf.put_slice(data);
}

/// Read a byte array (VarInt length + raw bytes).
pub fn read_byte_array(buf: &mut impl Buf) -> Result<Vec<u8>, ProtoError> {
    let len = read_length(buf)?;
    ensure_remaining(buf, len)?;
    Ok(buf.copy_to_bytes(len).to_vec())
}

impl ProtoEncode for bool {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(*self as u8);
    }
}

impl ProtoDecode for bool {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 1)?;
        match buf.get_u8() {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtoError::InvalidData(format!(
                "boolean byte must be 0 or 1, got {other}"
            ))),
        }
    }
}
