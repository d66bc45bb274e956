//! Base data types used throughout the Java edition protocol.

use std::fmt;
use std::ops::Range;

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{ensure_remaining, read_length, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum VarIntError {
    #[error("buffer too short")]
    BufferTooShort,
    #[error("VarInt is too long (more than {max_bytes} bytes)")]
    TooManyBytes { max_bytes: usize },
}

// ---------------------------------------------------------------------------
// VarInt (i32, plain LEB128 over the two's complement bits)
// ---------------------------------------------------------------------------

/// Java edition VarInt. Negative values always take five bytes since the
/// sign bit is carried through unsigned LEB128 rather than ZigZag.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VarInt(pub i32);

impl VarInt {
    /// Maximum bytes a VarInt can occupy.
    pub const MAX_BYTES: usize = 5;

}

impl ProtoEncode for VarInt {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        let mut value = self.0 as u32;
        loop {
            if value & !0x7F == 0 {
                buf.put_u8(value as u8);
                return;
            }
            buf.put_u8((value & 0x7F | 0x80) as u8);
            value >>= 7;
        }
    }
}

impl ProtoDecode for VarInt {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let mut result: u32 = 0;
        let mut shift: u32 = 0;
        for i in 0..Self::MAX_BYTES {
            if !buf.has_remaining() {
                return Err(VarIntError::BufferTooShort.into());
            }
            let byte = buf.get_u8();
            result |= ((byte & 0x7F) as u32) << shift;
            if byte & 0x80 == 0 {
                return Ok(VarInt(result as i32));
            }
            shift += 7;
            if i == Self::MAX_BYTES - 1 {
                return Err(VarIntError::TooManyBytes {
                    max_bytes: Self::MAX_BYTES,
                }
                .into());
            }
        }
        Err(VarIntError::BufferTooShort.into())
    }
}

impl fmt::Debug for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarInt({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// BitSet (VarInt word count + big-endian longs)
// ---------------------------------------------------------------------------

/// A growable set of bits backed by 64-bit words, as used for light masks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BitSet(pub Vec<u64>);

impl BitSet {
    /// Maximum word count accepted when decoding.
    pub const MAX_WORDS: usize = 1 << 16;

    /// A zeroed set wide enough to hold `bits` bits.
    pub fn with_bits(bits: usize) -> Self {
        BitSet(vec![0; bits.div_ceil(64)])
    }

    pub fn get(&self, index: usize) -> bool {
        self.0
            .get(index / 64)
            .is_some_and(|word| word & (1 << (index % 64)) != 0)
    }

    /// Set or clear bit `index`, growing the word buffer if needed.
    pub fn set(&mut self, index: usize, value: bool) {
        let word = index / 64;
        if word >= self.0.len() {
            if !value {
                return;
            }
            self.0.resize(word + 1, 0);
        }
        if value {
            self.0[word] |= 1 << (index % 64);
        } else {
            self.0[word] &= !(1 << (index % 64));
        }
    }

    /// Bitwise complement over the current word length.
    pub fn complement(&self) -> Self {
        BitSet(self.0.iter().map(|w| !w).collect())
    }
}

impl ProtoEncode for BitSet {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.0.len() as i32).proto_encode(buf);
        for &word in &self.0 {
            buf.put_u64(word);
        }
    }
}

impl ProtoDecode for BitSet {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let len = read_length(buf)?;
        if len > Self::MAX_WORDS {
            return Err(ProtoError::LengthTooLarge {
                len,
                max: Self::MAX_WORDS,
            });
        }
        ensure_remaining(buf, len * 8)?;
        Ok(BitSet((0..len).map(|_| buf.get_u64()).collect()))
    }
}

// ---------------------------------------------------------------------------
// ChunkPos (i32 x, z)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Range of block X coordinates within this chunk.
    pub fn block_x_range(&self) -> Range<i32> {
        let start = self.x << 4;
        start..start + 16
    }

    /// Range of block Z coordinates within this chunk.
    pub fn block_z_range(&self) -> Range<i32> {
        let start = self.z << 4;
        start..start + 16
    }
}

impl ProtoEncode for ChunkPos {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i32(self.x);
        buf.put_i32(self.z);
    }
}

impl ProtoDecode for ChunkPos {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 8)?;
        Ok(Self {
            x: buf.get_i32(),
            z: buf.get_i32(),
        })
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn encoded(value: i32) -> Vec<u8> {
        let mut buf = BytesMut::new();
        VarInt(value).proto_encode(&mut buf);
        buf.to_vec()
    }

    // -- VarInt --

    #[test]
    fn varint_known_encodings() {
        assert_eq!(encoded(0), [0x00]);
        assert_eq!(encoded(1), [0x01]);
        assert_eq!(encoded(127), [0x7F]);
        assert_eq!(encoded(128), [0x80, 0x01]);
        assert_eq!(encoded(255), [0xFF, 0x01]);
        assert_eq!(encoded(25565), [0xDD, 0xC7, 0x01]);
        assert_eq!(encoded(2_097_151), [0xFF, 0xFF, 0x7F]);
        assert_eq!(encoded(i32::MAX), [0xFF, 0xFF, 0xFF, 0xFF, 0x07]);
        assert_eq!(encoded(-1), [0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
        assert_eq!(encoded(i32::MIN), [0x80, 0x80, 0x80, 0x80, 0x08]);
    }

    #[test]
    fn varint_buffer_too_short() {
        assert!(VarInt::proto_decode(&mut bytes::Bytes::new()).is_err());
        let data = bytes::Bytes::from_static(&[0x80, 0x80]);
        assert!(VarInt::proto_decode(&mut data.clone()).is_err());
    }

    #[test]
    fn varint_too_many_bytes() {
        let data = bytes::Bytes::from_static(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]);
        assert!(matches!(
            VarInt::proto_decode(&mut data.clone()),
            Err(ProtoError::VarInt(VarIntError::TooManyBytes { max_bytes: 5 }))
        ));
    }

    #[test]
    fn varint_proto_roundtrip() {
        for value in [0, 1, -1, 300, i32::MAX, i32::MIN] {
            let mut buf = BytesMut::new();
            VarInt(value).proto_encode(&mut buf);
            let decoded = VarInt::proto_decode(&mut buf.freeze()).unwrap();
            assert_eq!(decoded.0, value);
        }
    }

    // -- BitSet --

    #[test]
    fn bitset_set_get() {
        let mut set = BitSet::with_bits(26);
        assert_eq!(set.0.len(), 1);
        set.set(0, true);
        set.set(25, true);
        assert!(set.get(0));
        assert!(set.get(25));
        assert!(!set.get(1));
        assert!(!set.get(1000));
        set.set(25, false);
        assert!(!set.get(25));
        assert_eq!(set.0, [1]);
    }

    #[test]
    fn bitset_grows_on_set() {
        let mut set = BitSet::default();
        set.set(70, true);
        assert_eq!(set.0.len(), 2);
        assert!(set.get(70));
    }

    #[test]
    fn bitset_complement() {
        let mut set = BitSet::with_bits(64);
        set.set(3, true);
        let rev = set.complement();
        assert!(!rev.get(3));
        assert!(rev.get(4));
        assert_eq!(rev.0, [!0b1000]);
    }

    #[test]
    fn bitset_wire_layout() {
        let mut set = BitSet::with_bits(64);
        set.set(0, true);
        let mut buf = BytesMut::new();
        set.proto_encode(&mut buf);
        assert_eq!(&buf[..], &[0x01, 0, 0, 0, 0, 0, 0, 0, 0x01]);
        let decoded = BitSet::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, set);
    }

    // -- ChunkPos --

    #[test]
    fn chunkpos_block_ranges() {
        let cp = ChunkPos::new(0, 0);
        assert_eq!(cp.block_x_range(), 0..16);
        assert_eq!(cp.block_z_range(), 0..16);

        let cp = ChunkPos::new(1, -1);
        assert_eq!(cp.block_x_range(), 16..32);
        assert_eq!(cp.block_z_range(), -16..0);
    }

    #[test]
    fn chunkpos_big_endian() {
        let mut buf = BytesMut::new();
        ChunkPos::new(1, -1).proto_encode(&mut buf);
        assert_eq!(&buf[..], &[0, 0, 0, 1, 0xFF, 0xFF, 0xFF, 0xFF]);
        let decoded = ChunkPos::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, ChunkPos::new(1, -1));
    }
}
