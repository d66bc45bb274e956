//! Fixed-width unsigned integers packed into 64-bit words.
//!
//! Each word holds `64 / bits` values starting at the least significant
//! bit. Values never straddle a word boundary; leftover high bits are
//! padding. This is the layout of block states, biomes and heightmaps in
//! both the chunk packet and region files since 1.16.

use bytes::{Buf, BufMut};
use cobble_proto::codec::{ensure_remaining, read_length, ProtoEncode};
use cobble_proto::error::ProtoError;
use cobble_proto::types::VarInt;

use crate::error::WorldError;

/// Widest supported value.
pub const MAX_BITS: u32 = 32;

/// Number of words needed to hold `length` values of `bits` bits each.
pub fn words_needed(bits: u32, length: usize) -> usize {
    if bits == 0 {
        return 0;
    }
    let per_word = (64 / bits) as usize;
    length.div_ceil(per_word)
}

/// Number of bits needed to represent `n`.
pub fn bit_width(n: u32) -> u32 {
    u32::BITS - n.leading_zeros()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedArray {
    bits: u32,
    length: usize,
    values_per_word: usize,
    mask: u64,
    words: Vec<u64>,
}

impl PackedArray {
    /// A zeroed array. With `bits == 0` every read returns 0 and writes are dropped.
    ///
    /// # Panics
    ///
    /// If `bits` exceeds [`MAX_BITS`].
    pub fn new(bits: u32, length: usize) -> Self {
        assert!(bits <= MAX_BITS, "{bits} bits per value is not supported");
        Self {
            bits,
            length,
            values_per_word: if bits == 0 { 0 } else { (64 / bits) as usize },
            mask: mask_for(bits),
            words: vec![0; words_needed(bits, length)],
        }
    }

    /// Wrap an existing word buffer, which must be exactly the size `bits` and `length` imply.
    pub fn with_words(bits: u32, length: usize, words: Vec<u64>) -> Result<Self, WorldError> {
        if bits > MAX_BITS {
            return Err(WorldError::InvalidBits(bits));
        }
        let expected = words_needed(bits, length);
        if words.len() != expected {
            return Err(WorldError::LengthMismatch {
                got: words.len(),
                expected,
            });
        }
        let mut array = Self::new(0, length);
        array.words = words;
        array.set_bits(bits);
        Ok(array)
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// The backing words, verbatim.
    pub fn raw(&self) -> &[u64] {
        &self.words
    }

    pub fn into_raw(self) -> Vec<u64> {
        self.words
    }

    /// # Panics
    ///
    /// If `index` is out of bounds (unless the array is zero-bit).
    pub fn get(&self, index: usize) -> u32 {
        if self.values_per_word == 0 {
            return 0;
        }
        self.check_index(index);
        let (word, offset) = self.locate(index);
        ((self.words[word] >> offset) & self.mask) as u32
    }

    /// # Panics
    ///
    /// If `value` does not fit in `bits` or `index` is out of bounds
    /// (unless the array is zero-bit).
    pub fn set(&mut self, index: usize, value: u32) {
        self.swap(index, value);
    }

    /// Store `value` at `index` and return what was there.
    pub fn swap(&mut self, index: usize, value: u32) -> u32 {
        if self.values_per_word == 0 {
            return 0;
        }
        assert!(
            value as u64 <= self.mask,
            "value {value} does not fit in {} bits",
            self.bits
        );
        self.check_index(index);
        let (word, offset) = self.locate(index);
        let current = self.words[word];
        self.words[word] = (current & !(self.mask << offset)) | ((value as u64) << offset);
        ((current >> offset) & self.mask) as u32
    }

    /// Iterate over every stored value in index order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.length).map(move |i| self.get(i))
    }

    /// Recompute the layout for `bits` after the word buffer was replaced
    /// by [`read_words`](Self::read_words).
    pub fn fix(&mut self, bits: u32) -> Result<(), WorldError> {
        if bits > MAX_BITS {
            return Err(WorldError::InvalidBits(bits));
        }
        let expected = words_needed(bits, self.length);
        if self.words.len() != expected {
            return Err(WorldError::LengthMismatch {
                got: self.words.len(),
                expected,
            });
        }
        self.set_bits(bits);
        Ok(())
    }

    /// Replace the word buffer with a VarInt-counted run of big-endian longs.
    /// Call [`fix`](Self::fix) afterwards.
    pub fn read_words(&mut self, buf: &mut impl Buf) -> Result<(), ProtoError> {
        let count = read_length(buf)?;
        // Every word holds at least one value.
        if count > self.length {
            return Err(ProtoError::LengthTooLarge {
                len: count,
                max: self.length,
            });
        }
        ensure_remaining(buf, count * 8)?;
        self.words.clear();
        self.words.extend((0..count).map(|_| buf.get_u64()));
        Ok(())
    }

    fn set_bits(&mut self, bits: u32) {
        self.bits = bits;
        self.mask = mask_for(bits);
        self.values_per_word = if bits == 0 { 0 } else { (64 / bits) as usize };
    }

    fn check_index(&self, index: usize) {
        assert!(
            index < self.length,
            "index {index} out of bounds for length {}",
            self.length
        );
    }

    fn locate(&self, index: usize) -> (usize, usize) {
        let word = index / self.values_per_word;
        let offset = (index - word * self.values_per_word) * self.bits as usize;
        (word, offset)
    }
}

fn mask_for(bits: u32) -> u64 {
    if bits == 0 {
        0
    } else {
        (1u64 << bits) - 1
    }
}

impl ProtoEncode for PackedArray {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        VarInt(self.words.len() as i32).proto_encode(buf);
        for &word in &self.words {
            buf.put_u64(word);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn words_needed_matches_vanilla_sizes() {
        assert_eq!(words_needed(0, 4096), 0);
        assert_eq!(words_needed(4, 4096), 256);
        assert_eq!(words_needed(5, 4096), 342);
        assert_eq!(words_needed(8, 4096), 512);
        assert_eq!(words_needed(15, 4096), 1024);
        assert_eq!(words_needed(1, 64), 1);
        assert_eq!(words_needed(3, 64), 4);
        assert_eq!(words_needed(6, 64), 7);
        assert_eq!(words_needed(9, 256), 37);
    }

    #[test]
    fn bit_width_values() {
        assert_eq!(bit_width(0), 0);
        assert_eq!(bit_width(1), 1);
        assert_eq!(bit_width(15), 4);
        assert_eq!(bit_width(16), 5);
        assert_eq!(bit_width(385), 9);
    }

    #[test]
    fn roundtrip_every_width() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        for bits in 1..=MAX_BITS {
            let length = 4096;
            let max = if bits == 32 { u32::MAX } else { (1 << bits) - 1 };
            let values: Vec<u32> = (0..length).map(|_| rng.gen_range(0..=max)).collect();

            let mut array = PackedArray::new(bits, length);
            for (i, &v) in values.iter().enumerate() {
                array.set(i, v);
            }
            for (i, &v) in values.iter().enumerate() {
                assert_eq!(array.get(i), v, "bits={bits} index={i}");
            }

            let rebuilt = PackedArray::with_words(bits, length, array.raw().to_vec()).unwrap();
            assert!(rebuilt.iter().eq(values.iter().copied()), "bits={bits}");
        }
    }

    #[test]
    fn set_does_not_disturb_neighbours() {
        let mut array = PackedArray::new(5, 24);
        for i in 0..24 {
            array.set(i, 31);
        }
        array.set(12, 0);
        assert_eq!(array.get(11), 31);
        assert_eq!(array.get(12), 0);
        assert_eq!(array.get(13), 31);
    }

    #[test]
    fn swap_returns_previous() {
        let mut array = PackedArray::new(4, 16);
        assert_eq!(array.swap(3, 9), 0);
        assert_eq!(array.swap(3, 2), 9);
        assert_eq!(array.get(3), 2);
    }

    #[test]
    fn zero_bits_is_a_no_op_store() {
        let mut array = PackedArray::new(0, 4096);
        assert!(array.raw().is_empty());
        array.set(7, 12);
        assert_eq!(array.swap(7, 3), 0);
        assert_eq!(array.get(7), 0);
        assert_eq!(array.len(), 4096);
    }

    #[test]
    fn with_words_length_mismatch() {
        let err = PackedArray::with_words(4, 4096, vec![0; 255]).unwrap_err();
        assert!(matches!(
            err,
            WorldError::LengthMismatch {
                got: 255,
                expected: 256
            }
        ));
        assert!(PackedArray::with_words(0, 4096, vec![1]).is_err());
        assert!(matches!(
            PackedArray::with_words(33, 16, vec![]),
            Err(WorldError::InvalidBits(33))
        ));
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn value_above_mask_panics() {
        PackedArray::new(4, 16).set(0, 16);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn index_out_of_bounds_panics() {
        PackedArray::new(4, 16).get(16);
    }

    #[test]
    fn wire_layout() {
        let mut array = PackedArray::new(4, 16);
        array.set(0, 1);
        array.set(1, 2);
        array.set(15, 0xF);
        let mut buf = BytesMut::new();
        array.proto_encode(&mut buf);
        assert_eq!(&buf[..], &[0x01, 0xF0, 0, 0, 0, 0, 0, 0, 0x21]);
    }

    #[test]
    fn read_words_then_fix() {
        let mut source = PackedArray::new(6, 64);
        for i in 0..64 {
            source.set(i, (i as u32 * 7) % 64);
        }
        let mut buf = BytesMut::new();
        source.proto_encode(&mut buf);

        let mut decoded = PackedArray::new(0, 64);
        decoded.read_words(&mut buf.freeze()).unwrap();
        decoded.fix(6).unwrap();
        assert_eq!(decoded, source);
    }

    #[test]
    fn fix_rejects_wrong_word_count() {
        let mut buf = BytesMut::new();
        PackedArray::new(4, 64).proto_encode(&mut buf);
        let mut decoded = PackedArray::new(0, 64);
        decoded.read_words(&mut buf.freeze()).unwrap();
        assert!(matches!(
            decoded.fix(5),
            Err(WorldError::LengthMismatch {
                got: 4,
                expected: 6
            })
        ));
        assert!(decoded.fix(4).is_ok());
    }

    #[test]
    fn read_words_rejects_oversized_count() {
        let mut buf = BytesMut::new();
        VarInt(65).proto_encode(&mut buf);
        let mut array = PackedArray::new(0, 64);
        assert!(array.read_words(&mut buf.freeze()).is_err());
    }
}
