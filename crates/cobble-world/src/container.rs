//! Palette containers: a palette plus a packed array of codes, growing
//! through the palette variants as distinct values are added.

use std::collections::HashMap;
use std::fmt::Debug;
use std::marker::PhantomData;

use bytes::{Buf, BufMut};
use cobble_proto::codec::{ensure_remaining, ProtoDecode, ProtoEncode};
use cobble_proto::error::ProtoError;
use tracing::{debug, trace};

use crate::biome::{Biome, BITS_PER_BIOME};
use crate::block_state::{BlockState, BITS_PER_BLOCK};
use crate::error::WorldError;
use crate::packed_array::{bit_width, words_needed, PackedArray};
use crate::palette::{Lookup, Palette, PaletteValue, Strategy};

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// What a container stores and how its palette grows.
pub trait PaletteKind: Debug + Clone + PartialEq {
    type Value: PaletteValue;

    /// Number of slots.
    const LEN: usize;
    /// Bits per value once the container goes global.
    const GLOBAL_BITS: u32;
    /// Narrowest width written for an explicit list in save data.
    const MIN_SAVE_BITS: u32;
    const NAME: &'static str;

    fn default_value() -> Self::Value;

    /// Width actually used for a requested width.
    fn canonical_bits(raw: u32) -> u32;

    /// Fresh palette for a requested width.
    fn create_palette(raw: u32) -> Palette<Self::Value>;
}

/// 16×16×16 block states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockStates;

impl PaletteKind for BlockStates {
    type Value = BlockState;

    const LEN: usize = 16 * 16 * 16;
    const GLOBAL_BITS: u32 = BITS_PER_BLOCK;
    const MIN_SAVE_BITS: u32 = 4;
    const NAME: &'static str = "block_states";

    fn default_value() -> BlockState {
        BlockState::AIR
    }

    fn canonical_bits(raw: u32) -> u32 {
        match raw {
            0 => 0,
            1..=4 => 4,
            5..=8 => raw,
            _ => BITS_PER_BLOCK,
        }
    }

    fn create_palette(raw: u32) -> Palette<BlockState> {
        match raw {
            0 => Palette::Single(BlockState::AIR),
            1..=4 => Palette::linear(4),
            5..=8 => Palette::hashed(raw),
            _ => Palette::Global,
        }
    }
}

/// 4×4×4 biomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Biomes;

impl PaletteKind for Biomes {
    type Value = Biome;

    const LEN: usize = 4 * 4 * 4;
    const GLOBAL_BITS: u32 = BITS_PER_BIOME;
    const MIN_SAVE_BITS: u32 = 1;
    const NAME: &'static str = "biomes";

    fn default_value() -> Biome {
        Biome(0)
    }

    fn canonical_bits(raw: u32) -> u32 {
        match raw {
            0 => 0,
            1..=3 => raw,
            _ => BITS_PER_BIOME,
        }
    }

    fn create_palette(raw: u32) -> Palette<Biome> {
        match raw {
            0 => Palette::Single(Biome(0)),
            1..=3 => Palette::linear(raw),
            _ => Palette::Global,
        }
    }
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PalettedContainer<K: PaletteKind> {
    bits: u32,
    palette: Palette<K::Value>,
    data: PackedArray,
    kind: PhantomData<K>,
}

pub type BlockStateContainer = PalettedContainer<BlockStates>;
pub type BiomeContainer = PalettedContainer<Biomes>;

impl<K: PaletteKind> PalettedContainer<K> {
    /// Every slot holds the kind's default value.
    pub fn new() -> Self {
        Self::filled(K::default_value())
    }

    /// Every slot holds `value`.
    pub fn filled(value: K::Value) -> Self {
        Self {
            bits: 0,
            palette: Palette::Single(value),
            data: PackedArray::new(0, K::LEN),
            kind: PhantomData,
        }
    }

    /// Empty container laid out for a requested width.
    fn with_raw_bits(raw: u32) -> Self {
        let bits = K::canonical_bits(raw);
        Self {
            bits,
            palette: K::create_palette(raw),
            data: PackedArray::new(bits, K::LEN),
            kind: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        K::LEN
    }

    pub fn is_empty(&self) -> bool {
        K::LEN == 0
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn strategy(&self) -> Strategy {
        self.palette.strategy()
    }

    /// Distinct values in code order; empty once global.
    pub fn palette(&self) -> &[K::Value] {
        self.palette.export()
    }

    /// The packed codes, verbatim.
    pub fn raw(&self) -> &[u64] {
        self.data.raw()
    }

    pub fn get(&self, index: usize) -> K::Value {
        self.palette.value(self.data.get(index))
    }

    pub fn set(&mut self, index: usize, value: K::Value) {
        match self.palette.id(value) {
            Lookup::Found(code) => self.data.set(index, code),
            Lookup::Resize(raw) => self.grow(raw, index, value),
        }
    }

    /// Iterate over every slot in index order.
    pub fn iter(&self) -> impl Iterator<Item = K::Value> + '_ {
        self.data.iter().map(move |code| self.palette.value(code))
    }

    fn grow(&mut self, raw: u32, index: usize, value: K::Value) {
        let mut grown = Self::with_raw_bits(raw);
        for i in 0..K::LEN {
            grown.set_without_growing(i, self.get(i));
        }
        grown.set_without_growing(index, value);
        debug!(
            kind = K::NAME,
            from = %self.strategy(),
            to = %grown.strategy(),
            bits = grown.bits,
            "palette container resized"
        );
        *self = grown;
    }

    fn set_without_growing(&mut self, index: usize, value: K::Value) {
        match self.palette.id(value) {
            Lookup::Found(code) => self.data.set(index, code),
            Lookup::Resize(raw) => unreachable!(
                "{} container at {} bits asked to grow to {raw} while copying",
                K::NAME,
                self.bits
            ),
        }
    }

    fn check_codes(&self) -> Result<(), WorldError> {
        if self.strategy() == Strategy::Global {
            return Ok(());
        }
        let len = self.palette.export().len();
        match self.data.iter().find(|&code| !self.palette.contains_code(code)) {
            Some(code) => Err(WorldError::InvalidPaletteCode { code, len }),
            None => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Save format
    // -----------------------------------------------------------------------

    /// Build from a save-format palette list and packed words.
    ///
    /// The stored width follows from the list length, never from the word
    /// count: at 64 slots, 3 and 4 bits both need 4 words.
    pub fn from_external(values: Vec<K::Value>, words: Vec<u64>) -> Result<Self, WorldError> {
        if values.is_empty() {
            return Err(WorldError::EmptyPalette);
        }
        if values.len() == 1 {
            if !words.is_empty() {
                return Err(WorldError::LengthMismatch {
                    got: words.len(),
                    expected: 0,
                });
            }
            return Ok(Self::filled(values[0]));
        }

        let raw = save_bits::<K>(values.len());
        let expected = words_needed(raw, K::LEN);
        if words.len() != expected {
            return Err(WorldError::LengthMismatch {
                got: words.len(),
                expected,
            });
        }

        let mut container = Self::with_raw_bits(raw);
        if container.strategy() == Strategy::Global {
            return Self::from_wide_list(values, words);
        }
        container.palette.fill(values)?;
        container.data = PackedArray::with_words(container.bits, K::LEN, words)?;
        container.check_codes()?;
        trace!(
            kind = K::NAME,
            strategy = %container.strategy(),
            bits = container.bits,
            "loaded container from save data"
        );
        Ok(container)
    }

    /// Save data wider than any list palette still indexes an explicit list.
    /// Re-encode it against the global palette.
    fn from_wide_list(values: Vec<K::Value>, words: Vec<u64>) -> Result<Self, WorldError> {
        let list_bits = save_bits::<K>(values.len());
        let source = PackedArray::with_words(list_bits, K::LEN, words)?;
        let mut container = Self::with_raw_bits(K::GLOBAL_BITS);
        for (i, code) in source.iter().enumerate() {
            let value = values.get(code as usize).ok_or(WorldError::InvalidPaletteCode {
                code,
                len: values.len(),
            })?;
            container.set(i, *value);
        }
        debug!(
            kind = K::NAME,
            entries = values.len(),
            list_bits,
            "loaded wide save palette as global"
        );
        Ok(container)
    }

    /// Save-format palette list and packed words.
    ///
    /// Words are always written at the list width, so a container decoded
    /// from the wire at a wider width is repacked.
    pub fn to_external(&self) -> (Vec<K::Value>, Vec<u64>) {
        let (values, codes) = if self.strategy() == Strategy::Global {
            let mut values = Vec::new();
            let mut ids = HashMap::new();
            let codes: Vec<u32> = self
                .iter()
                .map(|value| {
                    *ids.entry(value).or_insert_with(|| {
                        values.push(value);
                        values.len() as u32 - 1
                    })
                })
                .collect();
            (values, codes)
        } else {
            let values = self.palette.export().to_vec();
            let bits = save_bits::<K>(values.len());
            if values.len() == 1 || bits == self.bits {
                let words = if values.len() == 1 {
                    Vec::new()
                } else {
                    self.data.raw().to_vec()
                };
                return (values, words);
            }
            (values, self.data.iter().collect())
        };
        if values.len() == 1 {
            return (values, Vec::new());
        }

        let mut packed = PackedArray::new(save_bits::<K>(values.len()), K::LEN);
        for (i, code) in codes.into_iter().enumerate() {
            packed.set(i, code);
        }
        (values, packed.into_raw())
    }
}

/// Width of an explicit save list with `entries` values.
fn save_bits<K: PaletteKind>(entries: usize) -> u32 {
    K::MIN_SAVE_BITS.max(bit_width(entries.saturating_sub(1) as u32))
}

impl<K: PaletteKind> Default for PalettedContainer<K> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

impl<K: PaletteKind> ProtoEncode for PalettedContainer<K> {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.bits as u8);
        self.palette.proto_encode(buf);
        self.data.proto_encode(buf);
    }
}

impl<K: PaletteKind> ProtoDecode for PalettedContainer<K> {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 1)?;
        let raw = buf.get_u8() as u32;
        let mut container = Self::with_raw_bits(raw);
        container.palette.read_from(buf)?;
        container.data.read_words(buf)?;
        container
            .data
            .fix(container.bits)
            .and_then(|()| container.check_codes())
            .map_err(|e| ProtoError::InvalidData(format!("{}: {e}", K::NAME)))?;
        Ok(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use cobble_proto::types::VarInt;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn roundtrip<K: PaletteKind>(container: &PalettedContainer<K>) -> PalettedContainer<K> {
        let mut buf = BytesMut::new();
        container.proto_encode(&mut buf);
        let mut bytes = buf.freeze();
        let decoded = PalettedContainer::<K>::proto_decode(&mut bytes).unwrap();
        assert!(bytes.is_empty(), "trailing bytes after container");
        decoded
    }

    fn encoded<K: PaletteKind>(container: &PalettedContainer<K>) -> Vec<u8> {
        let mut buf = BytesMut::new();
        container.proto_encode(&mut buf);
        buf.to_vec()
    }

    fn states_with(distinct: u32) -> BlockStateContainer {
        let mut c = BlockStateContainer::new();
        for i in 0..distinct {
            c.set(i as usize, BlockState(i + 1));
        }
        c
    }

    #[test]
    fn canonical_bit_tables() {
        let states: Vec<u32> = (0..=10).map(BlockStates::canonical_bits).collect();
        assert_eq!(states, [0, 4, 4, 4, 4, 5, 6, 7, 8, 15, 15]);
        let biomes: Vec<u32> = (0..=5).map(Biomes::canonical_bits).collect();
        assert_eq!(biomes, [0, 1, 2, 3, 6, 6]);
    }

    #[test]
    fn new_container_is_zero_bit_single() {
        let c = BlockStateContainer::new();
        assert_eq!(c.bits(), 0);
        assert_eq!(c.strategy(), Strategy::SingleValue);
        assert!(c.raw().is_empty());
        assert_eq!(c.get(4095), BlockState::AIR);
        // u8 bits, VarInt value, VarInt word count.
        assert_eq!(encoded(&c), vec![0, 0, 0]);
    }

    #[test]
    fn filled_container_encoding() {
        let c = BiomeContainer::filled(Biome::PLAINS);
        assert_eq!(encoded(&c), vec![0, 39, 0]);
        assert_eq!(roundtrip(&c), c);
    }

    #[test]
    fn second_value_promotes_to_linear() {
        let mut c = BlockStateContainer::new();
        c.set(10, BlockState(5));
        assert_eq!(c.strategy(), Strategy::Linear);
        assert_eq!(c.bits(), 4);
        assert_eq!(c.palette(), &[BlockState::AIR, BlockState(5)]);
        assert_eq!(c.raw().len(), 256);
        assert_eq!(c.get(10), BlockState(5));
        assert_eq!(c.get(11), BlockState::AIR);
    }

    #[test]
    fn seventeenth_block_state_promotes_to_hashed() {
        let mut c = states_with(15);
        assert_eq!(c.palette().len(), 16);
        assert_eq!(c.strategy(), Strategy::Linear);

        c.set(100, BlockState(1000));
        assert_eq!(c.strategy(), Strategy::Hashed);
        assert_eq!(c.bits(), 5);
        assert_eq!(c.palette().len(), 17);
        assert_eq!(c.raw().len(), 342);
        for i in 0..15 {
            assert_eq!(c.get(i), BlockState(i as u32 + 1));
        }
        assert_eq!(c.get(100), BlockState(1000));
        assert_eq!(c.get(4095), BlockState::AIR);
    }

    #[test]
    fn block_states_go_global_past_eight_bits() {
        let mut c = states_with(255);
        assert_eq!(c.palette().len(), 256);
        assert_eq!(c.strategy(), Strategy::Hashed);
        assert_eq!(c.bits(), 8);

        c.set(300, BlockState(4000));
        assert_eq!(c.strategy(), Strategy::Global);
        assert_eq!(c.bits(), BITS_PER_BLOCK);
        assert!(c.palette().is_empty());
        assert_eq!(c.raw().len(), 1024);
        assert_eq!(c.get(254), BlockState(255));
        assert_eq!(c.get(255), BlockState::AIR);
        assert_eq!(c.get(300), BlockState(4000));
    }

    #[test]
    fn ninth_biome_promotes_to_global() {
        let mut c = BiomeContainer::new();
        for i in 1..8 {
            c.set(i, Biome(i as u32));
        }
        assert_eq!(c.strategy(), Strategy::Linear);
        assert_eq!(c.bits(), 3);
        assert_eq!(c.palette().len(), 8);

        c.set(8, Biome(8));
        assert_eq!(c.strategy(), Strategy::Global);
        assert_eq!(c.bits(), BITS_PER_BIOME);
        for i in 0..9 {
            assert_eq!(c.get(i), Biome(i as u32));
        }
    }

    #[test]
    fn biome_linear_grows_one_bit_at_a_time() {
        let mut c = BiomeContainer::new();
        c.set(0, Biome(5));
        assert_eq!(c.bits(), 1);
        c.set(1, Biome(6));
        assert_eq!(c.bits(), 2);
        c.set(2, Biome(7));
        c.set(3, Biome(8));
        assert_eq!(c.bits(), 3);
        assert_eq!(c.palette().len(), 5);
    }

    #[test]
    fn resize_preserves_random_contents() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut c = BlockStateContainer::new();
        let mut expected = vec![BlockState::AIR; 4096];
        for _ in 0..20_000 {
            let index = rng.gen_range(0..4096);
            let value = BlockState(rng.gen_range(0..600));
            c.set(index, value);
            expected[index] = value;
        }
        assert!(c.iter().eq(expected.iter().copied()));
        assert_eq!(roundtrip(&c), c);
    }

    #[test]
    fn encoding_is_idempotent_in_every_state() {
        let single = BlockStateContainer::filled(BlockState(9));
        let linear = states_with(3);
        let hashed = states_with(40);
        let global = states_with(300);
        assert_eq!(hashed.strategy(), Strategy::Hashed);
        assert_eq!(global.strategy(), Strategy::Global);

        for c in [single, linear, hashed, global] {
            let once = encoded(&c);
            let twice = encoded(&roundtrip(&c));
            assert_eq!(once, twice, "{}", c.strategy());
        }
    }

    #[test]
    fn decode_canonicalizes_narrow_widths() {
        // Two bits on the wire still means a four-bit linear palette.
        let mut buf = BytesMut::new();
        buf.put_u8(2);
        buf.extend_from_slice(&[2, 0, 7]);
        let words = crate::packed_array::words_needed(4, 4096);
        PackedArray::new(4, 4096).proto_encode(&mut buf);
        let c = BlockStateContainer::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(c.bits(), 4);
        assert_eq!(c.raw().len(), words);
        assert_eq!(c.palette(), &[BlockState(0), BlockState(7)]);
    }

    #[test]
    fn decode_rejects_wrong_word_count() {
        let mut buf = BytesMut::new();
        buf.put_u8(4);
        buf.extend_from_slice(&[1, 0]);
        PackedArray::new(5, 4096).proto_encode(&mut buf);
        assert!(BlockStateContainer::proto_decode(&mut buf.freeze()).is_err());
    }

    #[test]
    fn decode_rejects_codes_past_palette() {
        let mut data = PackedArray::new(4, 4096);
        data.set(0, 3);
        let mut buf = BytesMut::new();
        buf.put_u8(4);
        buf.extend_from_slice(&[2, 0, 1]);
        data.proto_encode(&mut buf);
        let err = BlockStateContainer::proto_decode(&mut buf.freeze()).unwrap_err();
        assert!(matches!(err, ProtoError::InvalidData(_)));
    }

    #[test]
    fn decode_truncated_fails() {
        let c = states_with(20);
        let bytes = encoded(&c);
        let mut cut = bytes::Bytes::from(bytes[..bytes.len() - 3].to_vec());
        assert!(BlockStateContainer::proto_decode(&mut cut).is_err());
    }

    // -- Save format --

    #[test]
    fn external_single_value() {
        let c = BiomeContainer::from_external(vec![Biome::PLAINS], vec![]).unwrap();
        assert_eq!(c.strategy(), Strategy::SingleValue);
        assert_eq!(c.get(63), Biome::PLAINS);
        assert_eq!(c.to_external(), (vec![Biome::PLAINS], vec![]));
    }

    #[test]
    fn external_empty_palette_is_an_error() {
        assert!(matches!(
            BlockStateContainer::from_external(vec![], vec![]),
            Err(WorldError::EmptyPalette)
        ));
    }

    #[test]
    fn external_round_trip_keeps_words() {
        for c in [states_with(5), states_with(100)] {
            let (values, words) = c.to_external();
            let loaded = BlockStateContainer::from_external(values.clone(), words.clone()).unwrap();
            assert_eq!(loaded.strategy(), c.strategy());
            assert_eq!(loaded.to_external(), (values, words));
            assert!(loaded.iter().eq(c.iter()));
        }
    }

    #[test]
    fn external_three_bit_biomes_load_as_linear() {
        let mut c = BiomeContainer::new();
        for i in 0..6 {
            c.set(i * 10, Biome(i as u32 + 1));
        }
        assert_eq!((c.strategy(), c.bits()), (Strategy::Linear, 3));

        let (values, words) = c.to_external();
        assert_eq!(values.len(), 7);
        assert_eq!(words.len(), 4);
        let loaded = BiomeContainer::from_external(values.clone(), words.clone()).unwrap();
        assert_eq!((loaded.strategy(), loaded.bits()), (Strategy::Linear, 3));
        assert_eq!(loaded.palette(), &values[..]);
        assert_eq!(loaded.to_external(), (values, words));
        assert!(loaded.iter().eq(c.iter()));
    }

    #[test]
    fn external_four_bit_biome_list_goes_global() {
        let values: Vec<Biome> = (0..9).map(Biome).collect();
        let mut data = PackedArray::new(4, 64);
        for i in 0..64 {
            data.set(i, (i % 9) as u32);
        }
        let loaded = BiomeContainer::from_external(values, data.into_raw()).unwrap();
        assert_eq!((loaded.strategy(), loaded.bits()), (Strategy::Global, 6));
        assert_eq!(loaded.get(10), Biome(1));
    }

    #[test]
    fn external_repacks_wide_wire_containers() {
        // A sender may use 8 bits for a three-entry palette.
        let mut data = PackedArray::new(8, 4096);
        data.set(0, 1);
        data.set(4095, 2);
        let mut buf = BytesMut::new();
        buf.put_u8(8);
        VarInt(3).proto_encode(&mut buf);
        for id in [0, 7, 9] {
            VarInt(id).proto_encode(&mut buf);
        }
        data.proto_encode(&mut buf);
        let wire = BlockStateContainer::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!((wire.strategy(), wire.bits()), (Strategy::Hashed, 8));

        let (values, words) = wire.to_external();
        assert_eq!(values, [BlockState(0), BlockState(7), BlockState(9)]);
        assert_eq!(words.len(), 256);
        let loaded = BlockStateContainer::from_external(values, words).unwrap();
        assert_eq!(loaded.strategy(), Strategy::Linear);
        assert!(loaded.iter().eq(wire.iter()));
    }

    #[test]
    fn external_global_repacks_explicit_list() {
        let c = states_with(300);
        let (values, words) = c.to_external();
        assert_eq!(values.len(), 301);
        // 301 entries need 9 bits, 7 per word.
        assert_eq!(words.len(), 586);

        let loaded = BlockStateContainer::from_external(values, words).unwrap();
        assert_eq!(loaded.strategy(), Strategy::Global);
        assert!(loaded.iter().eq(c.iter()));
    }

    #[test]
    fn external_global_biomes_use_narrow_list() {
        let mut c = BiomeContainer::new();
        for i in 0..10 {
            c.set(i, Biome(i as u32 * 3));
        }
        assert_eq!(c.strategy(), Strategy::Global);
        let (values, words) = c.to_external();
        assert_eq!(values.len(), 10);
        assert_eq!(words.len(), 4);
        let loaded = BiomeContainer::from_external(values, words).unwrap();
        assert!(loaded.iter().eq(c.iter()));
    }

    #[test]
    fn external_global_with_one_value_saves_single() {
        let mut c = states_with(300);
        for i in 0..4096 {
            c.set(i, BlockState(2));
        }
        assert_eq!(c.strategy(), Strategy::Global);
        assert_eq!(c.to_external(), (vec![BlockState(2)], vec![]));
    }

    #[test]
    fn external_rejects_mismatched_words() {
        assert!(matches!(
            BlockStateContainer::from_external(vec![BlockState(1), BlockState(2)], vec![0; 64]),
            Err(WorldError::LengthMismatch { .. })
        ));
        assert!(matches!(
            BlockStateContainer::from_external(vec![BlockState(1)], vec![0; 1]),
            Err(WorldError::LengthMismatch { got: 1, expected: 0 })
        ));
    }

    #[test]
    fn external_rejects_dangling_codes() {
        let mut data = PackedArray::new(4, 4096);
        data.set(9, 2);
        let err = BlockStateContainer::from_external(
            vec![BlockState(1), BlockState(2)],
            data.into_raw(),
        )
        .unwrap_err();
        assert!(matches!(err, WorldError::InvalidPaletteCode { code: 2, len: 2 }));
    }
}
