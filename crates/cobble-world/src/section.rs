//! A 16×16×16 chunk section: block states, biomes, and optional light.

use bytes::{Buf, BufMut};
use cobble_proto::codec::{ensure_remaining, ProtoDecode, ProtoEncode};
use cobble_proto::error::ProtoError;
use tracing::trace;

use crate::biome::{Biome, BiomeRegistry};
use crate::block_state::{BlockState, BlockStateRegistry};
use crate::container::{BiomeContainer, BlockStateContainer};
use crate::error::WorldError;
use crate::save::{SaveBiomes, SaveBlockState, SaveBlockStates, SaveSection};

/// Block states per section.
pub const BLOCKS_PER_SECTION: usize = 16 * 16 * 16;

/// Biome cells per section (4×4×4 blocks each).
pub const BIOMES_PER_SECTION: usize = 4 * 4 * 4;

/// Bytes in one light array: 4096 nibbles.
pub const LIGHT_ARRAY_LEN: usize = 2048;

/// Index of a block within a section, `0 <= x, y, z < 16`.
pub fn block_index(x: usize, y: usize, z: usize) -> usize {
    debug_assert!(x < 16 && y < 16 && z < 16);
    (y << 8) | (z << 4) | x
}

/// Index of a biome cell within a section, `0 <= x, y, z < 4`.
pub fn biome_index(x: usize, y: usize, z: usize) -> usize {
    debug_assert!(x < 4 && y < 4 && z < 4);
    (y << 4) | (z << 2) | x
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Section {
    block_count: i16,
    states: BlockStateContainer,
    biomes: BiomeContainer,
    /// Half a byte per block. `None` when the light engine never wrote it.
    pub sky_light: Option<Vec<u8>>,
    pub block_light: Option<Vec<u8>>,
}

impl Section {
    /// All air, biome 0, no light.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every block set to `state` and every biome cell to `biome`.
    pub fn filled(state: BlockState, biome: Biome) -> Self {
        Self {
            block_count: if state.is_air() {
                0
            } else {
                BLOCKS_PER_SECTION as i16
            },
            states: BlockStateContainer::filled(state),
            biomes: BiomeContainer::filled(biome),
            sky_light: None,
            block_light: None,
        }
    }

    /// Number of non-air blocks.
    pub fn block_count(&self) -> i16 {
        self.block_count
    }

    pub fn block_states(&self) -> &BlockStateContainer {
        &self.states
    }

    pub fn biomes(&self) -> &BiomeContainer {
        &self.biomes
    }

    pub fn get_block(&self, index: usize) -> BlockState {
        self.states.get(index)
    }

    /// Set one block, keeping the block count. Air is judged by
    /// [`BlockStateRegistry::global`].
    pub fn set_block(&mut self, index: usize, state: BlockState) {
        if !self.states.get(index).is_air() {
            self.block_count -= 1;
        }
        if !state.is_air() {
            self.block_count += 1;
        }
        self.states.set(index, state);
    }

    pub fn get_biome(&self, index: usize) -> Biome {
        self.biomes.get(index)
    }

    pub fn set_biome(&mut self, index: usize, biome: Biome) {
        self.biomes.set(index, biome);
    }

    /// Count non-air blocks from scratch and store the result.
    pub fn recount_blocks(&mut self) -> i16 {
        self.recount_blocks_in(BlockStateRegistry::global())
    }

    /// As [`recount_blocks`](Self::recount_blocks), with air taken from `blocks`.
    pub fn recount_blocks_in(&mut self, blocks: &BlockStateRegistry) -> i16 {
        self.block_count = self.states.iter().filter(|&s| !blocks.is_air(s)).count() as i16;
        self.block_count
    }

    // -----------------------------------------------------------------------
    // Save format
    // -----------------------------------------------------------------------

    /// Convert a saved section. Missing block states load as air and
    /// missing biomes as plains; the block count is always recomputed.
    pub fn from_save(
        save: &SaveSection,
        blocks: &BlockStateRegistry,
        biomes: &BiomeRegistry,
    ) -> Result<Self, WorldError> {
        let states = match &save.block_states {
            Some(saved) => {
                let palette = saved
                    .palette
                    .iter()
                    .map(|entry| resolve_state(entry, blocks))
                    .collect::<Result<Vec<_>, _>>()?;
                BlockStateContainer::from_external(palette, saved.data.clone())?
            }
            None => BlockStateContainer::new(),
        };

        let biome_container = match &save.biomes {
            Some(saved) => {
                let palette = saved
                    .palette
                    .iter()
                    .map(|name| {
                        biomes
                            .by_name(name)
                            .ok_or_else(|| WorldError::UnknownBiome(name.clone()))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                BiomeContainer::from_external(palette, saved.data.clone())?
            }
            None => BiomeContainer::filled(
                biomes
                    .by_name("plains")
                    .ok_or_else(|| WorldError::UnknownBiome("minecraft:plains".into()))?,
            ),
        };

        let mut section = Self {
            block_count: 0,
            states,
            biomes: biome_container,
            sky_light: check_light(&save.sky_light)?,
            block_light: check_light(&save.block_light)?,
        };
        section.recount_blocks_in(blocks);
        trace!(
            y = save.y,
            blocks = section.block_count,
            states = %section.states.strategy(),
            biomes = %section.biomes.strategy(),
            "section loaded"
        );
        Ok(section)
    }

    /// Convert to the saved layout at section height `y`.
    pub fn to_save(
        &self,
        y: i8,
        blocks: &BlockStateRegistry,
        biomes: &BiomeRegistry,
    ) -> Result<SaveSection, WorldError> {
        let (states, data) = self.states.to_external();
        let palette = states
            .into_iter()
            .map(|state| {
                let info = blocks
                    .info(state)
                    .ok_or(WorldError::UnregisteredBlockState(state.0))?;
                Ok(SaveBlockState {
                    name: info.name.clone(),
                    properties: info.properties.iter().cloned().collect(),
                })
            })
            .collect::<Result<Vec<_>, WorldError>>()?;

        let (biome_values, biome_data) = self.biomes.to_external();
        let biome_palette = biome_values
            .into_iter()
            .map(|biome| {
                biomes
                    .name(biome)
                    .map(str::to_string)
                    .ok_or(WorldError::UnregisteredBiome(biome.0))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SaveSection {
            y,
            block_states: Some(SaveBlockStates { palette, data }),
            biomes: Some(SaveBiomes {
                palette: biome_palette,
                data: biome_data,
            }),
            sky_light: self.sky_light.clone(),
            block_light: self.block_light.clone(),
        })
    }
}

fn resolve_state(entry: &SaveBlockState, blocks: &BlockStateRegistry) -> Result<BlockState, WorldError> {
    if let Some(state) = blocks.state_of(&entry.name, &entry.properties) {
        return Ok(state);
    }
    if blocks.default_state(&entry.name).is_none() {
        return Err(WorldError::UnknownBlock(entry.name.clone()));
    }
    let properties = entry
        .properties
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");
    Err(WorldError::UnknownBlockState {
        name: entry.name.clone(),
        properties,
    })
}

fn check_light(light: &Option<Vec<u8>>) -> Result<Option<Vec<u8>>, WorldError> {
    match light {
        Some(bytes) if bytes.len() != LIGHT_ARRAY_LEN => Err(WorldError::LightArrayLength(bytes.len())),
        other => Ok(other.clone()),
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

impl ProtoEncode for Section {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i16(self.block_count);
        self.states.proto_encode(buf);
        self.biomes.proto_encode(buf);
    }
}

impl ProtoDecode for Section {
    /// Light travels separately on the wire, so decoded sections have none.
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 2)?;
        let block_count = buf.get_i16();
        let states = BlockStateContainer::proto_decode(buf)?;
        let biomes = BiomeContainer::proto_decode(buf)?;
        Ok(Self {
            block_count,
            states,
            biomes,
            sky_light: None,
            block_light: None,
        })
    }
}
