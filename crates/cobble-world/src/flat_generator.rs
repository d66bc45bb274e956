//! Flat world chunk generator.
//!
//! Stacks the configured layers upward from the bottom of the column. The
//! classic preset is:
//! - 1 × bedrock
//! - 2 × dirt
//! - 1 × grass block
//! - air above

use crate::biome::{Biome, BiomeRegistry};
use crate::block_state::{BlockState, BlockStateRegistry};
use crate::chunk::{Chunk, ChunkStatus, HeightMaps};
use crate::error::WorldError;
use crate::section::{block_index, Section};

/// A run of identical blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatLayer {
    pub block: BlockState,
    pub height: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatSettings {
    /// Bottom layer first.
    pub layers: Vec<FlatLayer>,
    pub biome: Biome,
}

impl FlatSettings {
    /// Bedrock, two dirt, grass, on plains.
    pub fn classic(blocks: &BlockStateRegistry, biomes: &BiomeRegistry) -> Result<Self, WorldError> {
        let block = |name: &str| {
            blocks
                .default_state(name)
                .ok_or_else(|| WorldError::UnknownBlock(name.to_string()))
        };
        Ok(Self {
            layers: vec![
                FlatLayer { block: block("bedrock")?, height: 1 },
                FlatLayer { block: block("dirt")?, height: 2 },
                FlatLayer { block: block("grass_block")?, height: 1 },
            ],
            biome: biomes
                .by_name("plains")
                .ok_or_else(|| WorldError::UnknownBiome("plains".into()))?,
        })
    }

    /// Total layer height in blocks.
    pub fn height(&self) -> usize {
        self.layers.iter().map(|l| l.height).sum()
    }
}

/// Generate a flat column of `section_count` sections. Layers above the
/// top of the column are cut off.
pub fn generate_flat_chunk(settings: &FlatSettings, section_count: usize) -> Chunk {
    let mut chunk = Chunk::empty(section_count);
    for section in &mut chunk.sections {
        *section = Section::filled(BlockState::AIR, settings.biome);
    }
    let column_height = section_count * 16;

    let mut y = 0;
    for layer in &settings.layers {
        for _ in 0..layer.height {
            if y >= column_height {
                break;
            }
            let section = &mut chunk.sections[y / 16];
            for z in 0..16 {
                for x in 0..16 {
                    section.set_block(block_index(x, y % 16, z), layer.block);
                }
            }
            y += 1;
        }
    }

    let surface = settings.height().min(column_height) as u32;
    chunk.heightmaps = HeightMaps::uniform(section_count, surface);
    chunk.status = ChunkStatus::Full;
    chunk
}
