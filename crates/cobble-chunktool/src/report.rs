//! Human and JSON summaries of a checked chunk.

use std::fmt;

use cobble_proto::types::ChunkPos;
use cobble_world::container::{PaletteKind, PalettedContainer};
use cobble_world::palette::Strategy;
use cobble_world::save::SaveChunk;
use cobble_world::{Chunk, ChunkStatus};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ChunkReport {
    pub pos: ChunkPos,
    pub data_version: i32,
    pub status: ChunkStatus,
    pub sections: Vec<SectionReport>,
    pub block_entities: usize,
    pub packet_bytes: usize,
    pub wire_round_trip: bool,
}

#[derive(Debug, Serialize)]
pub struct SectionReport {
    pub y: i32,
    pub block_count: i16,
    pub block_states: ContainerReport,
    pub biomes: ContainerReport,
    pub sky_light: bool,
    pub block_light: bool,
}

#[derive(Debug, Serialize)]
pub struct ContainerReport {
    pub strategy: Strategy,
    pub bits: u32,
    /// `None` for the global palette.
    pub palette_len: Option<usize>,
}

impl ContainerReport {
    fn new<K: PaletteKind>(container: &PalettedContainer<K>) -> Self {
        let strategy = container.strategy();
        Self {
            strategy,
            bits: container.bits(),
            palette_len: (strategy != Strategy::Global).then(|| container.palette().len()),
        }
    }
}

impl ChunkReport {
    pub fn new(save: &SaveChunk, chunk: &Chunk, packet_bytes: usize, wire_round_trip: bool) -> Self {
        let sections = chunk
            .sections
            .iter()
            .enumerate()
            .map(|(i, section)| SectionReport {
                y: save.y_pos + i as i32,
                block_count: section.block_count(),
                block_states: ContainerReport::new(section.block_states()),
                biomes: ContainerReport::new(section.biomes()),
                sky_light: section.sky_light.is_some(),
                block_light: section.block_light.is_some(),
            })
            .collect();
        Self {
            pos: ChunkPos::new(save.x_pos, save.z_pos),
            data_version: save.data_version,
            status: chunk.status,
            sections,
            block_entities: chunk.block_entities.len(),
            packet_bytes,
            wire_round_trip,
        }
    }
}

impl fmt::Display for ContainerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.palette_len {
            Some(len) => write!(f, "{}/{}b/{len}", self.strategy, self.bits),
            None => write!(f, "{}/{}b", self.strategy, self.bits),
        }
    }
}

impl fmt::Display for ChunkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "chunk {} (data version {}, status {})",
            self.pos, self.data_version, self.status
        )?;
        for s in &self.sections {
            writeln!(
                f,
                "  y={:>3} blocks={:>4} states={} biomes={}{}{}",
                s.y,
                s.block_count,
                s.block_states,
                s.biomes,
                if s.sky_light { " sky" } else { "" },
                if s.block_light { " block" } else { "" },
            )?;
        }
        writeln!(f, "block entities: {}", self.block_entities)?;
        writeln!(
            f,
            "packet: {} bytes, round trip {}",
            self.packet_bytes,
            if self.wire_round_trip { "ok" } else { "FAILED" }
        )
    }
}
