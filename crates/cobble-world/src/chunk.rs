//! Chunk columns: sections, heightmaps, block entities, and light.

use std::collections::BTreeMap;
use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use cobble_nbt::{read_nbt, write_nbt, NbtCompound, NbtRoot, NbtTag};
use cobble_proto::codec::{read_byte_array, read_length, write_byte_array, ProtoDecode, ProtoEncode};
use cobble_proto::error::ProtoError;
use cobble_proto::packets::ChunkDataAndLight;
use cobble_proto::types::{ChunkPos, VarInt};
use serde::Serialize;
use tracing::{debug, trace};

use crate::biome::{namespaced, BiomeRegistry};
use crate::block_entity::BlockEntity;
use crate::block_state::BlockStateRegistry;
use crate::error::WorldError;
use crate::light::LightData;
use crate::packed_array::{bit_width, PackedArray};
use crate::save::SaveChunk;
use crate::section::Section;

/// Sections in a default overworld column (Y -64 to 319).
pub const OVERWORLD_SECTION_COUNT: usize = 24;

/// Section Y of the lowest overworld section.
pub const OVERWORLD_MIN_SECTION: i32 = -4;

/// Upper bound on block entities accepted from one packet.
const MAX_BLOCK_ENTITIES: usize = 1 << 16;

// ---------------------------------------------------------------------------
// ChunkStatus
// ---------------------------------------------------------------------------

/// Generation stage of a chunk, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    #[default]
    Empty,
    StructureStarts,
    StructureReferences,
    Biomes,
    Noise,
    Surface,
    Carvers,
    LiquidCarvers,
    Features,
    Light,
    Spawn,
    Heightmaps,
    Full,
}

impl ChunkStatus {
    pub const ALL: [ChunkStatus; 13] = [
        ChunkStatus::Empty,
        ChunkStatus::StructureStarts,
        ChunkStatus::StructureReferences,
        ChunkStatus::Biomes,
        ChunkStatus::Noise,
        ChunkStatus::Surface,
        ChunkStatus::Carvers,
        ChunkStatus::LiquidCarvers,
        ChunkStatus::Features,
        ChunkStatus::Light,
        ChunkStatus::Spawn,
        ChunkStatus::Heightmaps,
        ChunkStatus::Full,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ChunkStatus::Empty => "empty",
            ChunkStatus::StructureStarts => "structure_starts",
            ChunkStatus::StructureReferences => "structure_references",
            ChunkStatus::Biomes => "biomes",
            ChunkStatus::Noise => "noise",
            ChunkStatus::Surface => "surface",
            ChunkStatus::Carvers => "carvers",
            ChunkStatus::LiquidCarvers => "liquid_carvers",
            ChunkStatus::Features => "features",
            ChunkStatus::Light => "light",
            ChunkStatus::Spawn => "spawn",
            ChunkStatus::Heightmaps => "heightmaps",
            ChunkStatus::Full => "full",
        }
    }

    /// Parse a status name, with or without the `minecraft:` prefix.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.strip_prefix("minecraft:").unwrap_or(name);
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// HeightMaps
// ---------------------------------------------------------------------------

/// Bits per heightmap entry for a column of `section_count` sections.
pub fn height_bits(section_count: usize) -> u32 {
    bit_width((section_count * 16 + 1) as u32)
}

/// Per-column heights, 16×16 entries each, indexed `z * 16 + x`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightMaps {
    pub world_surface_wg: PackedArray,
    pub world_surface: PackedArray,
    pub ocean_floor_wg: PackedArray,
    pub ocean_floor: PackedArray,
    pub motion_blocking: PackedArray,
    pub motion_blocking_no_leaves: PackedArray,
}

impl HeightMaps {
    pub const WORLD_SURFACE_WG: &'static str = "WORLD_SURFACE_WG";
    pub const WORLD_SURFACE: &'static str = "WORLD_SURFACE";
    pub const OCEAN_FLOOR_WG: &'static str = "OCEAN_FLOOR_WG";
    pub const OCEAN_FLOOR: &'static str = "OCEAN_FLOOR";
    pub const MOTION_BLOCKING: &'static str = "MOTION_BLOCKING";
    pub const MOTION_BLOCKING_NO_LEAVES: &'static str = "MOTION_BLOCKING_NO_LEAVES";

    /// All heights zero.
    pub fn new(section_count: usize) -> Self {
        let empty = PackedArray::new(height_bits(section_count), 256);
        Self {
            world_surface_wg: empty.clone(),
            world_surface: empty.clone(),
            ocean_floor_wg: empty.clone(),
            ocean_floor: empty.clone(),
            motion_blocking: empty.clone(),
            motion_blocking_no_leaves: empty,
        }
    }

    /// Every entry of every map set to `height`.
    pub fn uniform(section_count: usize, height: u32) -> Self {
        let mut maps = Self::new(section_count);
        for (_, map) in maps.entries_mut() {
            for i in 0..256 {
                map.set(i, height);
            }
        }
        maps
    }

    pub fn entries(&self) -> [(&'static str, &PackedArray); 6] {
        [
            (Self::WORLD_SURFACE_WG, &self.world_surface_wg),
            (Self::WORLD_SURFACE, &self.world_surface),
            (Self::OCEAN_FLOOR_WG, &self.ocean_floor_wg),
            (Self::OCEAN_FLOOR, &self.ocean_floor),
            (Self::MOTION_BLOCKING, &self.motion_blocking),
            (Self::MOTION_BLOCKING_NO_LEAVES, &self.motion_blocking_no_leaves),
        ]
    }

    pub fn entries_mut(&mut self) -> [(&'static str, &mut PackedArray); 6] {
        [
            (Self::WORLD_SURFACE_WG, &mut self.world_surface_wg),
            (Self::WORLD_SURFACE, &mut self.world_surface),
            (Self::OCEAN_FLOOR_WG, &mut self.ocean_floor_wg),
            (Self::OCEAN_FLOOR, &mut self.ocean_floor),
            (Self::MOTION_BLOCKING, &mut self.motion_blocking),
            (Self::MOTION_BLOCKING_NO_LEAVES, &mut self.motion_blocking_no_leaves),
        ]
    }

    /// Load from the save layout. Absent maps stay zero.
    fn from_words(section_count: usize, maps: &BTreeMap<String, Vec<u64>>) -> Result<Self, WorldError> {
        let bits = height_bits(section_count);
        let mut heightmaps = Self::new(section_count);
        for (name, map) in heightmaps.entries_mut() {
            if let Some(words) = maps.get(name) {
                *map = PackedArray::with_words(bits, 256, words.clone())?;
            }
        }
        Ok(heightmaps)
    }

    /// The two maps clients receive, as the packet's root compound.
    fn to_packet_nbt(&self) -> NbtCompound {
        let mut compound = NbtCompound::new();
        for (name, map) in [
            (Self::MOTION_BLOCKING, &self.motion_blocking),
            (Self::WORLD_SURFACE, &self.world_surface),
        ] {
            compound.insert(
                name.into(),
                NbtTag::LongArray(map.raw().iter().map(|&w| w as i64).collect()),
            );
        }
        compound
    }
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub sections: Vec<Section>,
    pub heightmaps: HeightMaps,
    pub block_entities: Vec<BlockEntity>,
    pub status: ChunkStatus,
    /// Sent ahead of the light data before protocol 763.
    pub trust_edges: Option<bool>,
}

impl Chunk {
    /// `section_count` empty sections, zero heightmaps, status `empty`.
    pub fn empty(section_count: usize) -> Self {
        Self {
            sections: vec![Section::new(); section_count],
            heightmaps: HeightMaps::new(section_count),
            block_entities: Vec::new(),
            status: ChunkStatus::Empty,
            trust_edges: None,
        }
    }

    /// Wire bytes of every section, back to back.
    pub fn data(&self) -> Bytes {
        let mut buf = BytesMut::new();
        for section in &self.sections {
            section.proto_encode(&mut buf);
        }
        buf.freeze()
    }

    /// Replace every section from bytes produced by [`Chunk::data`]. Light
    /// already on the sections is kept.
    pub fn put_data(&mut self, mut data: &[u8]) -> Result<(), ProtoError> {
        for section in &mut self.sections {
            let decoded = Section::proto_decode(&mut data)?;
            let sky_light = section.sky_light.take();
            let block_light = section.block_light.take();
            *section = decoded;
            section.sky_light = sky_light;
            section.block_light = block_light;
        }
        if data.has_remaining() {
            return Err(ProtoError::InvalidData(format!(
                "{} bytes left after {} sections",
                data.remaining(),
                self.sections.len()
            )));
        }
        Ok(())
    }

    /// Decode a chunk-data packet body for a column of `section_count`
    /// sections. Only the heightmaps sent to clients are restored.
    pub fn read_body(
        buf: &mut impl Buf,
        section_count: usize,
        with_trust_edges: bool,
    ) -> Result<Self, WorldError> {
        let mut chunk = Self::empty(section_count);
        chunk.status = ChunkStatus::Full;

        let root = read_nbt(buf)?;
        let bits = height_bits(section_count);
        for (name, map) in [
            (HeightMaps::MOTION_BLOCKING, &mut chunk.heightmaps.motion_blocking),
            (HeightMaps::WORLD_SURFACE, &mut chunk.heightmaps.world_surface),
        ] {
            if let Some(tag) = root.compound.get(name) {
                let words = tag.as_long_array().ok_or_else(|| WorldError::WrongFieldType {
                    field: name.to_string(),
                    expected: "long array",
                })?;
                *map = PackedArray::with_words(bits, 256, words.iter().map(|&w| w as u64).collect())?;
            }
        }

        let data = read_byte_array(buf)?;
        chunk.put_data(&data)?;

        let count = read_length(buf)?;
        if count > MAX_BLOCK_ENTITIES {
            return Err(ProtoError::LengthTooLarge {
                len: count,
                max: MAX_BLOCK_ENTITIES,
            }
            .into());
        }
        chunk.block_entities = (0..count)
            .map(|_| BlockEntity::proto_decode(buf))
            .collect::<Result<_, _>>()?;

        let light = LightData::read(buf, with_trust_edges)?;
        light.apply_to(&mut chunk.sections)?;
        chunk.trust_edges = light.trust_edges;
        trace!(
            sections = section_count,
            block_entities = chunk.block_entities.len(),
            "chunk body decoded"
        );
        Ok(chunk)
    }

    /// Wrap the encoded body in a chunk-data packet for `pos`.
    pub fn to_packet(&self, pos: ChunkPos) -> ChunkDataAndLight {
        let mut body = BytesMut::new();
        self.proto_encode(&mut body);
        ChunkDataAndLight {
            pos,
            body: body.freeze(),
        }
    }

    // -----------------------------------------------------------------------
    // Save format
    // -----------------------------------------------------------------------

    /// Convert a stored chunk.
    ///
    /// The column holds one section per saved section that carries block or
    /// biome data. Light-only sections outside that range are dropped.
    pub fn from_save(
        save: &SaveChunk,
        blocks: &BlockStateRegistry,
        biomes: &BiomeRegistry,
    ) -> Result<Self, WorldError> {
        let count = save
            .sections
            .iter()
            .filter(|s| s.block_states.is_some() || s.biomes.is_some())
            .count();
        let mut chunk = Self::empty(count);

        for saved in &save.sections {
            let index = saved.y as i32 - save.y_pos;
            if index < 0 || index as usize >= count {
                if saved.block_states.is_none() && saved.biomes.is_none() {
                    trace!(y = saved.y, "skipping light-only edge section");
                    continue;
                }
                return Err(WorldError::SectionOutOfBounds {
                    y: saved.y as i32,
                    min: save.y_pos,
                    count,
                });
            }
            chunk.sections[index as usize] = Section::from_save(saved, blocks, biomes)?;
        }

        chunk.heightmaps = HeightMaps::from_words(count, &save.heightmaps)?;
        let pos = ChunkPos::new(save.x_pos, save.z_pos);
        chunk.block_entities = save
            .block_entities
            .iter()
            .map(|be| BlockEntity::from_save(be, pos))
            .collect::<Result<_, _>>()?;
        chunk.status = ChunkStatus::from_name(&save.status)
            .ok_or_else(|| WorldError::UnknownStatus(save.status.clone()))?;

        debug!(
            pos = %pos,
            sections = count,
            block_entities = chunk.block_entities.len(),
            status = %chunk.status,
            "chunk loaded from save"
        );
        Ok(chunk)
    }

    /// Write this chunk into `dst`, keeping its position, data version,
    /// and any fields this crate does not model.
    pub fn to_save(
        &self,
        dst: &mut SaveChunk,
        blocks: &BlockStateRegistry,
        biomes: &BiomeRegistry,
    ) -> Result<(), WorldError> {
        dst.sections = self
            .sections
            .iter()
            .enumerate()
            .map(|(i, section)| section.to_save((i as i32 + dst.y_pos) as i8, blocks, biomes))
            .collect::<Result<_, _>>()?;
        for (name, map) in self.heightmaps.entries() {
            dst.heightmaps.insert(name.to_string(), map.raw().to_vec());
        }
        let pos = ChunkPos::new(dst.x_pos, dst.z_pos);
        dst.block_entities = self
            .block_entities
            .iter()
            .map(|be| be.to_save(pos))
            .collect::<Result<_, _>>()?;
        dst.status = namespaced(self.status.name());
        Ok(())
    }
}

impl ProtoEncode for Chunk {
    /// Chunk-data packet body: heightmaps, section data, block entities,
    /// light.
    fn proto_encode(&self, buf: &mut impl BufMut) {
        write_nbt(buf, &NbtRoot::new("", self.heightmaps.to_packet_nbt()));
        write_byte_array(buf, &self.data());
        VarInt(self.block_entities.len() as i32).proto_encode(buf);
        for be in &self.block_entities {
            be.proto_encode(buf);
        }
        LightData::from_sections(&self.sections, self.trust_edges).proto_encode(buf);
    }
}
