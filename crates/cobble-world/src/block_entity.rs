//! Block entities carried alongside chunk sections.

use bytes::{Buf, BufMut};
use cobble_nbt::{read_nbt, write_nbt, NbtCompound, NbtRoot, NbtTag};
use cobble_proto::codec::{ensure_remaining, ProtoDecode, ProtoEncode};
use cobble_proto::error::ProtoError;
use cobble_proto::types::{ChunkPos, VarInt};

use crate::biome::namespaced;
use crate::error::WorldError;

/// Block entity type names in protocol id order.
pub static BLOCK_ENTITY_TYPES: &[&str] = &[
    "furnace",
    "chest",
    "trapped_chest",
    "ender_chest",
    "jukebox",
    "dispenser",
    "dropper",
    "sign",
    "hanging_sign",
    "mob_spawner",
    "piston",
    "brewing_stand",
    "enchanting_table",
    "end_portal",
    "beacon",
    "skull",
    "daylight_detector",
    "hopper",
    "comparator",
    "banner",
    "structure_block",
    "end_gateway",
    "command_block",
    "shulker_box",
    "bed",
    "conduit",
    "barrel",
    "smoker",
    "blast_furnace",
    "lectern",
    "bell",
    "jigsaw",
    "campfire",
    "beehive",
    "sculk_sensor",
    "calibrated_sculk_sensor",
    "sculk_catalyst",
    "sculk_shrieker",
    "chiseled_bookshelf",
    "brushable_block",
    "decorated_pot",
];

/// Protocol id of a block entity type. Accepts names with or without the
/// `minecraft:` prefix.
pub fn block_entity_type(name: &str) -> Option<i32> {
    let name = name.strip_prefix("minecraft:").unwrap_or(name);
    BLOCK_ENTITY_TYPES
        .iter()
        .position(|&t| t == name)
        .map(|id| id as i32)
}

/// Namespaced name of a block entity type id.
pub fn block_entity_name(kind: i32) -> Option<String> {
    usize::try_from(kind)
        .ok()
        .and_then(|i| BLOCK_ENTITY_TYPES.get(i))
        .map(|name| namespaced(name))
}

/// A block entity positioned inside its chunk.
///
/// `data` holds the entity's own fields; the `id`/`x`/`y`/`z` keys of the
/// save format live in `kind` and the position instead.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockEntity {
    /// Local X in the high nibble, local Z in the low nibble.
    pub xz: i8,
    pub y: i16,
    pub kind: i32,
    pub data: NbtCompound,
}

impl BlockEntity {
    /// `None` when `x` or `z` is outside `0..16`.
    pub fn new(x: i32, y: i16, z: i32, kind: i32, data: NbtCompound) -> Option<Self> {
        Some(Self {
            xz: pack_xz(x, z)?,
            y,
            kind,
            data,
        })
    }

    /// Local (x, z) within the chunk.
    pub fn local_xz(&self) -> (i32, i32) {
        let xz = self.xz as u8;
        (((xz >> 4) & 0xF) as i32, (xz & 0xF) as i32)
    }

    /// Convert one entry of a saved chunk's `block_entities` list.
    pub fn from_save(compound: &NbtCompound, pos: ChunkPos) -> Result<Self, WorldError> {
        let id = compound
            .get("id")
            .ok_or_else(|| WorldError::MissingField("id".into()))?
            .as_string()
            .ok_or_else(|| WorldError::WrongFieldType {
                field: "id".into(),
                expected: "string",
            })?;
        let kind = block_entity_type(id).ok_or_else(|| WorldError::UnknownBlockEntity(id.to_string()))?;

        let coord = |name: &str| -> Result<i32, WorldError> {
            compound
                .get(name)
                .ok_or_else(|| WorldError::MissingField(name.into()))?
                .as_int()
                .ok_or_else(|| WorldError::WrongFieldType {
                    field: name.into(),
                    expected: "int",
                })
        };
        let x = coord("x")? - pos.block_x_range().start;
        let z = coord("z")? - pos.block_z_range().start;
        let y = coord("y")? as i16;

        let mut data = compound.clone();
        for key in ["id", "x", "y", "z", "keepPacked"] {
            data.remove(key);
        }
        Self::new(x, y, z, kind, data).ok_or(WorldError::BlockEntityOutOfBounds { x, z })
    }

    /// The save-format compound, with absolute coordinates.
    pub fn to_save(&self, pos: ChunkPos) -> Result<NbtCompound, WorldError> {
        let name = block_entity_name(self.kind).ok_or(WorldError::UnregisteredBlockEntity(self.kind))?;
        let (x, z) = self.local_xz();
        let mut compound = self.data.clone();
        compound.insert("id".into(), NbtTag::String(name));
        compound.insert("x".into(), (pos.block_x_range().start + x).into());
        compound.insert("y".into(), (self.y as i32).into());
        compound.insert("z".into(), (pos.block_z_range().start + z).into());
        compound.insert("keepPacked".into(), 0i8.into());
        Ok(compound)
    }
}

fn pack_xz(x: i32, z: i32) -> Option<i8> {
    if !(0..16).contains(&x) || !(0..16).contains(&z) {
        return None;
    }
    Some((x << 4 | z) as u8 as i8)
}

impl ProtoEncode for BlockEntity {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        buf.put_i8(self.xz);
        buf.put_i16(self.y);
        VarInt(self.kind).proto_encode(buf);
        write_nbt(buf, &NbtRoot::new("", self.data.clone()));
    }
}

impl ProtoDecode for BlockEntity {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        ensure_remaining(buf, 3)?;
        let xz = buf.get_i8();
        let y = buf.get_i16();
        let kind = VarInt::proto_decode(buf)?.0;
        let data = read_nbt(buf)
            .map_err(|e| ProtoError::InvalidData(format!("block entity NBT: {e}")))?
            .compound;
        Ok(Self { xz, y, kind, data })
    }
}
