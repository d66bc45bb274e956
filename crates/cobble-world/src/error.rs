//! World-level errors: save-format conversion and chunk assembly.

use cobble_nbt::NbtError;
use cobble_proto::error::ProtoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("invalid length given for storage, got {got} words but expected {expected}")]
    LengthMismatch { got: usize, expected: usize },

    #[error("{0} bits per value is not supported")]
    InvalidBits(u32),

    #[error("palette is empty")]
    EmptyPalette,

    #[error("palette holds {len} entries but only {capacity} fit")]
    PaletteOverflow { len: usize, capacity: usize },

    #[error("palette code {code} out of range for a palette of {len} entries")]
    InvalidPaletteCode { code: u32, len: usize },

    #[error("unknown block id: {0}")]
    UnknownBlock(String),

    #[error("unknown block state: {name}[{properties}]")]
    UnknownBlockState { name: String, properties: String },

    #[error("block state {0} is not registered")]
    UnregisteredBlockState(u32),

    #[error("unknown biome: {0}")]
    UnknownBiome(String),

    #[error("biome {0} is not registered")]
    UnregisteredBiome(u32),

    #[error("unknown block entity type: {0}")]
    UnknownBlockEntity(String),

    #[error("block entity type {0} is not registered")]
    UnregisteredBlockEntity(i32),

    #[error("missing NBT field `{0}`")]
    MissingField(String),

    #[error("NBT field `{field}` should be {expected}")]
    WrongFieldType { field: String, expected: &'static str },

    #[error("section Y value {y} out of bounds for {count} sections starting at {min}")]
    SectionOutOfBounds { y: i32, min: i32, count: usize },

    #[error("light array must be 2048 bytes, got {0}")]
    LightArrayLength(usize),

    #[error("packing XZ ({x}, {z}) out of bounds")]
    BlockEntityOutOfBounds { x: i32, z: i32 },

    #[error("unknown chunk status: {0}")]
    UnknownStatus(String),

    #[error("invalid block report: {0}")]
    InvalidBlockReport(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Proto(#[from] ProtoError),

    #[error(transparent)]
    Nbt(#[from] NbtError),
}
