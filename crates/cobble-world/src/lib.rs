//! Chunk storage for the Java edition: paletted containers, sections,
//! chunk columns, and their wire and save formats.

pub mod biome;
pub mod block_entity;
pub mod block_state;
pub mod chunk;
pub mod container;
pub mod error;
pub mod flat_generator;
pub mod light;
pub mod packed_array;
pub mod palette;
pub mod save;
pub mod section;

pub use biome::{Biome, BiomeRegistry};
pub use block_state::{BlockState, BlockStateRegistry};
pub use chunk::{Chunk, ChunkStatus, HeightMaps};
pub use container::{BiomeContainer, BlockStateContainer, PalettedContainer};
pub use error::WorldError;
pub use section::Section;
