//! Packet envelopes for the play state.

pub mod chunk_data;

pub use chunk_data::ChunkDataAndLight;
