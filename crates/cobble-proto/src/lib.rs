//! Minecraft Java Edition protocol primitives and packet envelopes.

pub mod codec;
pub mod error;
pub mod packets;
pub mod types;
