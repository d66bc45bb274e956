//! NBT (Named Binary Tag) implementation for Minecraft Java Edition.
//!
//! All numbers are big-endian and strings carry a `u16` length. Two root
//! framings exist:
//! - **Named**: region files and chunk packets up to protocol 763 (1.20.1).
//! - **Unnamed**: network NBT from protocol 764 (1.20.2), where the root name is omitted.

pub mod error;
mod io;
pub mod tag;

pub use error::NbtError;
pub use tag::{NbtCompound, NbtRoot, NbtTag};

use bytes::{Buf, BufMut};

use io::Framing;

/// Read NBT whose root compound carries a name.
pub fn read_nbt(buf: &mut impl Buf) -> Result<NbtRoot, NbtError> {
    io::read_root(buf, Framing::Named)
}

/// Write NBT with a named root compound.
pub fn write_nbt(buf: &mut impl BufMut, root: &NbtRoot) {
    io::write_root(buf, root, Framing::Named)
}

/// Read NBT whose root compound has no name. The returned root name is empty.
pub fn read_nbt_unnamed(buf: &mut impl Buf) -> Result<NbtRoot, NbtError> {
    io::read_root(buf, Framing::Unnamed)
}

/// Write NBT without the root name. `root.name` is ignored.
pub fn write_nbt_unnamed(buf: &mut impl BufMut, root: &NbtRoot) {
    io::write_root(buf, root, Framing::Unnamed)
}
