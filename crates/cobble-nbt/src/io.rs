//! Big-endian NBT read/write engine.

use bytes::{Buf, BufMut};

use crate::error::NbtError;
use crate::tag::*;

/// Maximum nesting depth to prevent stack overflow.
const MAX_DEPTH: usize = 512;

/// How the root compound is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Framing {
    /// Type byte, name, payload. Disk files and the network before 1.20.2.
    Named,
    /// Type byte, payload. The network from 1.20.2 onwards.
    Unnamed,
}

// -----------------------------------------------------------------------
// Reading
// -----------------------------------------------------------------------

pub(crate) fn read_root(buf: &mut impl Buf, framing: Framing) -> Result<NbtRoot, NbtError> {
    ensure_remaining(buf, 1)?;
    let tag_type = buf.get_u8();
    if tag_type != TAG_COMPOUND {
        return Err(NbtError::ExpectedCompound { got: tag_type });
    }
    let name = match framing {
        Framing::Named => read_string(buf)?,
        Framing::Unnamed => String::new(),
    };
    let compound = read_compound(buf, 0)?;
    Ok(NbtRoot { name, compound })
}

fn read_tag(buf: &mut impl Buf, tag_type: u8, depth: usize) -> Result<NbtTag, NbtError> {
    if depth > MAX_DEPTH {
        return Err(NbtError::NestingTooDeep { limit: MAX_DEPTH });
    }

    match tag_type {
        TAG_BYTE => {
            ensure_remaining(buf, 1)?;
            Ok(NbtTag::Byte(buf.get_i8()))
        }
        TAG_SHORT => {
            ensure_remaining(buf, 2)?;
            Ok(NbtTag::Short(buf.get_i16()))
        }
        TAG_INT => {
            ensure_remaining(buf, 4)?;
            Ok(NbtTag::Int(buf.get_i32()))
        }
        TAG_LONG => {
            ensure_remaining(buf, 8)?;
            Ok(NbtTag::Long(buf.get_i64()))
        }
        TAG_FLOAT => {
            ensure_remaining(buf, 4)?;
            Ok(NbtTag::Float(buf.get_f32()))
        }
        TAG_DOUBLE => {
            ensure_remaining(buf, 8)?;
            Ok(NbtTag::Double(buf.get_f64()))
        }
        TAG_BYTE_ARRAY => {
            let len = read_array_len(buf)?;
            ensure_remaining(buf, len)?;
            Ok(NbtTag::ByteArray((0..len).map(|_| buf.get_i8()).collect()))
        }
        TAG_STRING => Ok(NbtTag::String(read_string(buf)?)),
        TAG_LIST => {
            ensure_remaining(buf, 1)?;
            let element_type = buf.get_u8();
            let len = read_array_len(buf)?;
            if element_type == TAG_END && len > 0 {
                return Err(NbtError::UnknownTagType(TAG_END));
            }
            // Every element is at least one byte, so this bounds the allocation.
            ensure_remaining(buf, len)?;
            let mut list = Vec::with_capacity(len);
            for _ in 0..len {
                list.push(read_tag(buf, element_type, depth + 1)?);
            }
            Ok(NbtTag::List(list))
        }
        TAG_COMPOUND => Ok(NbtTag::Compound(read_compound(buf, depth + 1)?)),
        TAG_INT_ARRAY => {
            let len = read_array_len(buf)?;
            ensure_remaining(buf, len * 4)?;
            Ok(NbtTag::IntArray((0..len).map(|_| buf.get_i32()).collect()))
        }
        TAG_LONG_ARRAY => {
            let len = read_array_len(buf)?;
            ensure_remaining(buf, len * 8)?;
            Ok(NbtTag::LongArray((0..len).map(|_| buf.get_i64()).collect()))
        }
        _ => Err(NbtError::UnknownTagType(tag_type)),
    }
}

fn read_compound(buf: &mut impl Buf, depth: usize) -> Result<NbtCompound, NbtError> {
    if depth > MAX_DEPTH {
        return Err(NbtError::NestingTooDeep { limit: MAX_DEPTH });
    }
    let mut map = NbtCompound::new();
    loop {
        ensure_remaining(buf, 1)?;
        let tag_type = buf.get_u8();
        if tag_type == TAG_END {
            break;
        }
        let name = read_string(buf)?;
        let tag = read_tag(buf, tag_type, depth)?;
        map.insert(name, tag);
    }
    Ok(map)
}

fn read_array_len(buf: &mut impl Buf) -> Result<usize, NbtError> {
    ensure_remaining(buf, 4)?;
    let len = buf.get_i32();
    if len < 0 {
        return Err(NbtError::NegativeLength(len));
    }
    Ok(len as usize)
}

fn read_string(buf: &mut impl Buf) -> Result<String, NbtError> {
    ensure_remaining(buf, 2)?;
    let len = buf.get_u16() as usize;
    ensure_remaining(buf, len)?;
    let data = buf.copy_to_bytes(len);
    String::from_utf8(data.to_vec()).map_err(|_| NbtError::InvalidUtf8)
}

fn ensure_remaining(buf: &impl Buf, needed: usize) -> Result<(), NbtError> {
    if buf.remaining() < needed {
        Err(NbtError::UnexpectedEof)
    } else {
        Ok(())
    }
}

// -----------------------------------------------------------------------
// Writing
// -----------------------------------------------------------------------

pub(crate) fn write_root(buf: &mut impl BufMut, root: &NbtRoot, framing: Framing) {
    buf.put_u8(TAG_COMPOUND);
    if framing == Framing::Named {
        write_string(buf, &root.name);
    }
    write_compound(buf, &root.compound);
}

fn write_tag(buf: &mut impl BufMut, tag: &NbtTag) {
    match tag {
        NbtTag::Byte(v) => buf.put_i8(*v),
        NbtTag::Short(v) => buf.put_i16(*v),
        NbtTag::Int(v) => buf.put_i32(*v),
        NbtTag::Long(v) => buf.put_i64(*v),
        NbtTag::Float(v) => buf.put_f32(*v),
        NbtTag::Double(v) => buf.put_f64(*v),
        NbtTag::ByteArray(arr) => {
            buf.put_i32(arr.len() as i32);
            for &b in arr {
                buf.put_i8(b);
            }
        }
        NbtTag::String(s) => write_string(buf, s),
        NbtTag::List(list) => {
            let element_type = list.first().map_or(TAG_END, NbtTag::tag_type_id);
            buf.put_u8(element_type);
            buf.put_i32(list.len() as i32);
            for item in list {
                write_tag(buf, item);
            }
        }
        NbtTag::Compound(map) => write_compound(buf, map),
        NbtTag::IntArray(arr) => {
            buf.put_i32(arr.len() as i32);
            for &v in arr {
                buf.put_i32(v);
            }
        }
        NbtTag::LongArray(arr) => {
            buf.put_i32(arr.len() as i32);
            for &v in arr {
                buf.put_i64(v);
            }
        }
    }
}

fn write_compound(buf: &mut impl BufMut, map: &NbtCompound) {
    // Entries are written in name order.
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    for (name, tag) in entries {
        buf.put_u8(tag.tag_type_id());
        write_string(buf, name);
        write_tag(buf, tag);
    }
    buf.put_u8(TAG_END);
}

fn write_string(buf: &mut impl BufMut, s: &str) {
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
}
