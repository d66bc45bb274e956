//! The Java NBT tag model.

use std::collections::HashMap;
use std::fmt;

/// Named children of a compound tag.
pub type NbtCompound = HashMap<String, NbtTag>;

/// The root compound of an NBT document. Unnamed framing leaves `name` empty.
#[derive(Debug, Clone, PartialEq)]
pub struct NbtRoot {
    pub name: String,
    pub compound: NbtCompound,
}

impl NbtRoot {
    pub fn new(name: impl Into<String>, compound: NbtCompound) -> Self {
        Self {
            name: name.into(),
            compound,
        }
    }
}

pub const TAG_END: u8 = 0;
pub const TAG_BYTE: u8 = 1;
pub const TAG_SHORT: u8 = 2;
pub const TAG_INT: u8 = 3;
pub const TAG_LONG: u8 = 4;
pub const TAG_FLOAT: u8 = 5;
pub const TAG_DOUBLE: u8 = 6;
pub const TAG_BYTE_ARRAY: u8 = 7;
pub const TAG_STRING: u8 = 8;
pub const TAG_LIST: u8 = 9;
pub const TAG_COMPOUND: u8 = 10;
pub const TAG_INT_ARRAY: u8 = 11;
pub const TAG_LONG_ARRAY: u8 = 12;

#[derive(Debug, Clone, PartialEq)]
pub enum NbtTag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(Vec<NbtTag>),
    Compound(NbtCompound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

/// Scalar accessors return a copy, container accessors a borrow.
macro_rules! accessors {
    (copy: $($copy_fn:ident => $copy_variant:ident: $copy_ty:ty),* ;
     borrow: $($ref_fn:ident => $ref_variant:ident: $ref_ty:ty),* $(,)?) => {
        impl NbtTag {
            $(
                pub fn $copy_fn(&self) -> Option<$copy_ty> {
                    match self {
                        NbtTag::$copy_variant(v) => Some(*v),
                        _ => None,
                    }
                }
            )*
            $(
                pub fn $ref_fn(&self) -> Option<&$ref_ty> {
                    match self {
                        NbtTag::$ref_variant(v) => Some(v),
                        _ => None,
                    }
                }
            )*
        }
    };
}

accessors! {
    copy:
        as_byte => Byte: i8,
        as_short => Short: i16,
        as_int => Int: i32,
        as_long => Long: i64,
        as_float => Float: f32,
        as_double => Double: f64;
    borrow:
        as_string => String: str,
        as_compound => Compound: NbtCompound,
        as_list => List: [NbtTag],
        as_byte_array => ByteArray: [i8],
        as_int_array => IntArray: [i32],
        as_long_array => LongArray: [i64],
}

impl NbtTag {
    /// Wire type id of this tag.
    pub fn tag_type_id(&self) -> u8 {
        match self {
            NbtTag::Byte(_) => TAG_BYTE,
            NbtTag::Short(_) => TAG_SHORT,
            NbtTag::Int(_) => TAG_INT,
            NbtTag::Long(_) => TAG_LONG,
            NbtTag::Float(_) => TAG_FLOAT,
            NbtTag::Double(_) => TAG_DOUBLE,
            NbtTag::ByteArray(_) => TAG_BYTE_ARRAY,
            NbtTag::String(_) => TAG_STRING,
            NbtTag::List(_) => TAG_LIST,
            NbtTag::Compound(_) => TAG_COMPOUND,
            NbtTag::IntArray(_) => TAG_INT_ARRAY,
            NbtTag::LongArray(_) => TAG_LONG_ARRAY,
        }
    }

    /// Any integral tag, widened. Saves do not always agree on the width
    /// of a field.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            NbtTag::Byte(v) => Some(v.into()),
            NbtTag::Short(v) => Some(v.into()),
            NbtTag::Int(v) => Some(v.into()),
            NbtTag::Long(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for NbtTag {
                fn from(v: $ty) -> Self {
                    NbtTag::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
    NbtCompound => Compound,
    Vec<i64> => LongArray,
}

impl From<&str> for NbtTag {
    fn from(v: &str) -> Self {
        NbtTag::String(v.to_owned())
    }
}

/// SNBT-like summary; arrays and containers show only their size.
impl fmt::Display for NbtTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NbtTag::Byte(v) => write!(f, "{v}b"),
            NbtTag::Short(v) => write!(f, "{v}s"),
            NbtTag::Int(v) => write!(f, "{v}"),
            NbtTag::Long(v) => write!(f, "{v}L"),
            NbtTag::Float(v) => write!(f, "{v}f"),
            NbtTag::Double(v) => write!(f, "{v}d"),
            NbtTag::String(v) => write!(f, "{v:?}"),
            NbtTag::ByteArray(v) => write!(f, "[B; {}]", v.len()),
            NbtTag::IntArray(v) => write!(f, "[I; {}]", v.len()),
            NbtTag::LongArray(v) => write!(f, "[L; {}]", v.len()),
            NbtTag::List(v) => write!(f, "[{}]", v.len()),
            NbtTag::Compound(v) => write!(f, "{{{}}}", v.len()),
        }
    }
}
