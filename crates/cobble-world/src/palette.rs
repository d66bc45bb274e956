//! Value palettes: the mapping between stored values and the small codes
//! written into a [`PackedArray`](crate::packed_array::PackedArray).

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use bytes::{Buf, BufMut};
use cobble_proto::codec::{read_length, ProtoDecode, ProtoEncode};
use cobble_proto::error::ProtoError;
use cobble_proto::types::VarInt;

use crate::error::WorldError;

/// A value that can live in a palette. Its code is what a global palette stores directly.
pub trait PaletteValue: Copy + Eq + Hash + Debug {
    fn to_code(self) -> u32;
    fn from_code(code: u32) -> Self;
}

impl PaletteValue for u32 {
    fn to_code(self) -> u32 {
        self
    }

    fn from_code(code: u32) -> Self {
        code
    }
}

/// Outcome of asking a palette for a value's code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// The value has this code, possibly just assigned.
    Found(u32),
    /// The palette is full; the container must grow to this many bits.
    Resize(u32),
}

/// Which palette variant a container is currently using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    SingleValue,
    Linear,
    Hashed,
    Global,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Strategy::SingleValue => "single",
            Strategy::Linear => "linear",
            Strategy::Hashed => "hashed",
            Strategy::Global => "global",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Palette<V: PaletteValue> {
    /// Exactly one value, at code 0.
    Single(V),
    /// Append-only list searched front to back. Holds up to `2^bits` values.
    Linear { values: Vec<V>, bits: u32 },
    /// Like `Linear`, with a reverse index.
    Hashed {
        ids: HashMap<V, u32>,
        values: Vec<V>,
        bits: u32,
    },
    /// The value is its own code.
    Global,
}

impl<V: PaletteValue> Palette<V> {
    pub fn linear(bits: u32) -> Self {
        Palette::Linear {
            values: Vec::with_capacity(1 << bits),
            bits,
        }
    }

    pub fn hashed(bits: u32) -> Self {
        Palette::Hashed {
            ids: HashMap::with_capacity(1 << bits),
            values: Vec::with_capacity(1 << bits),
            bits,
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            Palette::Single(_) => Strategy::SingleValue,
            Palette::Linear { .. } => Strategy::Linear,
            Palette::Hashed { .. } => Strategy::Hashed,
            Palette::Global => Strategy::Global,
        }
    }

    /// Maximum number of distinct values, or `None` for the global palette.
    pub fn capacity(&self) -> Option<usize> {
        match self {
            Palette::Single(_) => Some(1),
            Palette::Linear { bits, .. } | Palette::Hashed { bits, .. } => Some(1 << bits),
            Palette::Global => None,
        }
    }

    /// The code for `value`, appending it when there is room.
    pub fn id(&mut self, value: V) -> Lookup {
        match self {
            Palette::Single(v) => {
                if *v == value {
                    Lookup::Found(0)
                } else {
                    // A second value needs at least one bit.
                    Lookup::Resize(1)
                }
            }
            Palette::Linear { values, bits } => {
                if let Some(i) = values.iter().position(|&v| v == value) {
                    return Lookup::Found(i as u32);
                }
                if values.len() < (1 << *bits) {
                    values.push(value);
                    Lookup::Found(values.len() as u32 - 1)
                } else {
                    Lookup::Resize(*bits + 1)
                }
            }
            Palette::Hashed { ids, values, bits } => {
                if let Some(&i) = ids.get(&value) {
                    return Lookup::Found(i);
                }
                if values.len() < (1 << *bits) {
                    let code = values.len() as u32;
                    ids.insert(value, code);
                    values.push(value);
                    Lookup::Found(code)
                } else {
                    Lookup::Resize(*bits + 1)
                }
            }
            Palette::Global => Lookup::Found(value.to_code()),
        }
    }

    /// # Panics
    ///
    /// If `code` was never handed out by this palette.
    pub fn value(&self, code: u32) -> V {
        match self {
            Palette::Single(v) => {
                assert!(code == 0, "single value palette: code {code} out of bounds");
                *v
            }
            Palette::Linear { values, .. } | Palette::Hashed { values, .. } => {
                match values.get(code as usize) {
                    Some(v) => *v,
                    None => panic!(
                        "palette code {code} out of bounds for {} entries",
                        values.len()
                    ),
                }
            }
            Palette::Global => V::from_code(code),
        }
    }

    /// Distinct values in code order. Empty for the global palette.
    pub fn export(&self) -> &[V] {
        match self {
            Palette::Single(v) => std::slice::from_ref(v),
            Palette::Linear { values, .. } | Palette::Hashed { values, .. } => values,
            Palette::Global => &[],
        }
    }

    /// Whether `code` maps to a value.
    pub fn contains_code(&self, code: u32) -> bool {
        match self {
            Palette::Single(_) => code == 0,
            Palette::Linear { values, .. } | Palette::Hashed { values, .. } => {
                (code as usize) < values.len()
            }
            Palette::Global => true,
        }
    }

    /// Replace the entries of a list palette with `list`, in order.
    /// The single value palette takes the first entry; the global palette ignores the list.
    pub fn fill(&mut self, list: Vec<V>) -> Result<(), WorldError> {
        let capacity = self.capacity();
        if let Some(capacity) = capacity {
            if list.len() > capacity {
                return Err(WorldError::PaletteOverflow {
                    len: list.len(),
                    capacity,
                });
            }
        }
        match self {
            Palette::Single(v) => {
                *v = *list.first().ok_or(WorldError::EmptyPalette)?;
            }
            Palette::Linear { values, .. } => *values = list,
            Palette::Hashed { ids, values, .. } => {
                ids.clear();
                for (i, &v) in list.iter().enumerate() {
                    ids.insert(v, i as u32);
                }
                *values = list;
            }
            Palette::Global => {}
        }
        Ok(())
    }

    /// Read this variant's wire form, replacing its entries.
    pub fn read_from(&mut self, buf: &mut impl Buf) -> Result<(), ProtoError> {
        let list = match self.strategy() {
            Strategy::SingleValue => vec![read_value(buf)?],
            Strategy::Linear | Strategy::Hashed => {
                let count = read_length(buf)?;
                let capacity = self.capacity().unwrap_or(0);
                if count > capacity {
                    return Err(ProtoError::LengthTooLarge {
                        len: count,
                        max: capacity,
                    });
                }
                (0..count)
                    .map(|_| read_value(buf))
                    .collect::<Result<Vec<V>, _>>()?
            }
            Strategy::Global => return Ok(()),
        };
        self.fill(list)
            .map_err(|e| ProtoError::InvalidData(e.to_string()))
    }
}

fn read_value<V: PaletteValue>(buf: &mut impl Buf) -> Result<V, ProtoError> {
    let code = VarInt::proto_decode(buf)?.0;
    if code < 0 {
        return Err(ProtoError::InvalidData(format!(
            "negative palette entry {code}"
        )));
    }
    Ok(V::from_code(code as u32))
}

impl<V: PaletteValue> ProtoEncode for Palette<V> {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        match self {
            Palette::Single(v) => VarInt(v.to_code() as i32).proto_encode(buf),
            Palette::Linear { values, .. } | Palette::Hashed { values, .. } => {
                VarInt(values.len() as i32).proto_encode(buf);
                for v in values {
                    VarInt(v.to_code() as i32).proto_encode(buf);
                }
            }
            Palette::Global => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn encode(palette: &Palette<u32>) -> Vec<u8> {
        let mut buf = BytesMut::new();
        palette.proto_encode(&mut buf);
        buf.to_vec()
    }

    #[test]
    fn single_value_lookup() {
        let mut p = Palette::Single(7u32);
        assert_eq!(p.id(7), Lookup::Found(0));
        assert_eq!(p.id(8), Lookup::Resize(1));
        assert_eq!(p.value(0), 7);
        assert_eq!(p.export(), &[7]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn single_value_bad_code_panics() {
        Palette::Single(7u32).value(1);
    }

    #[test]
    fn linear_assigns_sequential_codes() {
        let mut p = Palette::<u32>::linear(1);
        assert_eq!(p.id(40), Lookup::Found(0));
        assert_eq!(p.id(10), Lookup::Found(1));
        assert_eq!(p.id(40), Lookup::Found(0));
        assert_eq!(p.id(99), Lookup::Resize(2));
        assert_eq!(p.export(), &[40, 10]);
        assert_eq!(p.value(1), 10);
    }

    #[test]
    fn linear_capacity_is_two_to_the_bits() {
        let mut p = Palette::<u32>::linear(4);
        for v in 0..16 {
            assert_eq!(p.id(v + 100), Lookup::Found(v));
        }
        assert_eq!(p.id(200), Lookup::Resize(5));
        assert_eq!(p.export().len(), 16);
    }

    #[test]
    fn hashed_matches_linear_contract() {
        let mut p = Palette::<u32>::hashed(5);
        for v in 0..32 {
            assert_eq!(p.id(1000 - v), Lookup::Found(v));
        }
        assert_eq!(p.id(1000 - 17), Lookup::Found(17));
        assert_eq!(p.id(5), Lookup::Resize(6));
        assert_eq!(p.value(31), 1000 - 31);
    }

    #[test]
    fn global_is_identity() {
        let mut p = Palette::<u32>::Global;
        assert_eq!(p.id(12345), Lookup::Found(12345));
        assert_eq!(p.value(321), 321);
        assert!(p.export().is_empty());
    }

    #[test]
    fn wire_forms() {
        assert_eq!(encode(&Palette::Single(300)), vec![0xAC, 0x02]);
        assert!(encode(&Palette::Global).is_empty());

        let mut p = Palette::<u32>::linear(4);
        p.id(1);
        p.id(200);
        assert_eq!(encode(&p), vec![0x02, 0x01, 0xC8, 0x01]);
    }

    #[test]
    fn hashed_read_fills_index() {
        let mut buf = BytesMut::new();
        for b in [3u8, 9, 4, 7] {
            buf.extend_from_slice(&[b]);
        }
        let mut p = Palette::<u32>::hashed(5);
        p.read_from(&mut buf.freeze()).unwrap();
        assert_eq!(p.export(), &[9, 4, 7]);
        assert_eq!(p.id(4), Lookup::Found(1));
        assert_eq!(p.id(8), Lookup::Found(3));
    }

    #[test]
    fn read_rejects_overfull_list() {
        let mut buf = BytesMut::new();
        VarInt(3).proto_encode(&mut buf);
        for v in 0..3 {
            VarInt(v).proto_encode(&mut buf);
        }
        let mut p = Palette::<u32>::linear(1);
        assert!(p.read_from(&mut buf.freeze()).is_err());
    }

    #[test]
    fn fill_checks_capacity() {
        let mut p = Palette::<u32>::linear(2);
        assert!(p.fill(vec![1, 2, 3, 4]).is_ok());
        assert!(matches!(
            p.fill(vec![1, 2, 3, 4, 5]),
            Err(WorldError::PaletteOverflow { len: 5, capacity: 4 })
        ));
        let mut single = Palette::Single(0u32);
        assert!(matches!(single.fill(vec![]), Err(WorldError::EmptyPalette)));
    }
}
