//! Light section of the chunk-data packet.
//!
//! The light engine tracks one section above and one below the world, so a
//! chunk with `n` sections has `n + 2` light sections and chunk section `i`
//! sits at mask bit `i + 1`.

use bytes::{Buf, BufMut};
use cobble_proto::codec::{read_byte_array, read_length, write_byte_array, ProtoDecode, ProtoEncode};
use cobble_proto::error::ProtoError;
use cobble_proto::types::{BitSet, VarInt};

use crate::error::WorldError;
use crate::section::{Section, LIGHT_ARRAY_LEN};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LightData {
    /// Only present before protocol 763.
    pub trust_edges: Option<bool>,
    pub sky_mask: BitSet,
    pub block_mask: BitSet,
    pub empty_sky_mask: BitSet,
    pub empty_block_mask: BitSet,
    pub sky_light: Vec<Vec<u8>>,
    pub block_light: Vec<Vec<u8>>,
}

impl LightData {
    /// Collect the light arrays present on `sections`.
    pub fn from_sections(sections: &[Section], trust_edges: Option<bool>) -> Self {
        let light_sections = sections.len() + 2;
        let mut light = LightData {
            trust_edges,
            sky_mask: BitSet::with_bits(light_sections),
            block_mask: BitSet::with_bits(light_sections),
            ..Default::default()
        };
        for (i, section) in sections.iter().enumerate() {
            if let Some(sky) = &section.sky_light {
                light.sky_mask.set(i + 1, true);
                light.sky_light.push(sky.clone());
            }
            if let Some(block) = &section.block_light {
                light.block_mask.set(i + 1, true);
                light.block_light.push(block.clone());
            }
        }
        light.empty_sky_mask = empty_mask(&light.sky_mask, light_sections);
        light.empty_block_mask = empty_mask(&light.block_mask, light_sections);
        light
    }

    /// Hand the arrays back to their sections. Light for the two sections
    /// outside the world is dropped.
    pub fn apply_to(&self, sections: &mut [Section]) -> Result<(), WorldError> {
        let sky = distribute(&self.sky_mask, &self.sky_light, sections.len())?;
        let block = distribute(&self.block_mask, &self.block_light, sections.len())?;
        for ((section, sky), block) in sections.iter_mut().zip(sky).zip(block) {
            section.sky_light = sky;
            section.block_light = block;
        }
        Ok(())
    }

    /// Decode, reading the leading trust-edges flag only when the protocol
    /// version still sends it.
    pub fn read(buf: &mut impl Buf, with_trust_edges: bool) -> Result<Self, ProtoError> {
        let trust_edges = if with_trust_edges {
            Some(bool::proto_decode(buf)?)
        } else {
            None
        };
        Ok(Self {
            trust_edges,
            sky_mask: BitSet::proto_decode(buf)?,
            block_mask: BitSet::proto_decode(buf)?,
            empty_sky_mask: BitSet::proto_decode(buf)?,
            empty_block_mask: BitSet::proto_decode(buf)?,
            sky_light: read_arrays(buf)?,
            block_light: read_arrays(buf)?,
        })
    }
}

/// Bits `0..light_sections` that are clear in `mask`.
fn empty_mask(mask: &BitSet, light_sections: usize) -> BitSet {
    let mut empty = mask.complement();
    for bit in light_sections..empty.0.len() * 64 {
        empty.set(bit, false);
    }
    empty
}

fn distribute(
    mask: &BitSet,
    arrays: &[Vec<u8>],
    section_count: usize,
) -> Result<Vec<Option<Vec<u8>>>, WorldError> {
    let mut arrays = arrays.iter();
    let mut out = vec![None; section_count];
    for bit in 0..section_count + 2 {
        if !mask.get(bit) {
            continue;
        }
        let array = arrays.next().ok_or_else(|| {
            ProtoError::InvalidData(format!("light mask bit {bit} has no array"))
        })?;
        if (1..=section_count).contains(&bit) {
            out[bit - 1] = Some(array.clone());
        }
    }
    if arrays.next().is_some() {
        return Err(ProtoError::InvalidData("more light arrays than mask bits".into()).into());
    }
    Ok(out)
}

fn read_arrays(buf: &mut impl Buf) -> Result<Vec<Vec<u8>>, ProtoError> {
    let count = read_length(buf)?;
    if count > BitSet::MAX_WORDS {
        return Err(ProtoError::LengthTooLarge {
            len: count,
            max: BitSet::MAX_WORDS,
        });
    }
    (0..count)
        .map(|_| {
            let array = read_byte_array(buf)?;
            if array.len() != LIGHT_ARRAY_LEN {
                return Err(ProtoError::InvalidData(format!(
                    "light array of {} bytes, expected {LIGHT_ARRAY_LEN}",
                    array.len()
                )));
            }
            Ok(array)
        })
        .collect()
}

fn write_arrays(buf: &mut impl BufMut, arrays: &[Vec<u8>]) {
    VarInt(arrays.len() as i32).proto_encode(buf);
    for array in arrays {
        write_byte_array(buf, array);
    }
}

impl ProtoEncode for LightData {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        if let Some(trust) = self.trust_edges {
            trust.proto_encode(buf);
        }
        self.sky_mask.proto_encode(buf);
        self.block_mask.proto_encode(buf);
        self.empty_sky_mask.proto_encode(buf);
        self.empty_block_mask.proto_encode(buf);
        write_arrays(buf, &self.sky_light);
        write_arrays(buf, &self.block_light);
    }
}
