//! Typed view of the on-disk chunk NBT layout.
//!
//! These structs mirror the compound stored in region files: one
//! [`SaveChunk`] per chunk with its [`SaveSection`]s. They hold names and
//! packed words exactly as stored; resolving names to ids happens in
//! [`Section::from_save`](crate::section::Section::from_save).

use std::collections::BTreeMap;

use cobble_nbt::{NbtCompound, NbtTag};

use crate::error::WorldError;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SaveChunk {
    pub data_version: i32,
    pub x_pos: i32,
    pub y_pos: i32,
    pub z_pos: i32,
    pub status: String,
    pub sections: Vec<SaveSection>,
    /// Packed heightmaps keyed by vanilla name (`MOTION_BLOCKING`, ...).
    pub heightmaps: BTreeMap<String, Vec<u64>>,
    pub block_entities: Vec<NbtCompound>,
    /// Top-level fields this crate does not interpret, kept for write-back.
    pub extra: NbtCompound,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SaveSection {
    pub y: i8,
    pub block_states: Option<SaveBlockStates>,
    pub biomes: Option<SaveBiomes>,
    pub sky_light: Option<Vec<u8>>,
    pub block_light: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SaveBlockStates {
    pub palette: Vec<SaveBlockState>,
    pub data: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaveBlockState {
    pub name: String,
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaveBiomes {
    pub palette: Vec<String>,
    pub data: Vec<u64>,
}

const KNOWN_CHUNK_FIELDS: &[&str] = &[
    "DataVersion",
    "xPos",
    "yPos",
    "zPos",
    "Status",
    "sections",
    "Heightmaps",
    "block_entities",
];

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn field<'a>(compound: &'a NbtCompound, name: &str) -> Result<&'a NbtTag, WorldError> {
    compound
        .get(name)
        .ok_or_else(|| WorldError::MissingField(name.to_string()))
}

fn wrong(name: &str, expected: &'static str) -> WorldError {
    WorldError::WrongFieldType {
        field: name.to_string(),
        expected,
    }
}

fn int<T: TryFrom<i64>>(compound: &NbtCompound, name: &str, expected: &'static str) -> Result<T, WorldError> {
    field(compound, name)?
        .as_i64()
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| wrong(name, expected))
}

fn string(compound: &NbtCompound, name: &str) -> Result<String, WorldError> {
    field(compound, name)?
        .as_string()
        .map(str::to_string)
        .ok_or_else(|| wrong(name, "string"))
}

fn opt_compound<'a>(compound: &'a NbtCompound, name: &str) -> Result<Option<&'a NbtCompound>, WorldError> {
    compound
        .get(name)
        .map(|tag| tag.as_compound().ok_or_else(|| wrong(name, "compound")))
        .transpose()
}

fn opt_list<'a>(compound: &'a NbtCompound, name: &str) -> Result<&'a [NbtTag], WorldError> {
    match compound.get(name) {
        Some(tag) => tag.as_list().ok_or_else(|| wrong(name, "list")),
        None => Ok(&[]),
    }
}

fn longs(compound: &NbtCompound, name: &str) -> Result<Vec<u64>, WorldError> {
    match compound.get(name) {
        Some(tag) => tag
            .as_long_array()
            .map(|words| words.iter().map(|&w| w as u64).collect())
            .ok_or_else(|| wrong(name, "long array")),
        None => Ok(Vec::new()),
    }
}

fn opt_bytes(compound: &NbtCompound, name: &str) -> Result<Option<Vec<u8>>, WorldError> {
    compound
        .get(name)
        .map(|tag| {
            tag.as_byte_array()
                .map(|bytes| bytes.iter().map(|&b| b as u8).collect())
                .ok_or_else(|| wrong(name, "byte array"))
        })
        .transpose()
}

fn long_array(words: &[u64]) -> NbtTag {
    NbtTag::LongArray(words.iter().map(|&w| w as i64).collect())
}

fn byte_array(bytes: &[u8]) -> NbtTag {
    NbtTag::ByteArray(bytes.iter().map(|&b| b as i8).collect())
}

fn compounds<'a>(list: &'a [NbtTag], name: &str) -> Result<Vec<&'a NbtCompound>, WorldError> {
    list.iter()
        .map(|tag| tag.as_compound().ok_or_else(|| wrong(name, "list of compounds")))
        .collect()
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl SaveChunk {
    /// Read the root compound of a stored chunk.
    pub fn from_nbt(root: &NbtCompound) -> Result<Self, WorldError> {
        let sections = compounds(opt_list(root, "sections")?, "sections")?
            .into_iter()
            .map(SaveSection::from_nbt)
            .collect::<Result<Vec<_>, _>>()?;

        let mut heightmaps = BTreeMap::new();
        if let Some(maps) = opt_compound(root, "Heightmaps")? {
            for name in maps.keys() {
                heightmaps.insert(name.clone(), longs(maps, name)?);
            }
        }

        let block_entities = compounds(opt_list(root, "block_entities")?, "block_entities")?
            .into_iter()
            .cloned()
            .collect();

        let extra = root
            .iter()
            .filter(|(name, _)| !KNOWN_CHUNK_FIELDS.contains(&name.as_str()))
            .map(|(name, tag)| (name.clone(), tag.clone()))
            .collect();

        Ok(Self {
            data_version: int(root, "DataVersion", "int")?,
            x_pos: int(root, "xPos", "int")?,
            y_pos: int(root, "yPos", "int")?,
            z_pos: int(root, "zPos", "int")?,
            status: string(root, "Status")?,
            sections,
            heightmaps,
            block_entities,
            extra,
        })
    }

    pub fn to_nbt(&self) -> NbtCompound {
        let mut root = self.extra.clone();
        root.insert("DataVersion".into(), self.data_version.into());
        root.insert("xPos".into(), self.x_pos.into());
        root.insert("yPos".into(), self.y_pos.into());
        root.insert("zPos".into(), self.z_pos.into());
        root.insert("Status".into(), self.status.as_str().into());
        root.insert(
            "sections".into(),
            NbtTag::List(
                self.sections
                    .iter()
                    .map(|s| NbtTag::Compound(s.to_nbt()))
                    .collect(),
            ),
        );
        root.insert(
            "Heightmaps".into(),
            NbtTag::Compound(
                self.heightmaps
                    .iter()
                    .map(|(name, words)| (name.clone(), long_array(words)))
                    .collect(),
            ),
        );
        root.insert(
            "block_entities".into(),
            NbtTag::List(
                self.block_entities
                    .iter()
                    .cloned()
                    .map(NbtTag::Compound)
                    .collect(),
            ),
        );
        root
    }
}

impl SaveSection {
    pub fn from_nbt(compound: &NbtCompound) -> Result<Self, WorldError> {
        let block_states = opt_compound(compound, "block_states")?
            .map(SaveBlockStates::from_nbt)
            .transpose()?;
        let biomes = opt_compound(compound, "biomes")?
            .map(SaveBiomes::from_nbt)
            .transpose()?;
        Ok(Self {
            y: int(compound, "Y", "byte")?,
            block_states,
            biomes,
            sky_light: opt_bytes(compound, "SkyLight")?,
            block_light: opt_bytes(compound, "BlockLight")?,
        })
    }

    pub fn to_nbt(&self) -> NbtCompound {
        let mut compound = NbtCompound::new();
        compound.insert("Y".into(), self.y.into());
        if let Some(states) = &self.block_states {
            compound.insert("block_states".into(), NbtTag::Compound(states.to_nbt()));
        }
        if let Some(biomes) = &self.biomes {
            compound.insert("biomes".into(), NbtTag::Compound(biomes.to_nbt()));
        }
        if let Some(light) = &self.sky_light {
            compound.insert("SkyLight".into(), byte_array(light));
        }
        if let Some(light) = &self.block_light {
            compound.insert("BlockLight".into(), byte_array(light));
        }
        compound
    }
}

impl SaveBlockStates {
    pub fn from_nbt(compound: &NbtCompound) -> Result<Self, WorldError> {
        let palette = compounds(opt_list(compound, "palette")?, "palette")?
            .into_iter()
            .map(SaveBlockState::from_nbt)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            palette,
            data: longs(compound, "data")?,
        })
    }

    /// `data` is omitted when empty, as vanilla does for single-entry palettes.
    pub fn to_nbt(&self) -> NbtCompound {
        let mut compound = NbtCompound::new();
        compound.insert(
            "palette".into(),
            NbtTag::List(
                self.palette
                    .iter()
                    .map(|s| NbtTag::Compound(s.to_nbt()))
                    .collect(),
            ),
        );
        if !self.data.is_empty() {
            compound.insert("data".into(), long_array(&self.data));
        }
        compound
    }
}

impl SaveBlockState {
    pub fn from_nbt(compound: &NbtCompound) -> Result<Self, WorldError> {
        let mut properties = BTreeMap::new();
        if let Some(props) = opt_compound(compound, "Properties")? {
            for (key, value) in props {
                let value = value
                    .as_string()
                    .ok_or_else(|| wrong("Properties", "compound of strings"))?;
                properties.insert(key.clone(), value.to_string());
            }
        }
        Ok(Self {
            name: string(compound, "Name")?,
            properties,
        })
    }

    pub fn to_nbt(&self) -> NbtCompound {
        let mut compound = NbtCompound::new();
        compound.insert("Name".into(), self.name.as_str().into());
        if !self.properties.is_empty() {
            compound.insert(
                "Properties".into(),
                NbtTag::Compound(
                    self.properties
                        .iter()
                        .map(|(k, v)| (k.clone(), v.as_str().into()))
                        .collect(),
                ),
            );
        }
        compound
    }
}

impl SaveBiomes {
    pub fn from_nbt(compound: &NbtCompound) -> Result<Self, WorldError> {
        let palette = opt_list(compound, "palette")?
            .iter()
            .map(|tag| {
                tag.as_string()
                    .map(str::to_string)
                    .ok_or_else(|| wrong("palette", "list of strings"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            palette,
            data: longs(compound, "data")?,
        })
    }

    pub fn to_nbt(&self) -> NbtCompound {
        let mut compound = NbtCompound::new();
        compound.insert(
            "palette".into(),
            NbtTag::List(self.palette.iter().map(|s| s.as_str().into()).collect()),
        );
        if !self.data.is_empty() {
            compound.insert("data".into(), long_array(&self.data));
        }
        compound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use cobble_nbt::{read_nbt, write_nbt, NbtRoot};

    fn sample_chunk() -> SaveChunk {
        let mut properties = BTreeMap::new();
        properties.insert("snowy".to_string(), "false".to_string());
        let mut heightmaps = BTreeMap::new();
        heightmaps.insert("MOTION_BLOCKING".to_string(), vec![u64::MAX, 3]);
        let mut chest = NbtCompound::new();
        chest.insert("id".into(), "minecraft:chest".into());
        let mut extra = NbtCompound::new();
        extra.insert("InhabitedTime".into(), 120i64.into());

        SaveChunk {
            data_version: 3465,
            x_pos: -3,
            y_pos: -4,
            z_pos: 7,
            status: "minecraft:full".into(),
            sections: vec![SaveSection {
                y: -4,
                block_states: Some(SaveBlockStates {
                    palette: vec![
                        SaveBlockState {
                            name: "minecraft:air".into(),
                            properties: BTreeMap::new(),
                        },
                        SaveBlockState {
                            name: "minecraft:grass_block".into(),
                            properties,
                        },
                    ],
                    data: vec![1 << 63, 0x10],
                }),
                biomes: Some(SaveBiomes {
                    palette: vec!["minecraft:plains".into()],
                    data: vec![],
                }),
                sky_light: Some(vec![0xF0; 2048]),
                block_light: None,
            }],
            heightmaps,
            block_entities: vec![chest],
            extra,
        }
    }

    #[test]
    fn nbt_layout() {
        let nbt = sample_chunk().to_nbt();
        assert_eq!(nbt.get("xPos").and_then(NbtTag::as_int), Some(-3));
        assert_eq!(nbt.get("InhabitedTime").and_then(NbtTag::as_long), Some(120));

        let section = nbt["sections"].as_list().unwrap()[0].as_compound().unwrap();
        assert_eq!(section["Y"].as_byte(), Some(-4));
        assert!(!section.contains_key("BlockLight"));
        assert_eq!(section["SkyLight"].as_byte_array().unwrap()[0], 0xF0u8 as i8);

        let states = section["block_states"].as_compound().unwrap();
        assert_eq!(states["data"].as_long_array(), Some(&[i64::MIN, 0x10][..]));
        let grass = states["palette"].as_list().unwrap()[1].as_compound().unwrap();
        assert_eq!(grass["Name"].as_string(), Some("minecraft:grass_block"));
        let props = grass["Properties"].as_compound().unwrap();
        assert_eq!(props["snowy"].as_string(), Some("false"));

        let biomes = section["biomes"].as_compound().unwrap();
        assert!(!biomes.contains_key("data"));
    }

    #[test]
    fn survives_binary_nbt() {
        let chunk = sample_chunk();
        let mut buf = BytesMut::new();
        write_nbt(&mut buf, &NbtRoot::new("", chunk.to_nbt()));
        let root = read_nbt(&mut buf.freeze()).unwrap();
        assert_eq!(SaveChunk::from_nbt(&root.compound).unwrap(), chunk);
    }

    #[test]
    fn optional_fields_default() {
        let mut root = NbtCompound::new();
        root.insert("DataVersion".into(), 3465i32.into());
        root.insert("xPos".into(), 0i32.into());
        root.insert("yPos".into(), (-4i32).into());
        root.insert("zPos".into(), 0i32.into());
        root.insert("Status".into(), "empty".into());
        let mut section = NbtCompound::new();
        section.insert("Y".into(), 0i8.into());
        root.insert("sections".into(), NbtTag::List(vec![NbtTag::Compound(section)]));

        let chunk = SaveChunk::from_nbt(&root).unwrap();
        assert!(chunk.heightmaps.is_empty());
        assert!(chunk.block_entities.is_empty());
        assert!(chunk.extra.is_empty());
        assert_eq!(chunk.sections[0], SaveSection::default());
    }

    #[test]
    fn missing_and_mistyped_fields() {
        let mut root = sample_chunk().to_nbt();
        root.remove("zPos");
        assert!(matches!(
            SaveChunk::from_nbt(&root),
            Err(WorldError::MissingField(f)) if f == "zPos"
        ));

        root.insert("zPos".into(), "seven".into());
        assert!(matches!(
            SaveChunk::from_nbt(&root),
            Err(WorldError::WrongFieldType { field, .. }) if field == "zPos"
        ));

        let mut section = NbtCompound::new();
        section.insert("Y".into(), 300i32.into());
        assert!(SaveSection::from_nbt(&section).is_err());
    }

    #[test]
    fn properties_must_be_strings() {
        let mut props = NbtCompound::new();
        props.insert("level".into(), 3i32.into());
        let mut state = NbtCompound::new();
        state.insert("Name".into(), "minecraft:water".into());
        state.insert("Properties".into(), NbtTag::Compound(props));
        assert!(SaveBlockState::from_nbt(&state).is_err());
    }
}
