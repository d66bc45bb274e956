//! Block states and the registry that numbers them.
//!
//! Every block contributes one state per combination of its property
//! values, numbered consecutively with the last property varying fastest.
//! Blocks are numbered in registration order.
//!
//! The built-in table is the start of the 1.20.1 block list, so its ids
//! match vanilla. Complete tables come from the data generator's
//! `reports/blocks.json`, which carries the id of every state.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Read;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::biome::namespaced;
use crate::error::WorldError;
use crate::palette::PaletteValue;

/// Bits per value of a block-state container using the global palette.
pub const BITS_PER_BLOCK: u32 = 15;

/// A block state id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct BlockState(pub u32);

impl BlockState {
    pub const AIR: BlockState = BlockState(0);

    /// Whether this is air in the [global](BlockStateRegistry::global) registry.
    pub fn is_air(self) -> bool {
        BlockStateRegistry::global().is_air(self)
    }
}

impl PaletteValue for BlockState {
    fn to_code(self) -> u32 {
        self.0
    }

    fn from_code(code: u32) -> Self {
        BlockState(code)
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// One block property: its name, allowed values, and the value of the default state.
#[derive(Debug, Clone, Copy)]
pub struct PropertyDef {
    pub name: &'static str,
    pub values: &'static [&'static str],
    pub default: &'static str,
}

const fn prop(
    name: &'static str,
    values: &'static [&'static str],
    default: &'static str,
) -> PropertyDef {
    PropertyDef {
        name,
        values,
        default,
    }
}

/// A block and its properties, sorted by name as vanilla numbers them.
#[derive(Debug, Clone, Copy)]
pub struct BlockDef {
    pub name: &'static str,
    pub properties: &'static [PropertyDef],
}

const fn block(name: &'static str, properties: &'static [PropertyDef]) -> BlockDef {
    BlockDef { name, properties }
}

const BOOL: &[&str] = &["true", "false"];
const LEVEL: &[&str] = &[
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15",
];
const AGE_4: &[&str] = &["0", "1", "2", "3", "4"];
const STAGE: &[&str] = &["0", "1"];
const DUSTING: &[&str] = &["0", "1", "2", "3"];

const SNOWY: &[PropertyDef] = &[prop("snowy", BOOL, "false")];
const SAPLING: &[PropertyDef] = &[prop("stage", STAGE, "0")];
const FLUID: &[PropertyDef] = &[prop("level", LEVEL, "0")];
const BRUSHABLE: &[PropertyDef] = &[prop("dusting", DUSTING, "0")];
const PROPAGULE: &[PropertyDef] = &[
    prop("age", AGE_4, "0"),
    prop("hanging", BOOL, "false"),
    prop("stage", STAGE, "0"),
    prop("waterlogged", BOOL, "false"),
];

/// The first 1.20.1 blocks, states 0 through 129.
pub static BUILTIN_BLOCKS: &[BlockDef] = &[
    block("air", &[]),
    block("stone", &[]),
    block("granite", &[]),
    block("polished_granite", &[]),
    block("diorite", &[]),
    block("polished_diorite", &[]),
    block("andesite", &[]),
    block("polished_andesite", &[]),
    block("grass_block", SNOWY),
    block("dirt", &[]),
    block("coarse_dirt", &[]),
    block("podzol", SNOWY),
    block("cobblestone", &[]),
    block("oak_planks", &[]),
    block("spruce_planks", &[]),
    block("birch_planks", &[]),
    block("jungle_planks", &[]),
    block("acacia_planks", &[]),
    block("cherry_planks", &[]),
    block("dark_oak_planks", &[]),
    block("mangrove_planks", &[]),
    block("bamboo_planks", &[]),
    block("bamboo_mosaic", &[]),
    block("oak_sapling", SAPLING),
    block("spruce_sapling", SAPLING),
    block("birch_sapling", SAPLING),
    block("jungle_sapling", SAPLING),
    block("acacia_sapling", SAPLING),
    block("cherry_sapling", SAPLING),
    block("dark_oak_sapling", SAPLING),
    block("mangrove_propagule", PROPAGULE),
    block("bedrock", &[]),
    block("water", FLUID),
    block("lava", FLUID),
    block("sand", &[]),
    block("suspicious_sand", BRUSHABLE),
    block("red_sand", &[]),
    block("gravel", &[]),
    block("suspicious_gravel", BRUSHABLE),
    block("gold_ore", &[]),
    block("deepslate_gold_ore", &[]),
    block("iron_ore", &[]),
    block("deepslate_iron_ore", &[]),
    block("coal_ore", &[]),
    block("deepslate_coal_ore", &[]),
    block("nether_gold_ore", &[]),
];

const AIR_BLOCKS: [&str; 3] = ["minecraft:air", "minecraft:cave_air", "minecraft:void_air"];

// ---------------------------------------------------------------------------
// JSON data structures (data generator reports/blocks.json)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ReportBlock {
    #[serde(default)]
    properties: BTreeMap<String, Vec<String>>,
    states: Vec<ReportState>,
}

#[derive(Debug, Deserialize)]
struct ReportState {
    id: u32,
    #[serde(default)]
    default: bool,
    #[serde(default)]
    properties: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Name and property values of one block state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockStateInfo {
    pub name: String,
    /// Property values in declaration order.
    pub properties: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct Property {
    name: String,
    values: Vec<String>,
}

#[derive(Debug, Clone)]
struct BlockEntry {
    properties: Vec<Property>,
    default_offset: usize,
    /// State id of each property combination, last property fastest.
    states: Vec<BlockState>,
}

impl BlockEntry {
    fn offset_of(&self, indices: &[usize]) -> usize {
        self.properties
            .iter()
            .zip(indices)
            .fold(0, |acc, (p, &i)| acc * p.values.len() + i)
    }

    fn indices_of(&self, offset: usize) -> Vec<usize> {
        let mut rest = offset;
        let mut indices = vec![0; self.properties.len()];
        for (slot, p) in indices.iter_mut().zip(&self.properties).rev() {
            *slot = rest % p.values.len();
            rest /= p.values.len();
        }
        indices
    }

    fn info(&self, name: &str, offset: usize) -> BlockStateInfo {
        BlockStateInfo {
            name: name.to_string(),
            properties: self
                .properties
                .iter()
                .zip(self.indices_of(offset))
                .map(|(p, i)| (p.name.clone(), p.values[i].clone()))
                .collect(),
        }
    }
}

static INSTALLED: OnceLock<BlockStateRegistry> = OnceLock::new();

/// Bidirectional registry mapping dense state ids to block name + properties.
#[derive(Debug, Clone, Default)]
pub struct BlockStateRegistry {
    states: Vec<BlockStateInfo>,
    blocks: HashMap<String, BlockEntry>,
    air: Vec<BlockState>,
}

impl BlockStateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in registry, built from [`BUILTIN_BLOCKS`] on first use.
    pub fn vanilla() -> &'static BlockStateRegistry {
        static REGISTRY: OnceLock<BlockStateRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            let mut reg = BlockStateRegistry::new();
            for def in BUILTIN_BLOCKS {
                reg.register(def);
            }
            reg
        })
    }

    /// The registry [`install`](Self::install)ed for this process, or the
    /// built-in one. Block counts on [`Section`](crate::Section) edits
    /// consult it for air.
    pub fn global() -> &'static BlockStateRegistry {
        INSTALLED.get().unwrap_or_else(Self::vanilla)
    }

    /// Make `registry` the [`global`](Self::global) one. Only the first
    /// call succeeds; later calls hand the registry back.
    pub fn install(registry: BlockStateRegistry) -> Result<(), BlockStateRegistry> {
        INSTALLED.set(registry)
    }

    /// Add every state of `def` and return its default state.
    ///
    /// # Panics
    ///
    /// If the block is already registered or a property default is not one of its values.
    pub fn register(&mut self, def: &BlockDef) -> BlockState {
        let name = namespaced(def.name);
        assert!(
            !self.blocks.contains_key(&name),
            "block {name} registered twice"
        );

        let mut indices = Vec::with_capacity(def.properties.len());
        for p in def.properties {
            let index = p
                .values
                .iter()
                .position(|v| *v == p.default)
                .unwrap_or_else(|| panic!("{name}: default {} is not a value of {}", p.default, p.name));
            indices.push(index);
        }

        let first = self.states.len() as u32;
        let total: usize = def.properties.iter().map(|p| p.values.len()).product();
        let mut entry = BlockEntry {
            properties: def
                .properties
                .iter()
                .map(|p| Property {
                    name: p.name.to_string(),
                    values: p.values.iter().map(|v| v.to_string()).collect(),
                })
                .collect(),
            default_offset: 0,
            states: (first..first + total as u32).map(BlockState).collect(),
        };
        entry.default_offset = entry.offset_of(&indices);
        for offset in 0..total {
            self.states.push(entry.info(&name, offset));
        }
        self.insert(name, entry)
    }

    /// Load a data generator block report (`reports/blocks.json`).
    pub fn from_report(json: &str) -> Result<Self, WorldError> {
        let report: BTreeMap<String, ReportBlock> = serde_json::from_str(json)?;
        Self::from_report_blocks(report)
    }

    /// As [`from_report`](Self::from_report), reading from `reader`.
    pub fn from_report_reader(reader: impl Read) -> Result<Self, WorldError> {
        let report: BTreeMap<String, ReportBlock> = serde_json::from_reader(reader)?;
        Self::from_report_blocks(report)
    }

    fn from_report_blocks(report: BTreeMap<String, ReportBlock>) -> Result<Self, WorldError> {
        let invalid = |msg: String| WorldError::InvalidBlockReport(msg);
        let count: usize = report.values().map(|b| b.states.len()).sum();
        let mut infos: Vec<Option<BlockStateInfo>> = vec![None; count];
        let mut reg = BlockStateRegistry::new();

        for (key, block) in report {
            let name = namespaced(&key);
            let properties: Vec<Property> = block
                .properties
                .into_iter()
                .map(|(name, values)| Property { name, values })
                .collect();
            let total: usize = properties.iter().map(|p| p.values.len()).product();
            if block.states.len() != total {
                return Err(invalid(format!(
                    "{name} lists {} states but its properties make {total}",
                    block.states.len()
                )));
            }

            let mut entry = BlockEntry {
                properties,
                default_offset: usize::MAX,
                states: vec![BlockState(u32::MAX); total],
            };
            let mut seen = vec![false; total];
            for state in block.states {
                if state.properties.len() != entry.properties.len() {
                    return Err(invalid(format!("{name} state {} has the wrong properties", state.id)));
                }
                let mut indices = Vec::with_capacity(entry.properties.len());
                for p in &entry.properties {
                    let index = state
                        .properties
                        .get(&p.name)
                        .and_then(|value| p.values.iter().position(|v| v == value))
                        .ok_or_else(|| invalid(format!("{name} state {} has no valid {}", state.id, p.name)))?;
                    indices.push(index);
                }
                let offset = entry.offset_of(&indices);
                let slot = infos
                    .get_mut(state.id as usize)
                    .ok_or_else(|| invalid(format!("state id {} past the {count} listed states", state.id)))?;
                if seen[offset] || slot.is_some() {
                    return Err(invalid(format!("{name} state {} listed twice", state.id)));
                }
                seen[offset] = true;
                entry.states[offset] = BlockState(state.id);
                *slot = Some(entry.info(&name, offset));
                if state.default {
                    entry.default_offset = offset;
                }
            }
            if entry.default_offset == usize::MAX {
                return Err(invalid(format!("{name} has no default state")));
            }
            reg.insert(name, entry);
        }

        reg.states = infos
            .into_iter()
            .enumerate()
            .map(|(id, info)| info.ok_or_else(|| invalid(format!("state id {id} is missing"))))
            .collect::<Result<_, _>>()?;
        debug!(
            blocks = reg.blocks.len(),
            states = reg.states.len(),
            "loaded block report"
        );
        Ok(reg)
    }

    fn insert(&mut self, name: String, entry: BlockEntry) -> BlockState {
        let default = entry.states[entry.default_offset];
        if AIR_BLOCKS.contains(&name.as_str()) {
            self.air.push(default);
        }
        self.blocks.insert(name, entry);
        default
    }

    /// Default state of a block.
    pub fn default_state(&self, name: &str) -> Option<BlockState> {
        self.blocks
            .get(&namespaced(name))
            .map(|entry| entry.states[entry.default_offset])
    }

    /// Resolve a block and property values to a state id. Properties not
    /// mentioned keep their default value; unknown properties or values fail.
    pub fn state_of<K, V>(
        &self,
        name: &str,
        properties: impl IntoIterator<Item = (K, V)>,
    ) -> Option<BlockState>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let entry = self.blocks.get(&namespaced(name))?;
        let mut indices = entry.indices_of(entry.default_offset);
        for (key, value) in properties {
            let slot = entry
                .properties
                .iter()
                .position(|p| p.name == key.as_ref())?;
            indices[slot] = entry.properties[slot]
                .values
                .iter()
                .position(|v| v == value.as_ref())?;
        }
        Some(entry.states[entry.offset_of(&indices)])
    }

    /// Name and properties of `state`.
    pub fn info(&self, state: BlockState) -> Option<&BlockStateInfo> {
        self.states.get(state.0 as usize)
    }

    pub fn is_air(&self, state: BlockState) -> bool {
        self.air.contains(&state)
    }

    /// Number of registered states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
