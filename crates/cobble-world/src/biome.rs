//! Biome ids and the registry that names them.
//!
//! Ids follow registry order of the 1.20.1 built-in data pack, which is
//! alphabetical.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Serialize;

use crate::palette::PaletteValue;

/// Bits per value of a biome container using the global palette.
pub const BITS_PER_BIOME: u32 = 6;

/// A biome id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct Biome(pub u32);

impl Biome {
    pub const PLAINS: Biome = Biome(39);
    pub const THE_VOID: Biome = Biome(56);
}

impl PaletteValue for Biome {
    fn to_code(self) -> u32 {
        self.0
    }

    fn from_code(code: u32) -> Self {
        Biome(code)
    }
}

/// All biomes of 1.20.1, in id order.
static VANILLA_BIOMES: &[&str] = &[
    "badlands",
    "bamboo_jungle",
    "basalt_deltas",
    "beach",
    "birch_forest",
    "cherry_grove",
    "cold_ocean",
    "crimson_forest",
    "dark_forest",
    "deep_cold_ocean",
    "deep_dark",
    "deep_frozen_ocean",
    "deep_lukewarm_ocean",
    "deep_ocean",
    "desert",
    "dripstone_caves",
    "end_barrens",
    "end_highlands",
    "end_midlands",
    "eroded_badlands",
    "flower_forest",
    "forest",
    "frozen_ocean",
    "frozen_peaks",
    "frozen_river",
    "grove",
    "ice_spikes",
    "jagged_peaks",
    "jungle",
    "lukewarm_ocean",
    "lush_caves",
    "mangrove_swamp",
    "meadow",
    "mushroom_fields",
    "nether_wastes",
    "ocean",
    "old_growth_birch_forest",
    "old_growth_pine_taiga",
    "old_growth_spruce_taiga",
    "plains",
    "river",
    "savanna",
    "savanna_plateau",
    "small_end_islands",
    "snowy_beach",
    "snowy_plains",
    "snowy_slopes",
    "snowy_taiga",
    "soul_sand_valley",
    "sparse_jungle",
    "stony_peaks",
    "stony_shore",
    "sunflower_plains",
    "swamp",
    "taiga",
    "the_end",
    "the_void",
    "warm_ocean",
    "warped_forest",
    "windswept_forest",
    "windswept_gravelly_hills",
    "windswept_hills",
    "windswept_savanna",
    "wooded_badlands",
];

/// Bidirectional biome name ↔ id registry.
#[derive(Debug, Clone, Default)]
pub struct BiomeRegistry {
    names: Vec<String>,
    ids: HashMap<String, Biome>,
}

impl BiomeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in 1.20.1 biome registry.
    pub fn vanilla() -> &'static BiomeRegistry {
        static REGISTRY: OnceLock<BiomeRegistry> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            let mut reg = BiomeRegistry::new();
            for name in VANILLA_BIOMES {
                reg.register(name);
            }
            reg
        })
    }

    /// Add a biome under the next free id, or return its existing id.
    pub fn register(&mut self, name: &str) -> Biome {
        let name = namespaced(name);
        if let Some(&biome) = self.ids.get(&name) {
            return biome;
        }
        let biome = Biome(self.names.len() as u32);
        self.ids.insert(name.clone(), biome);
        self.names.push(name);
        biome
    }

    /// Look a biome up by name, with or without the `minecraft:` namespace.
    pub fn by_name(&self, name: &str) -> Option<Biome> {
        self.ids.get(&namespaced(name)).copied()
    }

    /// Namespaced name of `biome`.
    pub fn name(&self, biome: Biome) -> Option<&str> {
        self.names.get(biome.0 as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub(crate) fn namespaced(name: &str) -> String {
    if name.contains(':') {
        name.to_string()
    } else {
        format!("minecraft:{name}")
    }
}
