use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use hashbrown::{HashMap, HashSet};
use serde::Deserialize;

pub type RawBiomeId = u16;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BiomeId(pub RawBiomeId);

/// Name-derived classification bits, computed once at registry build time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BiomeTraits {
    pub ocean: bool,
    pub deep_ocean: bool,
    pub river: bool,
    pub shore: bool,
    pub cold: bool,
}

impl BiomeTraits {
    pub fn from_name(name: &str) -> Self {
        let ocean = name.contains("OCEAN");
        Self {
            ocean,
            deep_ocean: ocean && is_deep_name(name),
            river: name.contains("RIVER"),
            shore: name.contains("BEACH") || name.contains("SHORE"),
            cold: is_cold_name(name),
        }
    }
}

fn is_deep_name(name: &str) -> bool {
    name.starts_with("DEEP_")
}

// Cherry groves carry "GROVE" in the name but are temperate.
fn is_cold_name(name: &str) -> bool {
    if name == "CHERRY_GROVE" {
        return false;
    }
    name.contains("SNOW")
        || name.contains("FROZEN")
        || name.contains("ICE")
        || name == "GROVE"
        || name.contains("PEAK")
        || name.contains("MOUNTAIN")
}

#[derive(Clone, Debug, Deserialize)]
pub struct BiomeDef {
    pub name: String,
    #[serde(default)]
    pub ocean: Option<bool>,
    #[serde(default)]
    pub river: Option<bool>,
    #[serde(default)]
    pub shore: Option<bool>,
    #[serde(default)]
    pub cold: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BiomesConfig {
    #[serde(default)]
    pub biomes: Vec<BiomeDef>,
}

const VANILLA_OVERWORLD: &[&str] = &[
    "PLAINS",
    "BADLANDS",
    "BAMBOO_JUNGLE",
    "BEACH",
    "BIRCH_FOREST",
    "CHERRY_GROVE",
    "COLD_OCEAN",
    "DARK_FOREST",
    "DEEP_COLD_OCEAN",
    "DEEP_DARK",
    "DEEP_FROZEN_OCEAN",
    "DEEP_LUKEWARM_OCEAN",
    "DEEP_OCEAN",
    "DESERT",
    "DRIPSTONE_CAVES",
    "ERODED_BADLANDS",
    "FLOWER_FOREST",
    "FOREST",
    "FROZEN_OCEAN",
    "FROZEN_PEAKS",
    "FROZEN_RIVER",
    "GROVE",
    "ICE_SPIKES",
    "JAGGED_PEAKS",
    "JUNGLE",
    "LUKEWARM_OCEAN",
    "LUSH_CAVES",
    "MANGROVE_SWAMP",
    "MEADOW",
    "MUSHROOM_FIELDS",
    "OCEAN",
    "OLD_GROWTH_BIRCH_FOREST",
    "OLD_GROWTH_PINE_TAIGA",
    "OLD_GROWTH_SPRUCE_TAIGA",
    "RIVER",
    "SAVANNA",
    "SAVANNA_PLATEAU",
    "SNOWY_BEACH",
    "SNOWY_PLAINS",
    "SNOWY_SLOPES",
    "SNOWY_TAIGA",
    "SPARSE_JUNGLE",
    "STONY_PEAKS",
    "STONY_SHORE",
    "SUNFLOWER_PLAINS",
    "SWAMP",
    "TAIGA",
    "WARM_OCEAN",
    "WINDSWEPT_FOREST",
    "WINDSWEPT_GRAVELLY_HILLS",
    "WINDSWEPT_HILLS",
    "WINDSWEPT_SAVANNA",
    "WOODED_BADLANDS",
];

/// Interned biome names with precomputed traits.
///
/// Names are stored upper-case; lookups normalize case so configuration and
/// persisted palettes can be written in either form.
#[derive(Debug, Default)]
pub struct BiomeRegistry {
    names: Vec<String>,
    traits: Vec<BiomeTraits>,
    by_name: HashMap<String, BiomeId>,
    warned: Mutex<HashSet<String>>,
}

impl BiomeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the stock overworld biome set. `PLAINS` is id 0.
    pub fn vanilla() -> Self {
        let mut reg = Self::new();
        for name in VANILLA_OVERWORLD {
            reg.register(name);
        }
        reg
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut reg = Self::new();
        for name in names {
            reg.register(name.as_ref());
        }
        reg
    }

    pub fn from_config(cfg: BiomesConfig) -> Result<Self, Box<dyn Error>> {
        let mut reg = Self::new();
        for def in cfg.biomes {
            let name = normalize(&def.name);
            if name.is_empty() {
                return Err("biome entry with empty name".into());
            }
            if reg.by_name.contains_key(&name) {
                return Err(format!("duplicate biome '{name}'").into());
            }
            let id = reg.register(&name);
            let t = &mut reg.traits[id.0 as usize];
            t.ocean = def.ocean.unwrap_or(t.ocean);
            t.river = def.river.unwrap_or(t.river);
            t.shore = def.shore.unwrap_or(t.shore);
            t.cold = def.cold.unwrap_or(t.cold);
            t.deep_ocean = t.ocean && is_deep_name(&name);
        }
        if reg.is_empty() {
            return Err("biome registry is empty".into());
        }
        Ok(reg)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: BiomesConfig = toml::from_str(toml_str)?;
        Self::from_config(cfg)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    /// Interns `name`, returning the existing id when already known.
    pub fn register(&mut self, name: &str) -> BiomeId {
        let name = normalize(name);
        if let Some(id) = self.by_name.get(&name) {
            return *id;
        }
        assert!(
            self.names.len() < RawBiomeId::MAX as usize,
            "biome registry full"
        );
        let id = BiomeId(self.names.len() as RawBiomeId);
        self.traits.push(BiomeTraits::from_name(&name));
        self.by_name.insert(name.clone(), id);
        self.names.push(name);
        id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn id_by_name(&self, name: &str) -> Option<BiomeId> {
        if let Some(id) = self.by_name.get(name) {
            return Some(*id);
        }
        self.by_name.get(&normalize(name)).copied()
    }

    #[inline]
    pub fn name(&self, id: BiomeId) -> Option<&str> {
        self.names.get(id.0 as usize).map(String::as_str)
    }

    /// Name for display and persistence; ids outside the registry render as `"?"`.
    #[inline]
    pub fn name_or_unknown(&self, id: BiomeId) -> &str {
        self.name(id).unwrap_or("?")
    }

    #[inline]
    pub fn traits(&self, id: BiomeId) -> BiomeTraits {
        self.traits.get(id.0 as usize).copied().unwrap_or_default()
    }

    #[inline]
    pub fn is_ocean(&self, id: BiomeId) -> bool {
        self.traits(id).ocean
    }

    #[inline]
    pub fn is_deep_ocean(&self, id: BiomeId) -> bool {
        self.traits(id).deep_ocean
    }

    #[inline]
    pub fn is_river(&self, id: BiomeId) -> bool {
        self.traits(id).river
    }

    #[inline]
    pub fn is_shore(&self, id: BiomeId) -> bool {
        self.traits(id).shore
    }

    #[inline]
    pub fn is_cold(&self, id: BiomeId) -> bool {
        self.traits(id).cold
    }

    /// `DEEP_<name>` counterpart, if registered.
    pub fn deep_variant(&self, id: BiomeId) -> Option<BiomeId> {
        let name = self.name(id)?;
        if name.starts_with("DEEP_") {
            return Some(id);
        }
        self.by_name.get(&format!("DEEP_{name}")).copied()
    }

    /// Counterpart with the `DEEP_` prefix stripped, if registered.
    pub fn shallow_variant(&self, id: BiomeId) -> Option<BiomeId> {
        let name = self.name(id)?;
        match name.strip_prefix("DEEP_") {
            Some(shallow) => self.by_name.get(shallow).copied(),
            None => Some(id),
        }
    }

    /// Resolves `name`, substituting `fallback` for unknown names. Each unknown
    /// name is reported once per registry.
    pub fn resolve_or(&self, name: &str, fallback: BiomeId, context: &str) -> BiomeId {
        if let Some(id) = self.id_by_name(name) {
            return id;
        }
        let first = self
            .warned
            .lock()
            .map(|mut w| w.insert(normalize(name)))
            .unwrap_or(false);
        if first {
            log::warn!(
                "unknown biome '{}' ({}), using {}",
                name,
                context,
                self.name_or_unknown(fallback)
            );
        }
        fallback
    }

    pub fn iter(&self) -> impl Iterator<Item = (BiomeId, &str)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(i, n)| (BiomeId(i as RawBiomeId), n.as_str()))
    }
}

#[inline]
fn normalize(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vanilla_traits_follow_names() {
        let reg = BiomeRegistry::vanilla();
        let id = |n: &str| reg.id_by_name(n).unwrap();
        assert!(reg.is_ocean(id("WARM_OCEAN")));
        assert!(reg.is_deep_ocean(id("DEEP_COLD_OCEAN")));
        assert!(!reg.is_deep_ocean(id("DEEP_DARK")));
        assert!(reg.is_river(id("FROZEN_RIVER")));
        assert!(reg.is_shore(id("STONY_SHORE")));
        assert!(reg.is_cold(id("GROVE")));
        assert!(reg.is_cold(id("JAGGED_PEAKS")));
        assert!(!reg.is_cold(id("CHERRY_GROVE")));
        assert!(!reg.is_cold(id("PLAINS")));
    }

    #[test]
    fn deep_prefix_rule_is_shared_by_every_constructor() {
        let names = ["OCEAN", "DEEP_OCEAN", "NOT_DEEP_OCEAN"];
        let from_names = BiomeRegistry::from_names(names);
        let from_config = BiomeRegistry::from_toml_str(
            r#"
            [[biomes]]
            name = "ocean"
            [[biomes]]
            name = "deep_ocean"
            [[biomes]]
            name = "not_deep_ocean"
        "#,
        )
        .unwrap();
        for reg in [&from_names, &from_config] {
            assert!(reg.is_deep_ocean(reg.id_by_name("DEEP_OCEAN").unwrap()));
            assert!(!reg.is_deep_ocean(reg.id_by_name("NOT_DEEP_OCEAN").unwrap()));
            assert!(reg.is_ocean(reg.id_by_name("NOT_DEEP_OCEAN").unwrap()));
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let reg = BiomeRegistry::vanilla();
        assert_eq!(reg.id_by_name("plains"), reg.id_by_name("PLAINS"));
        assert_eq!(reg.id_by_name("plains"), Some(BiomeId(0)));
    }

    #[test]
    fn variants_resolve_when_registered() {
        let reg = BiomeRegistry::vanilla();
        let ocean = reg.id_by_name("OCEAN").unwrap();
        let deep = reg.id_by_name("DEEP_OCEAN").unwrap();
        let warm = reg.id_by_name("WARM_OCEAN").unwrap();
        assert_eq!(reg.deep_variant(ocean), Some(deep));
        assert_eq!(reg.shallow_variant(deep), Some(ocean));
        assert_eq!(reg.deep_variant(warm), None);
    }

    #[test]
    fn config_overrides_traits() {
        let reg = BiomeRegistry::from_toml_str(
            r#"
            [[biomes]]
            name = "plains"
            [[biomes]]
            name = "tundra"
            cold = true
            [[biomes]]
            name = "lagoon"
            ocean = true
        "#,
        )
        .unwrap();
        assert!(reg.is_cold(reg.id_by_name("TUNDRA").unwrap()));
        assert!(reg.is_ocean(reg.id_by_name("LAGOON").unwrap()));
        assert!(!reg.is_cold(reg.id_by_name("PLAINS").unwrap()));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = BiomeRegistry::from_toml_str(
            r#"
            [[biomes]]
            name = "plains"
            [[biomes]]
            name = "PLAINS"
        "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn resolve_or_substitutes_fallback() {
        let reg = BiomeRegistry::vanilla();
        let plains = reg.id_by_name("PLAINS").unwrap();
        assert_eq!(reg.resolve_or("NOT_A_BIOME", plains, "test"), plains);
        assert_eq!(reg.resolve_or("NOT_A_BIOME", plains, "test"), plains);
        assert_eq!(reg.warned.lock().unwrap().len(), 1);
    }
}
