use crate::registry::{BiomeId, BiomeRegistry};

/// Coarse grouping of a region's original biome, selecting its target table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Family {
    Land,
    Ocean,
    River,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FamilyRules {
    pub oceans: bool,
    pub shores_as_ocean: bool,
    pub rivers: bool,
}

impl Default for FamilyRules {
    fn default() -> Self {
        Self {
            oceans: true,
            shores_as_ocean: true,
            rivers: true,
        }
    }
}

impl FamilyRules {
    /// Family decided by a single sample, or `None` when it reads as land.
    pub fn family_of(&self, reg: &BiomeRegistry, biome: BiomeId) -> Option<Family> {
        let t = reg.traits(biome);
        if self.oceans && (t.ocean || (self.shores_as_ocean && t.shore)) {
            return Some(Family::Ocean);
        }
        if self.rivers && t.river {
            return Some(Family::River);
        }
        None
    }

    /// First non-land sample wins; an empty or all-land sequence is `Land`.
    pub fn classify<I>(&self, reg: &BiomeRegistry, samples: I) -> Family
    where
        I: IntoIterator<Item = BiomeId>,
    {
        samples
            .into_iter()
            .find_map(|b| self.family_of(reg, b))
            .unwrap_or(Family::Land)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(reg: &BiomeRegistry, names: &[&str]) -> Vec<BiomeId> {
        names.iter().map(|n| reg.id_by_name(n).unwrap()).collect()
    }

    #[test]
    fn first_matching_sample_decides() {
        let reg = BiomeRegistry::vanilla();
        let rules = FamilyRules::default();
        let s = ids(&reg, &["PLAINS", "RIVER", "OCEAN"]);
        assert_eq!(rules.classify(&reg, s), Family::River);
        let s = ids(&reg, &["PLAINS", "BEACH", "RIVER"]);
        assert_eq!(rules.classify(&reg, s), Family::Ocean);
    }

    #[test]
    fn disabled_families_read_as_land() {
        let reg = BiomeRegistry::vanilla();
        let rules = FamilyRules {
            oceans: false,
            shores_as_ocean: true,
            rivers: false,
        };
        let s = ids(&reg, &["OCEAN", "BEACH", "RIVER"]);
        assert_eq!(rules.classify(&reg, s), Family::Land);
    }

    #[test]
    fn shores_only_count_when_enabled() {
        let reg = BiomeRegistry::vanilla();
        let rules = FamilyRules {
            shores_as_ocean: false,
            ..FamilyRules::default()
        };
        let s = ids(&reg, &["BEACH", "STONY_SHORE"]);
        assert_eq!(rules.classify(&reg, s), Family::Land);
        assert_eq!(rules.classify(&reg, Vec::new()), Family::Land);
    }
}
