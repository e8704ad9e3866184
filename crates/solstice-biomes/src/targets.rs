use serde::Deserialize;

use crate::family::FamilyRules;
use crate::registry::{BiomeId, BiomeRegistry};
use crate::season::Season;

/// One biome name per season, as written in configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SeasonNames {
    #[serde(rename = "SPRING")]
    pub spring: String,
    #[serde(rename = "SUMMER")]
    pub summer: String,
    #[serde(rename = "AUTUMN")]
    pub autumn: String,
    #[serde(rename = "WINTER")]
    pub winter: String,
}

impl SeasonNames {
    pub fn new(spring: &str, summer: &str, autumn: &str, winter: &str) -> Self {
        Self {
            spring: spring.into(),
            summer: summer.into(),
            autumn: autumn.into(),
            winter: winter.into(),
        }
    }

    pub fn get(&self, season: Season) -> &str {
        match season {
            Season::Spring => &self.spring,
            Season::Summer => &self.summer,
            Season::Autumn => &self.autumn,
            Season::Winter => &self.winter,
        }
    }
}

fn default_land_names() -> SeasonNames {
    SeasonNames::new("FLOWER_FOREST", "PLAINS", "WINDSWEPT_SAVANNA", "SNOWY_PLAINS")
}

fn default_ocean_names() -> SeasonNames {
    SeasonNames::new("LUKEWARM_OCEAN", "WARM_OCEAN", "OCEAN", "FROZEN_OCEAN")
}

fn default_river_names() -> SeasonNames {
    SeasonNames::new("RIVER", "RIVER", "RIVER", "FROZEN_RIVER")
}

fn default_fallback() -> String {
    "PLAINS".into()
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
pub struct OceansConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub affect_rivers: bool,
    #[serde(default = "default_true")]
    pub affect_shores: bool,
    #[serde(default = "default_true")]
    pub keep_deep_variants: bool,
    #[serde(default = "default_ocean_names")]
    pub seasons: SeasonNames,
}

impl Default for OceansConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            affect_rivers: true,
            affect_shores: true,
            keep_deep_variants: true,
            seasons: default_ocean_names(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RiversConfig {
    /// Unset means "follow `oceans.affect_rivers`".
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default = "default_river_names")]
    pub seasons: SeasonNames,
}

impl Default for RiversConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            seasons: default_river_names(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TargetsConfig {
    #[serde(default = "default_fallback")]
    pub fallback_biome: String,
    #[serde(default = "default_land_names")]
    pub seasons: SeasonNames,
    #[serde(default)]
    pub oceans: OceansConfig,
    #[serde(default)]
    pub rivers: RiversConfig,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            fallback_biome: default_fallback(),
            seasons: default_land_names(),
            oceans: OceansConfig::default(),
            rivers: RiversConfig::default(),
        }
    }
}

/// Resolved per-season targets for each family.
#[derive(Clone, Debug)]
pub struct SeasonTargetTable {
    /// `None` keeps the region's original biome for that season.
    land: [Option<BiomeId>; 4],
    ocean: [BiomeId; 4],
    river: [BiomeId; 4],
    fallback: BiomeId,
    rules: FamilyRules,
    keep_deep_variants: bool,
}

impl SeasonTargetTable {
    pub fn from_config(reg: &BiomeRegistry, cfg: &TargetsConfig) -> Self {
        let fallback = match reg.id_by_name(&cfg.fallback_biome) {
            Some(id) => id,
            None => {
                log::warn!(
                    "fallback biome '{}' not registered, using {}",
                    cfg.fallback_biome,
                    reg.name_or_unknown(BiomeId(0))
                );
                BiomeId(0)
            }
        };
        let resolve = |names: &SeasonNames, table: &str| {
            Season::ALL.map(|s| {
                let ctx = format!("{table}.{}", s.name());
                reg.resolve_or(names.get(s), fallback, &ctx)
            })
        };
        let land = Season::ALL.map(|s| {
            let name = cfg.seasons.get(s).trim();
            if name.is_empty() || name.eq_ignore_ascii_case("ORIGINAL") {
                None
            } else {
                Some(reg.resolve_or(name, fallback, &format!("seasons.{}", s.name())))
            }
        });
        let rivers_enabled = cfg.rivers.enabled.unwrap_or(cfg.oceans.affect_rivers);
        Self {
            land,
            ocean: resolve(&cfg.oceans.seasons, "oceans.seasons"),
            river: resolve(&cfg.rivers.seasons, "rivers.seasons"),
            fallback,
            rules: FamilyRules {
                oceans: cfg.oceans.enabled,
                shores_as_ocean: cfg.oceans.affect_shores,
                rivers: rivers_enabled,
            },
            keep_deep_variants: cfg.oceans.keep_deep_variants,
        }
    }

    #[inline]
    pub fn land(&self, season: Season) -> Option<BiomeId> {
        self.land[season.index()]
    }

    #[inline]
    pub fn ocean(&self, season: Season) -> BiomeId {
        self.ocean[season.index()]
    }

    #[inline]
    pub fn river(&self, season: Season) -> BiomeId {
        self.river[season.index()]
    }

    #[inline]
    pub fn fallback(&self) -> BiomeId {
        self.fallback
    }

    #[inline]
    pub fn rules(&self) -> FamilyRules {
        self.rules
    }

    #[inline]
    pub fn keep_deep_variants(&self) -> bool {
        self.keep_deep_variants
    }

    /// Keeps the deep/shallow character of the region's original ocean.
    pub fn resolve_ocean_variant(
        &self,
        reg: &BiomeRegistry,
        base: BiomeId,
        original_was_deep: bool,
    ) -> BiomeId {
        if !self.keep_deep_variants {
            return base;
        }
        let base_deep = reg.name(base).is_some_and(|n| n.starts_with("DEEP_"));
        match (original_was_deep, base_deep) {
            (true, false) => reg.deep_variant(base).unwrap_or(base),
            (false, true) => reg.shallow_variant(base).unwrap_or(base),
            _ => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(cfg: &TargetsConfig) -> (BiomeRegistry, SeasonTargetTable) {
        let reg = BiomeRegistry::vanilla();
        let t = SeasonTargetTable::from_config(&reg, cfg);
        (reg, t)
    }

    #[test]
    fn defaults_match_stock_targets() {
        let (reg, t) = table(&TargetsConfig::default());
        assert_eq!(t.land(Season::Winter).and_then(|b| reg.name(b)), Some("SNOWY_PLAINS"));
        assert_eq!(reg.name(t.ocean(Season::Summer)), Some("WARM_OCEAN"));
        assert_eq!(reg.name(t.river(Season::Winter)), Some("FROZEN_RIVER"));
        assert!(t.rules().rivers);
    }

    #[test]
    fn unknown_names_fall_back() {
        let cfg: TargetsConfig = toml::from_str(
            r#"
            fallback_biome = "MEADOW"
            [seasons]
            SPRING = "NOPE"
            SUMMER = "plains"
            AUTUMN = "taiga"
            WINTER = "snowy_taiga"
        "#,
        )
        .unwrap();
        let (reg, t) = table(&cfg);
        assert_eq!(t.land(Season::Spring), reg.id_by_name("MEADOW"));
        assert_eq!(t.land(Season::Autumn), reg.id_by_name("TAIGA"));
    }

    #[test]
    fn blank_land_target_keeps_original() {
        let mut cfg = TargetsConfig::default();
        cfg.seasons.summer = String::new();
        cfg.seasons.autumn = "original".into();
        let (_, t) = table(&cfg);
        assert_eq!(t.land(Season::Summer), None);
        assert_eq!(t.land(Season::Autumn), None);
        assert!(t.land(Season::Winter).is_some());
    }

    #[test]
    fn rivers_follow_oceans_when_unset() {
        let cfg: TargetsConfig = toml::from_str(
            r#"
            [oceans]
            affect_rivers = false
        "#,
        )
        .unwrap();
        let (_, t) = table(&cfg);
        assert!(!t.rules().rivers);

        let cfg: TargetsConfig = toml::from_str(
            r#"
            [oceans]
            affect_rivers = false
            [rivers]
            enabled = true
        "#,
        )
        .unwrap();
        let (_, t) = table(&cfg);
        assert!(t.rules().rivers);
    }

    #[test]
    fn deep_original_prefers_deep_counterpart() {
        let (reg, t) = table(&TargetsConfig::default());
        let ocean = reg.id_by_name("OCEAN").unwrap();
        let deep = reg.id_by_name("DEEP_OCEAN").unwrap();
        let warm = reg.id_by_name("WARM_OCEAN").unwrap();
        assert_eq!(t.resolve_ocean_variant(&reg, ocean, true), deep);
        assert_eq!(t.resolve_ocean_variant(&reg, warm, true), warm);
        assert_eq!(t.resolve_ocean_variant(&reg, deep, false), ocean);
        assert_eq!(t.resolve_ocean_variant(&reg, ocean, false), ocean);
    }

    #[test]
    fn variant_preservation_can_be_disabled() {
        let mut cfg = TargetsConfig::default();
        cfg.oceans.keep_deep_variants = false;
        let (reg, t) = table(&cfg);
        let ocean = reg.id_by_name("OCEAN").unwrap();
        assert_eq!(t.resolve_ocean_variant(&reg, ocean, true), ocean);
    }
}
