//! Biome registry, seasons, and per-season repaint targets.
#![forbid(unsafe_code)]

pub mod family;
pub mod registry;
pub mod season;
pub mod targets;

pub use family::{Family, FamilyRules};
pub use registry::{BiomeId, BiomeRegistry, BiomeTraits};
pub use season::Season;
pub use targets::{SeasonNames, SeasonTargetTable, TargetsConfig};
