use std::error::Error;
use std::sync::Arc;

use solstice_biomes::BiomeRegistry;
use solstice_runtime::RepaintConfig;
use solstice_world::memory::NoiseBiomes;
use solstice_world::{MemoryWorld, WorldBounds, WorldId};

/// Every generated world uses this id, so backups from one run restore into
/// the next.
pub const DEMO_WORLD: WorldId = WorldId::from_u128(0x501_5714_ce00_0000_0000_0000_0000_0001);

pub const DEMO_BOUNDS: WorldBounds = WorldBounds {
    min_y: -64,
    max_y: 320,
    sea_level: 63,
};

pub fn load_registry(config: &RepaintConfig) -> Result<BiomeRegistry, Box<dyn Error>> {
    match &config.biomes_file {
        Some(path) => {
            let reg = BiomeRegistry::load_from_path(path)?;
            log::info!("loaded {} biomes from {}", reg.len(), path.display());
            Ok(reg)
        }
        None => Ok(BiomeRegistry::vanilla()),
    }
}

pub fn noise_world(seed: i32, registry: &BiomeRegistry) -> Arc<MemoryWorld> {
    let world = Arc::new(MemoryWorld::new());
    world.add_world(
        DEMO_WORLD,
        DEMO_BOUNDS,
        NoiseBiomes::new(seed, registry).into_generator(),
    );
    world
}
