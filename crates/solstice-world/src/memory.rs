//! In-process `WorldHost` backed by plain biome cells.
//!
//! Biomes are stored at 4×4×4 cell resolution, the same granularity block
//! games use for biome storage. Unloading a region keeps its cells, so data
//! written while loaded is still there after a reload.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use fastnoise_lite::{FastNoiseLite, NoiseType};
use hashbrown::HashMap;
use solstice_biomes::{BiomeId, BiomeRegistry};

use crate::host::{Observer, ObserverId, WorldBounds, WorldHost};
use crate::region::{REGION_SIZE, RegionCoord, WorldId};

pub const CELL: i32 = 4;
const CELLS_XZ: usize = (REGION_SIZE / CELL) as usize;

pub type BiomeGenerator = Arc<dyn Fn(i32, i32, i32) -> BiomeId + Send + Sync>;

struct RegionCells {
    cells: Vec<BiomeId>,
    loaded: bool,
}

struct WorldData {
    bounds: WorldBounds,
    layers: usize,
    generator: BiomeGenerator,
    regions: HashMap<RegionCoord, RegionCells>,
}

impl WorldData {
    fn cell_index(&self, x: i32, y: i32, z: i32) -> Option<(RegionCoord, usize)> {
        if !self.bounds.contains_y(y) {
            return None;
        }
        let coord = RegionCoord::containing(x, z);
        let cx = (x.rem_euclid(REGION_SIZE) / CELL) as usize;
        let cz = (z.rem_euclid(REGION_SIZE) / CELL) as usize;
        let cy = ((y - self.bounds.min_y) / CELL) as usize;
        Some((coord, (cy * CELLS_XZ + cz) * CELLS_XZ + cx))
    }

    fn generate(&self, coord: RegionCoord) -> RegionCells {
        let (bx, bz) = coord.origin();
        let mut cells = Vec::with_capacity(CELLS_XZ * CELLS_XZ * self.layers);
        for cy in 0..self.layers {
            for cz in 0..CELLS_XZ {
                for cx in 0..CELLS_XZ {
                    let x = bx + cx as i32 * CELL;
                    let z = bz + cz as i32 * CELL;
                    let y = self.bounds.min_y + cy as i32 * CELL;
                    cells.push((self.generator)(x, y, z));
                }
            }
        }
        RegionCells {
            cells,
            loaded: true,
        }
    }
}

#[derive(Default)]
pub struct MemoryWorld {
    worlds: RwLock<HashMap<WorldId, WorldData>>,
    observers: RwLock<Vec<Observer>>,
    writes: AtomicU64,
    refreshes: AtomicU64,
    nudges: Mutex<Vec<(ObserverId, WorldId, RegionCoord)>>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a world whose every cell starts as `fill`.
    pub fn add_uniform_world(&self, id: WorldId, bounds: WorldBounds, fill: BiomeId) {
        self.add_world(id, bounds, Arc::new(move |_, _, _| fill));
    }

    pub fn add_world(&self, id: WorldId, bounds: WorldBounds, generator: BiomeGenerator) {
        let span = (bounds.max_y - bounds.min_y).max(0) as usize;
        let data = WorldData {
            bounds,
            layers: span.div_ceil(CELL as usize),
            generator,
            regions: HashMap::new(),
        };
        self.worlds.write().unwrap().insert(id, data);
    }

    pub fn remove_world(&self, id: WorldId) {
        self.worlds.write().unwrap().remove(&id);
    }

    pub fn ensure_loaded(&self, world: WorldId, coord: RegionCoord) -> bool {
        let mut worlds = self.worlds.write().unwrap();
        let Some(data) = worlds.get_mut(&world) else {
            return false;
        };
        match data.regions.get_mut(&coord) {
            Some(r) => r.loaded = true,
            None => {
                let cells = data.generate(coord);
                data.regions.insert(coord, cells);
            }
        }
        true
    }

    /// Loads every region within `radius` of `center` (Chebyshev).
    pub fn load_square(&self, world: WorldId, center: RegionCoord, radius: i32) {
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                self.ensure_loaded(world, center.offset(dx, dz));
            }
        }
    }

    pub fn unload_region(&self, world: WorldId, coord: RegionCoord) {
        if let Some(data) = self.worlds.write().unwrap().get_mut(&world) {
            if let Some(r) = data.regions.get_mut(&coord) {
                r.loaded = false;
            }
        }
    }

    pub fn loaded_regions(&self, world: WorldId) -> Vec<RegionCoord> {
        let worlds = self.worlds.read().unwrap();
        let Some(data) = worlds.get(&world) else {
            return Vec::new();
        };
        let mut out: Vec<RegionCoord> = data
            .regions
            .iter()
            .filter(|(_, r)| r.loaded)
            .map(|(c, _)| *c)
            .collect();
        out.sort_by_key(|c| (c.rx, c.rz));
        out
    }

    /// Overwrites every cell of a resident region without counting writes.
    pub fn paint_region(&self, world: WorldId, coord: RegionCoord, biome: BiomeId) {
        self.ensure_loaded(world, coord);
        if let Some(data) = self.worlds.write().unwrap().get_mut(&world) {
            if let Some(r) = data.regions.get_mut(&coord) {
                r.cells.fill(biome);
            }
        }
    }

    /// Number of cells in the region currently holding `biome`.
    pub fn count_cells(&self, world: WorldId, coord: RegionCoord, biome: BiomeId) -> usize {
        let worlds = self.worlds.read().unwrap();
        worlds
            .get(&world)
            .and_then(|d| d.regions.get(&coord))
            .map(|r| r.cells.iter().filter(|b| **b == biome).count())
            .unwrap_or(0)
    }

    pub fn region_cells(&self, world: WorldId, coord: RegionCoord) -> Option<Vec<BiomeId>> {
        let worlds = self.worlds.read().unwrap();
        worlds
            .get(&world)
            .and_then(|d| d.regions.get(&coord))
            .map(|r| r.cells.clone())
    }

    pub fn set_observers(&self, observers: Vec<Observer>) {
        *self.observers.write().unwrap() = observers;
    }

    pub fn upsert_observer(&self, observer: Observer) {
        let mut obs = self.observers.write().unwrap();
        match obs.iter_mut().find(|o| o.id == observer.id) {
            Some(o) => *o = observer,
            None => obs.push(observer),
        }
    }

    #[inline]
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn refreshes(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    pub fn take_nudges(&self) -> Vec<(ObserverId, WorldId, RegionCoord)> {
        std::mem::take(&mut *self.nudges.lock().unwrap())
    }
}

impl WorldHost for MemoryWorld {
    fn bounds(&self, world: WorldId) -> Option<WorldBounds> {
        self.worlds.read().unwrap().get(&world).map(|d| d.bounds)
    }

    fn is_region_loaded(&self, world: WorldId, coord: RegionCoord) -> bool {
        self.worlds
            .read()
            .unwrap()
            .get(&world)
            .and_then(|d| d.regions.get(&coord))
            .is_some_and(|r| r.loaded)
    }

    fn load_region(&self, world: WorldId, coord: RegionCoord) -> bool {
        self.ensure_loaded(world, coord)
    }

    fn biome_at(&self, world: WorldId, x: i32, y: i32, z: i32) -> Option<BiomeId> {
        let worlds = self.worlds.read().unwrap();
        let data = worlds.get(&world)?;
        let (coord, idx) = data.cell_index(x, y, z)?;
        match data.regions.get(&coord) {
            Some(r) => r.cells.get(idx).copied(),
            None => Some((data.generator)(x, y, z)),
        }
    }

    fn set_biome(&self, world: WorldId, x: i32, y: i32, z: i32, biome: BiomeId) {
        let mut worlds = self.worlds.write().unwrap();
        let Some(data) = worlds.get_mut(&world) else {
            return;
        };
        let Some((coord, idx)) = data.cell_index(x, y, z) else {
            return;
        };
        if !data.regions.contains_key(&coord) {
            let cells = data.generate(coord);
            data.regions.insert(coord, cells);
        }
        if let Some(cell) = data.regions.get_mut(&coord).and_then(|r| r.cells.get_mut(idx)) {
            *cell = biome;
            self.writes.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn refresh_region(&self, _world: WorldId, _coord: RegionCoord) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    fn observers(&self) -> Vec<Observer> {
        self.observers.read().unwrap().clone()
    }

    fn nudge_observer(&self, observer: ObserverId, world: WorldId, coord: RegionCoord) {
        self.nudges.lock().unwrap().push((observer, world, coord));
    }
}

/// Noise-driven biome layout for demo worlds: oceans with deep basins,
/// narrow river bands, cold highlands, and temperate land in between.
pub struct NoiseBiomes {
    continent: FastNoiseLite,
    river: FastNoiseLite,
    temp: FastNoiseLite,
    ocean: BiomeId,
    deep_ocean: BiomeId,
    river_biome: BiomeId,
    beach: BiomeId,
    cold: BiomeId,
    land: Vec<BiomeId>,
}

impl NoiseBiomes {
    pub fn new(seed: i32, reg: &BiomeRegistry) -> Self {
        let mut continent = FastNoiseLite::with_seed(seed);
        continent.set_noise_type(Some(NoiseType::OpenSimplex2));
        continent.set_frequency(Some(0.004));
        let mut river = FastNoiseLite::with_seed(seed ^ 0x5EA5_0A11);
        river.set_noise_type(Some(NoiseType::OpenSimplex2));
        river.set_frequency(Some(0.006));
        let mut temp = FastNoiseLite::with_seed(seed ^ 0x1203_5F31);
        temp.set_noise_type(Some(NoiseType::OpenSimplex2));
        temp.set_frequency(Some(0.002));
        let pick = |name: &str| reg.id_by_name(name).unwrap_or_default();
        Self {
            continent,
            river,
            temp,
            ocean: pick("OCEAN"),
            deep_ocean: pick("DEEP_OCEAN"),
            river_biome: pick("RIVER"),
            beach: pick("BEACH"),
            cold: pick("SNOWY_TAIGA"),
            land: ["PLAINS", "FOREST", "BIRCH_FOREST", "SAVANNA", "MEADOW"]
                .iter()
                .map(|n| pick(n))
                .collect(),
        }
    }

    pub fn sample(&self, x: i32, z: i32) -> BiomeId {
        let (fx, fz) = (x as f32, z as f32);
        let c = self.continent.get_noise_2d(fx, fz);
        if c < -0.45 {
            return self.deep_ocean;
        }
        if c < -0.15 {
            return self.ocean;
        }
        if c < -0.10 {
            return self.beach;
        }
        if self.river.get_noise_2d(fx, fz).abs() < 0.03 {
            return self.river_biome;
        }
        let t = self.temp.get_noise_2d(fx, fz);
        if t < -0.55 {
            return self.cold;
        }
        let band = ((t * 0.5 + 0.5) * self.land.len() as f32) as usize;
        self.land[band.min(self.land.len() - 1)]
    }

    pub fn into_generator(self) -> BiomeGenerator {
        Arc::new(move |x, _y, z| self.sample(x, z))
    }
}
