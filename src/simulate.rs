use std::error::Error;
use std::f64::consts::TAU;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use hashbrown::HashMap;
use solstice_biomes::{BiomeId, BiomeRegistry, Season};
use solstice_runtime::{
    Calendar, CalendarState, FixedCalendar, RepaintConfig, RepaintEngine, ShardedExecutor,
};
use solstice_world::{MemoryWorld, Observer, ObserverId, REGION_SIZE, RegionCoord};

use crate::demo::{self, DEMO_WORLD};
use crate::watch;

#[derive(Args)]
pub struct SimulateArgs {
    /// Engine configuration (TOML); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Reload the configuration whenever the file changes
    #[arg(long, requires = "config")]
    watch: bool,
    /// World generation seed
    #[arg(long, default_value_t = 1337)]
    seed: i32,
    /// Loaded area around the origin, in regions
    #[arg(long, default_value_t = 12)]
    radius: i32,
    /// Number of observers walking the world
    #[arg(long, default_value_t = 3)]
    observers: u32,
    /// Days to simulate
    #[arg(long, default_value_t = 40)]
    days: u32,
    #[arg(long, default_value_t = 10)]
    season_length: u32,
    /// Host ticks per simulated day; the engine runs every `tick_period_ticks` of them
    #[arg(long, default_value_t = 800)]
    ticks_per_day: u32,
    /// Region worker threads; 0 runs jobs inline on the tick thread
    #[arg(long, default_value_t = 0)]
    workers: usize,
    /// Overrides `backup_root` from the configuration
    #[arg(long)]
    backup_root: Option<PathBuf>,
    /// Leave the world painted and the backups on disk when done
    #[arg(long)]
    keep_backups: bool,
}

/// Observer walking a circle around the origin.
struct Walker {
    id: ObserverId,
    phase: f64,
    orbit: f64,
}

impl Walker {
    fn at(&self, day: u32) -> Observer {
        let a = self.phase + f64::from(day) * 0.35;
        Observer {
            id: self.id,
            world: DEMO_WORLD,
            x: self.orbit * a.cos(),
            y: 80.0,
            z: self.orbit * a.sin(),
            facing: (-a.sin(), a.cos()),
        }
    }
}

#[derive(Default)]
struct Totals {
    ticks: u64,
    dispatched: u64,
    dropped: u64,
    painted: u64,
    nudges: u64,
}

pub fn run(args: SimulateArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(p) => RepaintConfig::load_from_path(p)?,
        None => RepaintConfig::default(),
    };
    if let Some(root) = &args.backup_root {
        config.backup_root = root.clone();
    }
    let registry = Arc::new(demo::load_registry(&config)?);
    let world = demo::noise_world(args.seed, &registry);
    world.load_square(DEMO_WORLD, RegionCoord::new(0, 0), args.radius);

    let calendar = Arc::new(FixedCalendar::new(CalendarState::new(
        Season::Spring,
        1,
        args.season_length.max(1),
    )));
    let mut engine = RepaintEngine::new(world.clone(), calendar.clone(), registry.clone(), config);
    if args.workers > 0 {
        engine = engine.with_executor(Arc::new(ShardedExecutor::new(args.workers)));
    }

    let orbit = f64::from(args.radius * REGION_SIZE) * 0.5;
    let walkers: Vec<Walker> = (0..args.observers)
        .map(|i| Walker {
            id: u64::from(i) + 1,
            phase: TAU * f64::from(i) / f64::from(args.observers.max(1)),
            orbit,
        })
        .collect();
    for w in &walkers {
        let o = w.at(0);
        world.upsert_observer(o);
        engine.on_observer_joined(&o);
    }

    let reloads = match (&args.config, args.watch) {
        (Some(path), true) => Some((path.clone(), watch::spawn_config_watcher(path.clone()))),
        _ => None,
    };

    println!(
        "simulating {} days ({} per season) over {} regions",
        args.days,
        args.season_length,
        world.loaded_regions(DEMO_WORLD).len()
    );
    let started = Instant::now();
    let mut totals = Totals::default();
    for day in 0..args.days {
        for _ in 0..args.ticks_per_day {
            let Some(r) = engine.on_host_tick(Instant::now()) else {
                continue;
            };
            totals.ticks += 1;
            totals.dispatched += r.dispatched as u64;
            totals.dropped += r.dropped as u64;
            totals.painted += r.painted as u64;
            totals.nudges += r.nudges as u64;
        }

        if let Some((path, rx)) = &reloads {
            if rx.try_iter().count() > 0 {
                match RepaintConfig::load_from_path(path) {
                    Ok(cfg) => {
                        engine.reload_config(cfg);
                        log::info!("reloaded {}", path.display());
                    }
                    Err(e) => log::warn!("ignoring {}: {e}", path.display()),
                }
            }
        }

        for w in &walkers {
            let o = w.at(day + 1);
            world.upsert_observer(o);
            engine.on_observer_moved(&o);
        }

        let ending = calendar.state().season;
        if calendar.advance_day() {
            engine.flush();
            print_season(ending, &engine, &world, &registry, &totals);
            engine.on_season_changed(calendar.state(), Instant::now());
        }
    }
    engine.flush();

    let stats = engine.stats();
    println!(
        "done in {:?}: {} ticks, {} dispatched, {} dropped, {} painted, {} writes, {} nudges",
        started.elapsed(),
        totals.ticks,
        totals.dispatched,
        totals.dropped,
        stats.painted,
        stats.writes,
        totals.nudges
    );
    if args.keep_backups {
        println!(
            "kept {} backups ({} written to disk)",
            stats.backups, stats.disk.written
        );
    } else {
        let reverted = engine.shutdown();
        println!("reverted {reverted} regions");
    }
    Ok(())
}

fn print_season(
    season: Season,
    engine: &RepaintEngine,
    world: &MemoryWorld,
    registry: &BiomeRegistry,
    totals: &Totals,
) {
    let stats = engine.stats();
    let mut counts: HashMap<BiomeId, usize> = HashMap::new();
    let mut cells = 0usize;
    for coord in world.loaded_regions(DEMO_WORLD) {
        for b in world.region_cells(DEMO_WORLD, coord).unwrap_or_default() {
            *counts.entry(b).or_insert(0) += 1;
            cells += 1;
        }
    }
    let mut top: Vec<(BiomeId, usize)> = counts.into_iter().collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let shares: Vec<String> = top
        .iter()
        .take(5)
        .map(|&(id, n)| {
            format!(
                "{} {:.0}%",
                registry.name_or_unknown(id),
                100.0 * n as f64 / cells.max(1) as f64
            )
        })
        .collect();
    println!(
        "end of {season}: painted={} writes={} backups={} cold={} queued={} ticks={} | {}",
        stats.painted,
        stats.writes,
        stats.backups,
        stats.cold,
        stats.queued,
        totals.ticks,
        shares.join(", ")
    );
}
