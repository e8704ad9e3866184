use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use solstice_backup::{RestoreProgress, RestoreReport};
use solstice_runtime::{CalendarState, FixedCalendar, RepaintConfig, RepaintEngine};
use solstice_biomes::Season;

use crate::demo;

#[derive(Args)]
pub struct RestoreArgs {
    /// Backup root directory
    #[arg(long, default_value = "biome_backups")]
    backup_root: PathBuf,
    /// Seed of the world the backups were taken from
    #[arg(long, default_value_t = 1337)]
    seed: i32,
    /// Files restored per tick; defaults to `restore_budget_per_tick`
    #[arg(long)]
    budget: Option<usize>,
    /// Engine configuration (for the biome registry and fallback biome)
    #[arg(long)]
    config: Option<PathBuf>,
}

struct PrintProgress;

impl RestoreProgress for PrintProgress {
    fn started(&mut self, total: usize) {
        println!("restoring {total} backup files");
    }

    fn finished(&mut self, report: RestoreReport) {
        println!("restored {} regions, {} failed", report.restored, report.failed);
    }
}

pub fn run(args: RestoreArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(p) => RepaintConfig::load_from_path(p)?,
        None => RepaintConfig::default(),
    };
    config.enabled = false;
    config.backup_root = args.backup_root.clone();
    let budget = args.budget.unwrap_or(config.restore_budget_per_tick);

    let registry = Arc::new(demo::load_registry(&config)?);
    let world = demo::noise_world(args.seed, &registry);
    let calendar = Arc::new(FixedCalendar::new(CalendarState::new(Season::Spring, 1, 1)));
    let engine = RepaintEngine::new(world, calendar, registry, config);

    let started = Instant::now();
    engine.start_restore_all(Box::new(PrintProgress), budget);
    while engine.is_restoring() {
        engine.tick(Instant::now());
        std::thread::sleep(Duration::from_millis(1));
    }
    log::info!("restore took {:?}", started.elapsed());
    Ok(())
}
