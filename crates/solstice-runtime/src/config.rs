use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use solstice_biomes::TargetsConfig;

use crate::nudge::NudgeSettings;

fn default_true() -> bool {
    true
}
fn default_radius_regions() -> i32 {
    8
}
fn default_budget_per_tick() -> usize {
    16
}
fn default_tick_period_ticks() -> u32 {
    20
}
fn default_event_radius_regions() -> i32 {
    2
}
fn default_restore_budget_per_tick() -> usize {
    6
}
fn default_backup_root() -> PathBuf {
    PathBuf::from("biome_backups")
}
fn default_dispatch_factor() -> usize {
    4
}
fn default_window_ms() -> u64 {
    5000
}
fn default_budget_multiplier() -> f64 {
    3.0
}
fn default_pre_transition_days() -> u32 {
    3
}
fn default_step() -> u8 {
    4
}
fn default_nudge_per_tick() -> usize {
    8
}
fn default_nudge_cooldown_ms() -> u64 {
    3000
}
fn default_view_distance() -> i32 {
    10
}

#[derive(Clone, Debug, Deserialize)]
pub struct TransitionConfig {
    /// How long after a season change the boosted budget applies.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    #[serde(default = "default_budget_multiplier")]
    pub budget_multiplier: f64,
    /// Days before a season ends during which regions blend toward the next.
    #[serde(default = "default_pre_transition_days")]
    pub pre_transition_days: u32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            budget_multiplier: default_budget_multiplier(),
            pre_transition_days: default_pre_transition_days(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SampleConfig {
    #[serde(default = "default_step")]
    pub step_xz: u8,
    #[serde(default = "default_step")]
    pub step_y: u8,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            step_xz: default_step(),
            step_y: default_step(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NudgeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_nudge_per_tick")]
    pub per_tick: usize,
    #[serde(default = "default_nudge_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "default_view_distance")]
    pub view_distance: i32,
}

impl Default for NudgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_tick: default_nudge_per_tick(),
            cooldown_ms: default_nudge_cooldown_ms(),
            view_distance: default_view_distance(),
        }
    }
}

/// Engine configuration, read from a TOML file.
#[derive(Clone, Debug, Deserialize)]
pub struct RepaintConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Radius queued around every observer when the engine is enabled or
    /// reloaded.
    #[serde(default = "default_radius_regions")]
    pub radius_regions: i32,
    #[serde(default = "default_budget_per_tick")]
    pub budget_per_tick: usize,
    /// Host ticks between two engine ticks.
    #[serde(default = "default_tick_period_ticks")]
    pub tick_period_ticks: u32,
    /// Radius queued on joins, moves and season changes.
    #[serde(default = "default_event_radius_regions")]
    pub event_radius_regions: i32,
    #[serde(default)]
    pub prioritize_view: bool,
    #[serde(default = "default_restore_budget_per_tick")]
    pub restore_budget_per_tick: usize,
    #[serde(default = "default_backup_root")]
    pub backup_root: PathBuf,
    /// Upper bound on regions handed to the executor per tick, as a multiple
    /// of the budget.
    #[serde(default = "default_dispatch_factor")]
    pub dispatch_factor: usize,
    /// Optional biome registry file; the stock list is used when unset.
    #[serde(default)]
    pub biomes_file: Option<PathBuf>,
    #[serde(default)]
    pub transition: TransitionConfig,
    #[serde(default)]
    pub sample: SampleConfig,
    #[serde(default)]
    pub nudge: NudgeConfig,
    #[serde(flatten)]
    pub targets: TargetsConfig,
}

impl Default for RepaintConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            radius_regions: default_radius_regions(),
            budget_per_tick: default_budget_per_tick(),
            tick_period_ticks: default_tick_period_ticks(),
            event_radius_regions: default_event_radius_regions(),
            prioritize_view: false,
            restore_budget_per_tick: default_restore_budget_per_tick(),
            backup_root: default_backup_root(),
            dispatch_factor: default_dispatch_factor(),
            biomes_file: None,
            transition: TransitionConfig::default(),
            sample: SampleConfig::default(),
            nudge: NudgeConfig::default(),
            targets: TargetsConfig::default(),
        }
    }
}

impl RepaintConfig {
    /// Clamps values to the ranges the engine works with.
    pub fn normalized(mut self) -> Self {
        self.budget_per_tick = self.budget_per_tick.max(2);
        self.tick_period_ticks = self.tick_period_ticks.max(5);
        self.radius_regions = self.radius_regions.max(0);
        self.event_radius_regions = self.event_radius_regions.max(0);
        self.restore_budget_per_tick = self.restore_budget_per_tick.max(1);
        self.dispatch_factor = self.dispatch_factor.max(1);
        if !self.transition.budget_multiplier.is_finite() || self.transition.budget_multiplier < 1.0 {
            self.transition.budget_multiplier = 1.0;
        }
        self.sample.step_xz = self.sample.step_xz.clamp(1, 16);
        self.sample.step_y = self.sample.step_y.max(1);
        self.nudge.per_tick = self.nudge.per_tick.max(1);
        self.nudge.view_distance = self.nudge.view_distance.max(0);
        self
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: RepaintConfig = toml::from_str(toml_str)?;
        Ok(cfg.normalized())
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&s)
    }

    pub fn transition_window(&self) -> Duration {
        Duration::from_millis(self.transition.window_ms)
    }

    pub fn nudge_settings(&self) -> NudgeSettings {
        NudgeSettings {
            enabled: self.nudge.enabled,
            per_tick: self.nudge.per_tick,
            cooldown: Duration::from_millis(self.nudge.cooldown_ms),
            view_distance: self.nudge.view_distance,
        }
    }
}
