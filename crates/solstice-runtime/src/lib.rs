//! Seasonal repaint engine: scheduling, target resolution, and region painting.
#![forbid(unsafe_code)]

pub mod blend;
mod calendar;
mod classify;
mod cold;
pub mod config;
mod engine;
mod executor;
mod nudge;
mod offsets;
mod painter;
mod queue;
mod target_cache;

pub use calendar::{Calendar, CalendarState, FixedCalendar};
pub use classify::FamilyClassifier;
pub use cold::ColdRegions;
pub use config::RepaintConfig;
pub use engine::{EngineStats, RepaintEngine, TickReport, effective_budget};
pub use executor::{InlineExecutor, RegionExecutor, RegionJob, ShardedExecutor};
pub use nudge::{NudgeQueue, NudgeSettings};
pub use offsets::{Offset, OffsetCache};
pub use painter::{PaintReport, RegionPainter};
pub use queue::{PendingRegion, WorkQueue};
pub use target_cache::TargetCache;
