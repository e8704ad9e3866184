//! Region addressing, sampling geometry, and the world host seam.
#![forbid(unsafe_code)]

mod grid;
mod host;
pub mod memory;
mod region;

pub use grid::{SampleGrid, SamplePoint};
pub use host::{Observer, ObserverId, WorldBounds, WorldHost};
pub use memory::MemoryWorld;
pub use region::{REGION_SHIFT, REGION_SIZE, RegionCoord, RegionKey, WorldId};
