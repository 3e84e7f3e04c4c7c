//! # Galaxies
//!
//! Brute-force O(N²) gravity simulation rendered into a fading HDR
//! accumulation image. The physics and raster kernels live in the workspace
//! crates; this crate sequences them into frames on either backend.

pub mod pipeline;

pub use galaxy_physics::{Body, BodyStore, ConfigError, FrameParams, ImageSize, Preset};
pub use galaxy_renderer::{AccumulationImage, Presenter};
pub use galaxy_simulation::{GpuContext, SimulationError, SimulationResult};
pub use pipeline::*;

/// Fresh Body Store for `preset`, reproducible from `seed`
pub fn initialize(preset: Preset, count: usize, seed: u64) -> Result<BodyStore, ConfigError> {
    BodyStore::initialize(preset, count, seed)
}
