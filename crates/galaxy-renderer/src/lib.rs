//! # Galaxy Renderer
//!
//! Fade/splat accumulation image for the gravity simulation, with a CPU
//! (rayon) reference and GPU compute passes, plus window presentation.

pub mod accumulator;
pub mod image;
pub mod params;
pub mod presenter;
pub mod raster;

pub use accumulator::*;
pub use image::*;
pub use params::*;
pub use presenter::*;
pub use raster::*;
