//! # Galaxy Physics
//!
//! Body layout, scene presets and CPU reference kernels for a brute-force
//! 2D gravitational N-body simulation in a toroidal `[-1, 1]²` domain.

pub mod body;
pub mod config;
pub mod constants;
pub mod forces;
pub mod scene;

pub use body::*;
pub use config::*;
pub use constants::*;
pub use forces::*;
pub use scene::*;
