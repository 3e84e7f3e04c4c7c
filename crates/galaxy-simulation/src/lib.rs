//! # Galaxy Simulation Engine
//!
//! GPU-based brute-force N-body gravity using compute shaders: one invocation
//! per body for the force pass, then one per body for integration.

pub mod context;
pub mod error;
pub mod params;
pub mod simulation;

pub use context::*;
pub use error::*;
pub use params::*;
pub use simulation::*;
