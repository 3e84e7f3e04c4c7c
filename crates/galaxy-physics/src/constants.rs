//! Simulation constants
//!
//! Values live in an abstract normalized coordinate space, not physical units.

/// Per-step velocity damping applied after the force update
pub const DAMPING: f32 = 0.9999;

/// Half-extent of the toroidal simulation domain (positions live in `[-1, 1]`)
pub const DOMAIN_EXTENT: f32 = 1.0;

/// Full period of the toroidal domain along each axis
pub const DOMAIN_PERIOD: f32 = 2.0 * DOMAIN_EXTENT;

// Random cloud preset
/// Positions are drawn uniformly from `[-CLOUD_EXTENT, CLOUD_EXTENT]²`
pub const CLOUD_EXTENT: f32 = 0.8;
/// Velocities are drawn uniformly from `[-CLOUD_SPEED, CLOUD_SPEED]²`
pub const CLOUD_SPEED: f32 = 0.1;
pub const CLOUD_MASS_MIN: f32 = 0.005;
pub const CLOUD_MASS_MAX: f32 = 0.02;

// Binary star preset
/// Cluster centres sit at `x = ∓BINARY_OFFSET`
pub const BINARY_OFFSET: f32 = 0.5;
pub const BINARY_RADIUS: f32 = 0.3;

// Galaxy collision preset
/// Galaxy centres sit at `x = ∓GALAXY_OFFSET`
pub const GALAXY_OFFSET: f32 = 0.4;
pub const GALAXY_RADIUS: f32 = 0.4;
/// Bulk velocity along x pushing the galaxies into each other
pub const GALAXY_DRIFT: f32 = 0.1;

/// Mass shared by every body in the disk presets
pub const STAR_MASS: f32 = 0.01;

/// Tangential speed per unit radius for disk presets.
/// Scripted initial condition, not a solved circular orbit.
pub const ORBIT_SPEED: f32 = 0.6;

/// Splat radius scale. A `STAR_MASS` body reaches `2 · 0.05 · 0.1 = 0.01`
/// world units, about 3.6 pixels on a 720-row image.
pub const DEFAULT_PARTICLE_SIZE: f32 = 0.05;

/// Default random seed used by the driver
pub const DEFAULT_SEED: u64 = 42;
