//! Validated per-frame parameters and image dimensions
//!
//! Everything that could make a kernel divide by zero or produce NaN is
//! rejected here, so the per-frame path never has to report an error.

use thiserror::Error;

use crate::constants::DEFAULT_PARTICLE_SIZE;

/// Rejected configuration, raised when a store or frame setting is built
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("body {index} has non-positive mass {mass}")]
    NonPositiveMass { index: usize, mass: f32 },

    #[error("body {index} has a non-finite field")]
    NonFiniteBody { index: usize },

    #[error("softening must be positive and finite, got {0}")]
    NonPositiveSoftening(f32),

    #[error("time step must be finite and non-negative, got {0}")]
    InvalidTimeStep(f32),

    #[error("particle size must be positive and finite, got {0}")]
    NonPositiveParticleSize(f32),

    #[error("image must have non-zero size, got {width}x{height}")]
    ZeroSizedImage { width: u32, height: u32 },
}

/// Scalars consumed by one `step_and_render` call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    delta_time: f32,
    softening: f32,
    particle_size: f32,
    paused: bool,
    trails_enabled: bool,
}

impl FrameParams {
    pub fn new(delta_time: f32, softening: f32, particle_size: f32) -> Result<Self, ConfigError> {
        if !delta_time.is_finite() || delta_time < 0.0 {
            return Err(ConfigError::InvalidTimeStep(delta_time));
        }
        if !softening.is_finite() || softening <= 0.0 {
            return Err(ConfigError::NonPositiveSoftening(softening));
        }
        if !particle_size.is_finite() || particle_size <= 0.0 {
            return Err(ConfigError::NonPositiveParticleSize(particle_size));
        }
        Ok(Self {
            delta_time,
            softening,
            particle_size,
            paused: false,
            trails_enabled: true,
        })
    }

    pub fn with_paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    pub fn with_trails(mut self, trails_enabled: bool) -> Self {
        self.trails_enabled = trails_enabled;
        self
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn set_trails(&mut self, trails_enabled: bool) {
        self.trails_enabled = trails_enabled;
    }

    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    pub fn softening(&self) -> f32 {
        self.softening
    }

    pub fn particle_size(&self) -> f32 {
        self.particle_size
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn trails_enabled(&self) -> bool {
        self.trails_enabled
    }
}

impl Default for FrameParams {
    fn default() -> Self {
        Self {
            delta_time: 0.001,
            softening: 0.001,
            particle_size: DEFAULT_PARTICLE_SIZE,
            paused: false,
            trails_enabled: true,
        }
    }
}

/// Fixed resolution of the accumulation image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    width: u32,
    height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::ZeroSizedImage { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Width over height; scales x so splats stay circular
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}
