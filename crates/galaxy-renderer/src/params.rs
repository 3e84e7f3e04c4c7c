//! Rendering uniforms

use bytemuck::{Pod, Zeroable};
use galaxy_physics::{FrameParams, ImageSize};

use crate::raster::{FadeMode, BACKGROUND_COLOR, SPLAT_GAIN, STAR_BRIGHTNESS};

/// Matches the WGSL `RenderParams` uniform
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct RenderParams {
    // rgb: background, a: 1
    pub background: [f32; 4],

    // x: width, y: height, z: body_count, w: padding
    pub extent: [u32; 4],

    // x: fade keep, y: fade blend, z: particle_size, w: aspect
    pub shading: [f32; 4],

    // x: splat gain, y: star brightness, z/w: padding
    pub glow: [f32; 4],
}

impl RenderParams {
    pub fn new(size: ImageSize, frame: &FrameParams, body_count: u32) -> Self {
        let (keep, blend) = FadeMode::from_trails(frame.trails_enabled()).factors();
        Self {
            background: [
                BACKGROUND_COLOR[0],
                BACKGROUND_COLOR[1],
                BACKGROUND_COLOR[2],
                1.0,
            ],
            extent: [size.width(), size.height(), body_count, 0],
            shading: [keep, blend, frame.particle_size(), size.aspect()],
            glow: [SPLAT_GAIN, STAR_BRIGHTNESS, 0.0, 0.0],
        }
    }
}
