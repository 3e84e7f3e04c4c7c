//! Simulation uniforms

use bytemuck::{Pod, Zeroable};
use galaxy_physics::{FrameParams, DAMPING};

/// Matches the WGSL `SimParams` uniform (one 16-byte row)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SimParams {
    pub delta_time: f32,
    pub softening: f32,
    pub damping: f32,
    pub body_count: u32,
}

impl SimParams {
    pub fn new(frame: &FrameParams, body_count: u32) -> Self {
        Self {
            delta_time: frame.delta_time(),
            softening: frame.softening(),
            damping: DAMPING,
            body_count,
        }
    }
}

impl Default for SimParams {
    fn default() -> Self {
        Self::new(&FrameParams::default(), 0)
    }
}
