//! Body layout and the Body Store

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::config::ConfigError;
use crate::scene::{self, Preset};

/// GPU-compatible body structure
///
/// Matches the WGSL `Body` struct: `vec2` position, `vec2` velocity,
/// `vec3` color (16-byte aligned) and the mass packed into the color row's
/// trailing lane. 32 bytes, no padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Body {
    /// Position in the toroidal `[-1, 1]²` domain
    pub position: [f32; 2],
    /// Velocity in domain units per time unit
    pub velocity: [f32; 2],
    /// Linear RGB, unclamped, additively blended
    pub color: [f32; 3],
    /// Gravitational weight and visual size; always positive
    pub mass: f32,
}

impl Body {
    pub fn new(position: Vec2, velocity: Vec2, mass: f32, color: Vec3) -> Self {
        Self {
            position: position.to_array(),
            velocity: velocity.to_array(),
            color: color.to_array(),
            mass,
        }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::from_array(self.position)
    }

    pub fn velocity(&self) -> Vec2 {
        Vec2::from_array(self.velocity)
    }

    pub fn color(&self) -> Vec3 {
        Vec3::from_array(self.color)
    }

    /// Linear momentum `m·v`
    pub fn momentum(&self) -> Vec2 {
        self.velocity() * self.mass
    }

    /// True when every field is a finite number
    pub fn is_finite(&self) -> bool {
        self.position().is_finite()
            && self.velocity().is_finite()
            && self.color().is_finite()
            && self.mass.is_finite()
    }
}

/// Owned, validated array of bodies.
///
/// The count is fixed for the lifetime of a store; switching presets builds
/// a new store rather than resizing this one.
#[derive(Clone, Debug, Default)]
pub struct BodyStore {
    bodies: Vec<Body>,
}

impl BodyStore {
    /// Wrap a body array, rejecting non-positive or non-finite masses.
    pub fn new(bodies: Vec<Body>) -> Result<Self, ConfigError> {
        for (index, body) in bodies.iter().enumerate() {
            if !body.is_finite() {
                return Err(ConfigError::NonFiniteBody { index });
            }
            if body.mass <= 0.0 {
                return Err(ConfigError::NonPositiveMass {
                    index,
                    mass: body.mass,
                });
            }
        }
        Ok(Self { bodies })
    }

    /// Build a fresh store for `preset` with a seeded random source.
    pub fn initialize(preset: Preset, count: usize, seed: u64) -> Result<Self, ConfigError> {
        let bodies = scene::initialize_seeded(preset, count, seed);
        log::debug!("{} x {} bodies (seed {})", preset.name(), count, seed);
        Self::new(bodies)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// Mutable access for kernels. Kernels never change mass.
    pub fn bodies_mut(&mut self) -> &mut [Body] {
        &mut self.bodies
    }

    pub fn into_bodies(self) -> Vec<Body> {
        self.bodies
    }

    /// Total linear momentum of the store
    pub fn total_momentum(&self) -> Vec2 {
        self.bodies.iter().map(Body::momentum).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Body>(), 32);
        assert_eq!(std::mem::align_of::<Body>(), 4);
    }

    #[test]
    fn test_store_rejects_non_positive_mass() {
        let bodies = vec![
            Body::new(Vec2::ZERO, Vec2::ZERO, 0.01, Vec3::ONE),
            Body::new(Vec2::ONE * 0.5, Vec2::ZERO, 0.0, Vec3::ONE),
        ];
        match BodyStore::new(bodies) {
            Err(ConfigError::NonPositiveMass { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected NonPositiveMass, got {other:?}"),
        }
    }

    #[test]
    fn test_store_rejects_nan_position() {
        let bodies = vec![Body::new(
            Vec2::new(f32::NAN, 0.0),
            Vec2::ZERO,
            0.01,
            Vec3::ONE,
        )];
        assert!(matches!(
            BodyStore::new(bodies),
            Err(ConfigError::NonFiniteBody { index: 0 })
        ));
    }

    #[test]
    fn test_empty_store_is_valid() {
        let store = BodyStore::new(Vec::new()).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.total_momentum(), Vec2::ZERO);
    }
}
