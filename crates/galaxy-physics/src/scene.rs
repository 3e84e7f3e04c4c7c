//! Scene presets and the initial-condition generator
//!
//! Orbit seeding in the disk presets is a scripted heuristic (tangential
//! speed proportional to radius), not a derived circular orbit.

use std::f32::consts::TAU;
use std::fmt;
use std::str::FromStr;

use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::body::Body;
use crate::constants::*;

const BINARY_LEFT_COLOR: Vec3 = Vec3::new(1.0, 0.45, 0.3);
const BINARY_RIGHT_COLOR: Vec3 = Vec3::new(0.3, 0.5, 1.0);
const GALAXY_LEFT_COLOR: Vec3 = Vec3::new(1.0, 0.7, 0.35);
const GALAXY_RIGHT_COLOR: Vec3 = Vec3::new(0.4, 0.8, 1.0);

/// Scene archetype consumed once to build a Body Store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    RandomCloud,
    BinaryStar,
    GalaxyCollision,
}

impl Preset {
    pub const ALL: [Preset; 3] = [
        Preset::RandomCloud,
        Preset::BinaryStar,
        Preset::GalaxyCollision,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::RandomCloud => "random-cloud",
            Preset::BinaryStar => "binary-star",
            Preset::GalaxyCollision => "galaxy-collision",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown preset '{0}' (expected random-cloud, binary-star or galaxy-collision)")]
pub struct ParsePresetError(String);

impl FromStr for Preset {
    type Err = ParsePresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParsePresetError(s.to_string()))
    }
}

/// Build `count` bodies for `preset` using a seeded [`StdRng`].
pub fn initialize_seeded(preset: Preset, count: usize, seed: u64) -> Vec<Body> {
    let mut rng = StdRng::seed_from_u64(seed);
    initialize(preset, count, &mut rng)
}

/// Build `count` bodies for `preset` from an injected random source.
pub fn initialize<R: Rng + ?Sized>(preset: Preset, count: usize, rng: &mut R) -> Vec<Body> {
    match preset {
        Preset::RandomCloud => random_cloud(count, rng),
        Preset::BinaryStar => binary_star(count, rng),
        Preset::GalaxyCollision => galaxy_collision(count, rng),
    }
}

fn random_cloud<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<Body> {
    (0..count)
        .map(|_| {
            let position = Vec2::new(
                rng.random_range(-CLOUD_EXTENT..=CLOUD_EXTENT),
                rng.random_range(-CLOUD_EXTENT..=CLOUD_EXTENT),
            );
            let velocity = Vec2::new(
                rng.random_range(-CLOUD_SPEED..=CLOUD_SPEED),
                rng.random_range(-CLOUD_SPEED..=CLOUD_SPEED),
            );
            let mass = rng.random_range(CLOUD_MASS_MIN..=CLOUD_MASS_MAX);
            // Pastel: every channel in [0.5, 1.0]
            let color = Vec3::new(
                0.5 + 0.5 * rng.random::<f32>(),
                0.5 + 0.5 * rng.random::<f32>(),
                0.5 + 0.5 * rng.random::<f32>(),
            );
            Body::new(position, velocity, mass, color)
        })
        .collect()
}

/// Number of bodies in the left star of a binary split.
///
/// The left star takes the extra body when `count` is odd.
pub fn binary_left_count(count: usize) -> usize {
    count.div_ceil(2)
}

fn binary_star<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<Body> {
    let left = binary_left_count(count);
    (0..count)
        .map(|i| {
            let (center, color) = if i < left {
                (Vec2::new(-BINARY_OFFSET, 0.0), BINARY_LEFT_COLOR)
            } else {
                (Vec2::new(BINARY_OFFSET, 0.0), BINARY_RIGHT_COLOR)
            };
            disk_body(rng, center, BINARY_RADIUS, Vec2::ZERO, color)
        })
        .collect()
}

fn galaxy_collision<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<Body> {
    (0..count)
        .map(|_| {
            if rng.random_bool(0.5) {
                disk_body(
                    rng,
                    Vec2::new(-GALAXY_OFFSET, 0.0),
                    GALAXY_RADIUS,
                    Vec2::new(GALAXY_DRIFT, 0.0),
                    GALAXY_LEFT_COLOR,
                )
            } else {
                disk_body(
                    rng,
                    Vec2::new(GALAXY_OFFSET, 0.0),
                    GALAXY_RADIUS,
                    Vec2::new(-GALAXY_DRIFT, 0.0),
                    GALAXY_RIGHT_COLOR,
                )
            }
        })
        .collect()
}

/// Place one body uniformly (by area) on a disk with counter-clockwise
/// tangential velocity `ORBIT_SPEED · r` plus a bulk `drift`.
fn disk_body<R: Rng + ?Sized>(
    rng: &mut R,
    center: Vec2,
    radius: f32,
    drift: Vec2,
    color: Vec3,
) -> Body {
    let angle = rng.random_range(0.0..TAU);
    let r = radius * rng.random::<f32>().sqrt();
    let offset = Vec2::from_angle(angle) * r;
    let velocity = offset.perp() * ORBIT_SPEED + drift;
    Body::new(center + offset, velocity, STAR_MASS, color)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_seeded_initialization_is_deterministic() {
        for preset in Preset::ALL {
            let a = initialize_seeded(preset, 64, 7);
            let b = initialize_seeded(preset, 64, 7);
            let c = initialize_seeded(preset, 64, 8);
            assert_eq!(a, b, "{preset} not deterministic");
            assert_ne!(a, c, "{preset} ignores the seed");
        }
    }

    #[test]
    fn test_zero_count_is_empty() {
        for preset in Preset::ALL {
            assert!(initialize_seeded(preset, 0, 1).is_empty());
        }
    }

    #[test]
    fn test_random_cloud_ranges() {
        for body in initialize_seeded(Preset::RandomCloud, 500, 3) {
            assert!(body.position().abs().max_element() <= CLOUD_EXTENT);
            assert!(body.velocity().abs().max_element() <= CLOUD_SPEED);
            assert!((CLOUD_MASS_MIN..=CLOUD_MASS_MAX).contains(&body.mass));
            assert!(body.color().min_element() >= 0.5);
            assert!(body.color().max_element() <= 1.0);
        }
    }

    #[test]
    fn test_binary_star_halves() {
        let bodies = initialize_seeded(Preset::BinaryStar, 200, 11);
        for (i, body) in bodies.iter().enumerate() {
            let center = if i < 100 {
                Vec2::new(-BINARY_OFFSET, 0.0)
            } else {
                Vec2::new(BINARY_OFFSET, 0.0)
            };
            let offset = body.position() - center;
            assert!(offset.length() <= BINARY_RADIUS + EPS);
            assert_eq!(body.mass, STAR_MASS);
            // Tangential: perpendicular to the radius, magnitude ∝ radius
            assert!(offset.dot(body.velocity()).abs() < EPS);
            assert!((body.velocity().length() - ORBIT_SPEED * offset.length()).abs() < EPS);
        }
        assert_eq!(bodies[0].color(), BINARY_LEFT_COLOR);
        assert_eq!(bodies[199].color(), BINARY_RIGHT_COLOR);
    }

    #[test]
    fn test_binary_star_odd_count_extra_goes_left() {
        assert_eq!(binary_left_count(5), 3);
        assert_eq!(binary_left_count(4), 2);
        assert_eq!(binary_left_count(1), 1);
        assert_eq!(binary_left_count(0), 0);

        let bodies = initialize_seeded(Preset::BinaryStar, 5, 2);
        let left = bodies
            .iter()
            .filter(|b| b.color() == BINARY_LEFT_COLOR)
            .count();
        assert_eq!(left, 3);
        assert!(bodies[..3].iter().all(|b| b.position().x < 0.0));
    }

    #[test]
    fn test_galaxy_collision_sides_and_drift() {
        let bodies = initialize_seeded(Preset::GalaxyCollision, 400, 5);
        let mut left = 0;
        for body in &bodies {
            let (center, drift) = if body.color() == GALAXY_LEFT_COLOR {
                left += 1;
                (Vec2::new(-GALAXY_OFFSET, 0.0), Vec2::new(GALAXY_DRIFT, 0.0))
            } else {
                assert_eq!(body.color(), GALAXY_RIGHT_COLOR);
                (Vec2::new(GALAXY_OFFSET, 0.0), Vec2::new(-GALAXY_DRIFT, 0.0))
            };
            let offset = body.position() - center;
            assert!(offset.length() <= GALAXY_RADIUS + EPS);
            let tangential = body.velocity() - drift;
            assert!(offset.dot(tangential).abs() < EPS);
            assert_eq!(body.mass, STAR_MASS);
        }
        // Coin flip: both sides populated, roughly even
        assert!((120..280).contains(&left), "left = {left}");
    }

    #[test]
    fn test_preset_parse() {
        assert_eq!("binary-star".parse::<Preset>(), Ok(Preset::BinaryStar));
        assert_eq!("Galaxy-Collision".parse::<Preset>(), Ok(Preset::GalaxyCollision));
        assert!("nebula".parse::<Preset>().is_err());
        for preset in Preset::ALL {
            assert_eq!(preset.to_string().parse::<Preset>(), Ok(preset));
        }
    }

    #[test]
    fn test_all_masses_positive() {
        for preset in Preset::ALL {
            assert!(initialize_seeded(preset, 300, 9).iter().all(|b| b.mass > 0.0));
        }
    }
}
