//! Force and integration kernels (CPU reference)
//!
//! These mirror the WGSL compute shaders one-to-one and run on rayon's
//! thread pool: one parallel unit per body, each doing its own O(N) inner
//! reduction over a read-only snapshot. They are also what the tests check
//! the GPU path against.
//!
//! Softening is added to the squared separation, so close encounters follow a
//! smoothed, non-singular law rather than exact Newtonian gravity.

use glam::Vec2;
use rayon::prelude::*;

use crate::body::Body;
use crate::constants::{DAMPING, DOMAIN_EXTENT, DOMAIN_PERIOD};

/// Net gravitational force on body `i` from every other body.
///
/// `F_i = Σ_{j≠i} m_i·m_j · normalize(p_j − p_i) / (|p_j − p_i|² + softening)`
///
/// Pairs with zero or non-finite separation contribute nothing, so a single
/// degenerate body cannot poison the sum.
pub fn net_force(bodies: &[Body], i: usize, softening: f32) -> Vec2 {
    let Some(body) = bodies.get(i) else {
        return Vec2::ZERO;
    };
    let pos_i = body.position();

    let mut force = Vec2::ZERO;
    for (j, other) in bodies.iter().enumerate() {
        if j == i {
            continue;
        }
        let delta = other.position() - pos_i;
        let dist_sq = delta.length_squared();
        if !(dist_sq > 0.0 && dist_sq.is_finite()) {
            continue;
        }
        let magnitude = body.mass * other.mass / (dist_sq + softening);
        let contribution = delta / dist_sq.sqrt() * magnitude;
        if contribution.is_finite() {
            force += contribution;
        }
    }
    force
}

/// Fill `forces[i]` with the net force on body `i`, in parallel over `i`.
pub fn accumulate_forces(bodies: &[Body], softening: f32, forces: &mut [Vec2]) {
    let n = bodies.len().min(forces.len());
    forces[..n]
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, force)| *force = net_force(bodies, i, softening));
}

/// `v += (F / m)·dt`, then `v *= DAMPING`.
///
/// Returns how many bodies were left untouched because their update was not
/// finite.
pub fn apply_forces(bodies: &mut [Body], forces: &[Vec2], delta_time: f32) -> usize {
    bodies
        .par_iter_mut()
        .zip(forces.par_iter())
        .map(|(body, force)| {
            let accel = *force / body.mass;
            let velocity = (body.velocity() + accel * delta_time) * DAMPING;
            if velocity.is_finite() {
                body.velocity = velocity.to_array();
                0
            } else {
                1
            }
        })
        .sum()
}

/// Force stage: accumulate into `scratch` then update velocities.
///
/// `scratch` is resized to the body count; keep it around between frames to
/// avoid reallocating.
pub fn force_step(
    bodies: &mut [Body],
    softening: f32,
    delta_time: f32,
    scratch: &mut Vec<Vec2>,
) -> usize {
    scratch.resize(bodies.len(), Vec2::ZERO);
    accumulate_forces(bodies, softening, scratch);
    apply_forces(bodies, scratch, delta_time)
}

/// Wrap one coordinate into the toroidal domain.
///
/// Values inside `[-1, 1]` (boundaries included) are returned unchanged.
/// Anything outside is reduced modulo the domain period, so arbitrarily large
/// excursions land back inside in a single step.
pub fn wrap_coordinate(x: f32) -> f32 {
    if (-DOMAIN_EXTENT..=DOMAIN_EXTENT).contains(&x) {
        return x;
    }
    (x + DOMAIN_EXTENT).rem_euclid(DOMAIN_PERIOD) - DOMAIN_EXTENT
}

/// Per-axis toroidal wrap
pub fn wrap_position(position: Vec2) -> Vec2 {
    Vec2::new(wrap_coordinate(position.x), wrap_coordinate(position.y))
}

/// Integrator stage: `p += v·dt`, then wrap. Must run after the force stage
/// has finished for every body.
pub fn integrate(bodies: &mut [Body], delta_time: f32) {
    bodies.par_iter_mut().for_each(|body| {
        let position = body.position() + body.velocity() * delta_time;
        body.position = wrap_position(position).to_array();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn body_at(x: f32, y: f32, mass: f32) -> Body {
        Body::new(Vec2::new(x, y), Vec2::ZERO, mass, Vec3::ONE)
    }

    #[test]
    fn test_empty_store_is_noop() {
        let mut bodies: Vec<Body> = Vec::new();
        let mut scratch = Vec::new();
        assert_eq!(force_step(&mut bodies, 0.01, 0.1, &mut scratch), 0);
        integrate(&mut bodies, 0.1);
        assert!(bodies.is_empty());
    }

    #[test]
    fn test_single_body_feels_no_force() {
        let mut bodies = vec![body_at(0.3, -0.2, 0.05)];
        assert_eq!(net_force(&bodies, 0, 1e-6), Vec2::ZERO);

        let mut scratch = Vec::new();
        force_step(&mut bodies, 1e-6, 10.0, &mut scratch);
        assert_eq!(bodies[0].velocity(), Vec2::ZERO);
    }

    #[test]
    fn test_symmetric_pair_forces_are_opposite() {
        let bodies = vec![body_at(-0.25, 0.1, 0.02), body_at(0.25, -0.1, 0.02)];
        let f0 = net_force(&bodies, 0, 0.001);
        let f1 = net_force(&bodies, 1, 0.001);
        assert!(f0.length() > 0.0);
        assert_eq!(f0, -f1);
        // Attractive: body 0 is pulled toward body 1
        assert!(f0.dot(bodies[1].position() - bodies[0].position()) > 0.0);
    }

    #[test]
    fn test_force_magnitude_matches_formula() {
        let softening = 0.01;
        let bodies = vec![body_at(0.0, 0.0, 0.5), body_at(0.3, 0.4, 2.0)];
        let expected = 0.5 * 2.0 / (0.25 + softening);
        let force = net_force(&bodies, 0, softening);
        assert!((force.length() - expected).abs() < 1e-4);
        assert!((force.normalize() - Vec2::new(0.6, 0.8)).length() < 1e-6);
    }

    #[test]
    fn test_coincident_bodies_stay_finite() {
        let mut bodies = vec![body_at(0.1, 0.1, 0.01), body_at(0.1, 0.1, 0.01)];
        let mut scratch = Vec::new();
        force_step(&mut bodies, 1e-3, 0.01, &mut scratch);
        assert!(bodies.iter().all(Body::is_finite));
    }

    #[test]
    fn test_non_finite_neighbour_is_dropped() {
        let mut bodies = vec![
            body_at(0.0, 0.0, 0.01),
            body_at(0.5, 0.0, 0.01),
            body_at(f32::NAN, 0.0, 0.01),
        ];
        let clean = net_force(&bodies[..2], 0, 1e-3);
        assert_eq!(net_force(&bodies, 0, 1e-3), clean);

        let mut scratch = Vec::new();
        force_step(&mut bodies, 1e-3, 0.01, &mut scratch);
        assert!(bodies[0].is_finite());
        assert!(bodies[1].is_finite());
    }

    #[test]
    fn test_damping_applied_after_update() {
        let mut bodies = vec![Body::new(Vec2::ZERO, Vec2::new(1.0, -2.0), 0.01, Vec3::ONE)];
        let mut scratch = Vec::new();
        force_step(&mut bodies, 0.01, 0.5, &mut scratch);
        assert_eq!(bodies[0].velocity(), Vec2::new(1.0, -2.0) * DAMPING);
    }

    #[test]
    fn test_zero_time_step_leaves_positions() {
        let mut bodies = vec![
            Body::new(Vec2::new(0.2, 0.3), Vec2::new(5.0, 1.0), 0.01, Vec3::ONE),
            body_at(-0.7, 0.9, 0.01),
        ];
        let before: Vec<_> = bodies.iter().map(Body::position).collect();
        integrate(&mut bodies, 0.0);
        let after: Vec<_> = bodies.iter().map(Body::position).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_wrap_past_boundary() {
        let wrapped = wrap_position(Vec2::new(1.01, 0.0));
        assert!((wrapped.x - (-0.99)).abs() < 1e-5);
        assert_eq!(wrapped.y, 0.0);

        let wrapped = wrap_position(Vec2::new(0.0, -1.25));
        assert!((wrapped.y - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_wrap_boundary_is_inclusive() {
        assert_eq!(wrap_coordinate(1.0), 1.0);
        assert_eq!(wrap_coordinate(-1.0), -1.0);
        assert_eq!(wrap_coordinate(0.999), 0.999);
    }

    #[test]
    fn test_integrate_wraps_after_step() {
        let mut bodies = vec![Body::new(
            Vec2::new(0.99, 0.0),
            Vec2::new(2.0, 0.0),
            0.01,
            Vec3::ONE,
        )];
        integrate(&mut bodies, 0.01);
        assert!((bodies[0].position().x - (-0.99)).abs() < 1e-5);
    }

    #[test]
    fn test_large_excursion_wraps_in_one_step() {
        let mut bodies = vec![Body::new(
            Vec2::new(0.5, -0.5),
            Vec2::new(500.3, -300.7),
            0.01,
            Vec3::ONE,
        )];
        integrate(&mut bodies, 0.01);
        let p = bodies[0].position();
        assert!(p.x.abs() <= 1.0 && p.y.abs() <= 1.0, "{p:?}");
    }
}
