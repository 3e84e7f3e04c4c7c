//! Fade and splat kernels (CPU reference)
//!
//! Same math as `fade.wgsl` and `splat.wgsl`, parallel over image rows with
//! rayon. The splat pass is O(width · height · N) in principle and, with the
//! force pass, is what needs the parallel backend to stay real-time. Bodies
//! are culled per row, which is exact because a splat is zero beyond twice
//! its size.

use galaxy_physics::{Body, ImageSize};
use glam::{Vec2, Vec3};
use rayon::prelude::*;

use crate::image::{background_pixel, AccumulationImage, Pixel};

/// Dark blue tint every pixel decays toward (linear RGB)
pub const BACKGROUND_COLOR: [f32; 3] = [0.004, 0.006, 0.02];

/// Share of the previous frame kept by the trail fade
pub const FADE_KEEP: f32 = 0.95;
/// Share of the background blended in by the trail fade
pub const FADE_BLEND: f32 = 0.05;

/// Brightness multiplier applied to every body splat
pub const SPLAT_GAIN: f32 = 5.0;

pub const STAR_HASH_X: u32 = 73_856_093;
pub const STAR_HASH_Y: u32 = 19_349_663;
pub const STAR_MODULUS: u32 = 10_000;
/// A pixel is a star when `(hash % 10000) / 10000 > 0.998`, i.e.
/// `hash % 10000 > 9980`. Compared as integers so CPU and GPU agree exactly.
pub const STAR_CUTOFF: u32 = 9_980;
/// White added to star pixels each frame
pub const STAR_BRIGHTNESS: f32 = 0.15;

/// How the previous frame is treated before splatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeMode {
    /// Exponential decay toward the background (motion trails)
    Trails,
    /// Replace every pixel with the background
    Clear,
}

impl FadeMode {
    pub fn from_trails(trails_enabled: bool) -> Self {
        if trails_enabled {
            FadeMode::Trails
        } else {
            FadeMode::Clear
        }
    }

    /// `(keep, blend)` in `pixel = pixel·keep + background·blend`
    pub fn factors(&self) -> (f32, f32) {
        match self {
            FadeMode::Trails => (FADE_KEEP, FADE_BLEND),
            FadeMode::Clear => (0.0, 1.0),
        }
    }
}

/// Fade pass. Non-finite pixels are reset to the background so one bad frame
/// cannot stick around forever.
pub fn fade(image: &mut AccumulationImage, mode: FadeMode) {
    let background = background_pixel();
    let (keep, blend) = mode.factors();

    image.pixels_mut().par_iter_mut().for_each(|pixel| {
        if mode == FadeMode::Clear || !pixel.iter().all(|c| c.is_finite()) {
            *pixel = background;
            return;
        }
        for (channel, bg) in pixel.iter_mut().zip(background) {
            *channel = *channel * keep + bg * blend;
        }
    });
}

/// Hermite falloff that is 1 at the centre and 0 from `2·size` outward.
///
/// Equivalent to `smoothstep(2·size, 0, distance)` with reversed edges.
pub fn falloff(size: f32, distance: f32) -> f32 {
    let t = (1.0 - distance / (2.0 * size)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Centre of pixel `(x, y)` in aspect-corrected world space, `+y` up.
pub fn pixel_to_world(x: u32, y: u32, size: ImageSize) -> Vec2 {
    let u = (x as f32 + 0.5) / size.width() as f32 * 2.0 - 1.0;
    let v = 1.0 - (y as f32 + 0.5) / size.height() as f32 * 2.0;
    Vec2::new(u * size.aspect(), v)
}

/// Body position in the same aspect-corrected space as [`pixel_to_world`]
pub fn body_to_world(position: Vec2, aspect: f32) -> Vec2 {
    Vec2::new(position.x * aspect, position.y)
}

pub fn star_hash(x: u32, y: u32) -> u32 {
    x.wrapping_mul(STAR_HASH_X) ^ y.wrapping_mul(STAR_HASH_Y)
}

/// Pseudo-random value in `[0, 1)` derived only from the pixel coordinates
pub fn star_value(x: u32, y: u32) -> f32 {
    (star_hash(x, y) % STAR_MODULUS) as f32 / STAR_MODULUS as f32
}

/// Whether `(x, y)` belongs to the fixed starfield
pub fn is_star(x: u32, y: u32) -> bool {
    star_hash(x, y) % STAR_MODULUS > STAR_CUTOFF
}

/// One body prepared for splatting
#[derive(Debug, Clone, Copy)]
struct SplatSource {
    center: Vec2,
    size: f32,
    reach: f32,
    /// `color · mass · SPLAT_GAIN`
    tint: Vec3,
}

impl SplatSource {
    fn new(body: &Body, aspect: f32, particle_size: f32) -> Option<Self> {
        if !body.is_finite() || body.mass <= 0.0 {
            return None;
        }
        let size = particle_size * body.mass.sqrt();
        let tint = body.color() * body.mass * SPLAT_GAIN;
        if !(size > 0.0 && size.is_finite() && tint.is_finite()) {
            return None;
        }
        Some(Self {
            center: body_to_world(body.position(), aspect),
            size,
            reach: 2.0 * size,
            tint,
        })
    }

    fn light_at(&self, point: Vec2) -> Vec3 {
        let distance = point.distance(self.center);
        if distance >= self.reach {
            return Vec3::ZERO;
        }
        let intensity = falloff(self.size, distance);
        self.tint * (intensity * intensity)
    }
}

/// Light from one body at a world-space point: `color·intensity·mass·5`
/// with `intensity = falloff(size, distance)²`. `None` if the body is
/// degenerate and must be dropped.
pub fn body_contribution(
    body: &Body,
    point: Vec2,
    aspect: f32,
    particle_size: f32,
) -> Option<Vec3> {
    SplatSource::new(body, aspect, particle_size).map(|source| source.light_at(point))
}

/// Splat pass: adds every body's light and the starfield on top of the
/// (already faded) pixel.
///
/// Returns how many bodies were dropped as degenerate.
pub fn splat(image: &mut AccumulationImage, bodies: &[Body], particle_size: f32) -> usize {
    let size = image.size();
    let aspect = size.aspect();
    let width = size.width() as usize;

    let sources: Vec<SplatSource> = bodies
        .iter()
        .filter_map(|body| SplatSource::new(body, aspect, particle_size))
        .collect();
    let dropped = bodies.len() - sources.len();

    image
        .pixels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as u32;
            let row_v = pixel_to_world(0, y, size).y;
            let nearby: Vec<&SplatSource> = sources
                .iter()
                .filter(|s| (s.center.y - row_v).abs() < s.reach)
                .collect();

            for (x, pixel) in row.iter_mut().enumerate() {
                let x = x as u32;
                let point = pixel_to_world(x, y, size);
                let mut light: Vec3 = nearby.iter().map(|s| s.light_at(point)).sum();
                if is_star(x, y) {
                    light += Vec3::splat(STAR_BRIGHTNESS);
                }
                add_light(pixel, light);
            }
        });

    dropped
}

fn add_light(pixel: &mut Pixel, light: Vec3) {
    pixel[0] += light.x;
    pixel[1] += light.y;
    pixel[2] += light.z;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(width: u32, height: u32) -> AccumulationImage {
        AccumulationImage::new(ImageSize::new(width, height).unwrap()).unwrap()
    }

    fn deviation(pixel: Pixel) -> f32 {
        pixel
            .iter()
            .zip(background_pixel())
            .map(|(c, bg)| (c - bg).abs())
            .fold(0.0, f32::max)
    }

    #[test]
    fn test_fade_converges_geometrically() {
        let mut img = image(4, 4);
        img.pixels_mut().fill([3.0, 1.5, 0.5, 1.0]);
        let initial = deviation(img.pixel(0, 0));

        for k in 1..=40 {
            fade(&mut img, FadeMode::Trails);
            let bound = FADE_KEEP.powi(k) * initial * 1.001 + 1e-6;
            for pixel in img.pixels() {
                assert!(deviation(*pixel) <= bound, "k={k}");
            }
        }
    }

    #[test]
    fn test_fade_without_trails_clears() {
        let mut img = image(4, 2);
        img.pixels_mut().fill([7.0, 7.0, 7.0, 1.0]);
        fade(&mut img, FadeMode::Clear);
        assert!(img.pixels().iter().all(|p| *p == background_pixel()));
    }

    #[test]
    fn test_fade_resets_nan_pixels() {
        let mut img = image(2, 2);
        img.pixels_mut()[3] = [f32::NAN, 0.0, 0.0, 1.0];
        fade(&mut img, FadeMode::Trails);
        assert_eq!(img.pixels()[3], background_pixel());
    }

    #[test]
    fn test_falloff_shape() {
        assert_eq!(falloff(1.0, 0.0), 1.0);
        assert_eq!(falloff(1.0, 2.0), 0.0);
        assert_eq!(falloff(1.0, 5.0), 0.0);
        assert!((falloff(1.0, 1.0) - 0.5).abs() < 1e-6);
        assert!(falloff(1.0, 0.5) > falloff(1.0, 1.5));
    }

    #[test]
    fn test_pixel_mapping_is_aspect_corrected() {
        let size = ImageSize::new(200, 100).unwrap();
        let top_left = pixel_to_world(0, 0, size);
        let bottom_right = pixel_to_world(199, 99, size);
        assert!((top_left.x + 2.0).abs() < 0.02);
        assert!((top_left.y - 1.0).abs() < 0.02);
        assert!((bottom_right.x - 2.0).abs() < 0.02);
        assert!((bottom_right.y + 1.0).abs() < 0.02);
        assert_eq!(body_to_world(Vec2::new(0.5, 0.5), size.aspect()), Vec2::new(1.0, 0.5));
    }

    #[test]
    fn test_contribution_formula() {
        let body = Body::new(Vec2::ZERO, Vec2::ZERO, 0.04, Vec3::new(1.0, 0.5, 0.0));
        let particle_size = 0.05;
        let size = particle_size * 0.2;

        let at_center = body_contribution(&body, Vec2::ZERO, 1.0, particle_size).unwrap();
        assert!((at_center - Vec3::new(1.0, 0.5, 0.0) * 0.04 * SPLAT_GAIN).length() < 1e-6);

        let at_size = body_contribution(&body, Vec2::new(size, 0.0), 1.0, particle_size).unwrap();
        let expected = Vec3::new(1.0, 0.5, 0.0) * 0.25 * 0.04 * SPLAT_GAIN;
        assert!((at_size - expected).length() < 1e-5);

        let outside =
            body_contribution(&body, Vec2::new(3.0 * size, 0.0), 1.0, particle_size).unwrap();
        assert_eq!(outside, Vec3::ZERO);
    }

    #[test]
    fn test_degenerate_body_is_dropped() {
        let bad = Body::new(Vec2::new(f32::INFINITY, 0.0), Vec2::ZERO, 0.01, Vec3::ONE);
        assert!(body_contribution(&bad, Vec2::ZERO, 1.0, 0.01).is_none());

        let mut img = image(16, 16);
        let good = Body::new(Vec2::ZERO, Vec2::ZERO, 0.01, Vec3::ONE);
        assert_eq!(splat(&mut img, &[bad, good], 0.05), 1);
        assert!(img.pixels().iter().flatten().all(|c| c.is_finite()));
    }

    #[test]
    fn test_splat_adds_on_top_of_base() {
        let mut img = image(32, 32);
        let body = Body::new(Vec2::ZERO, Vec2::ZERO, 0.02, Vec3::new(1.0, 0.0, 0.0));
        let before = img.pixel(16, 16);
        splat(&mut img, &[body], 0.5);
        let after = img.pixel(16, 16);
        assert!(after[0] > before[0]);
        assert_eq!(after[1], before[1] + if is_star(16, 16) { STAR_BRIGHTNESS } else { 0.0 });
        assert_eq!(after[3], before[3]);

        // Far corner untouched by the body
        let corner_before = background_pixel();
        let corner = img.pixel(0, 31);
        let star = if is_star(0, 31) { STAR_BRIGHTNESS } else { 0.0 };
        assert_eq!(corner[0], corner_before[0] + star);
    }

    #[test]
    fn test_empty_store_splats_only_stars() {
        let mut img = image(64, 64);
        assert_eq!(splat(&mut img, &[], 0.01), 0);
        for y in 0..64 {
            for x in 0..64 {
                let lit = img.pixel(x, y)[0] > background_pixel()[0];
                assert_eq!(lit, is_star(x, y));
            }
        }
    }

    #[test]
    fn test_starfield_is_stable() {
        let first: Vec<(u32, u32)> = (0..256)
            .flat_map(|y| (0..256).map(move |x| (x, y)))
            .filter(|&(x, y)| is_star(x, y))
            .collect();
        let second: Vec<(u32, u32)> = (0..256)
            .flat_map(|y| (0..256).map(move |x| (x, y)))
            .filter(|&(x, y)| is_star(x, y))
            .collect();
        assert_eq!(first, second);
        // Roughly 0.19% of pixels
        assert!(!first.is_empty());
        assert!(first.len() < 256 * 256 / 100);
        for &(x, y) in &first {
            assert!(star_value(x, y) > 0.998);
        }
    }

    #[test]
    fn test_star_hash_wraps() {
        assert_eq!(star_hash(0, 0), 0);
        assert_eq!(star_hash(1, 0), STAR_HASH_X);
        assert_eq!(
            star_hash(100, 200),
            100u32.wrapping_mul(STAR_HASH_X) ^ 200u32.wrapping_mul(STAR_HASH_Y)
        );
    }
}
