//! Host-side accumulation image

use galaxy_physics::ImageSize;
use galaxy_simulation::{SimulationError, SimulationResult};

use crate::raster::BACKGROUND_COLOR;

/// HDR RGBA pixel, linear
pub type Pixel = [f32; 4];

/// Background with full alpha
pub fn background_pixel() -> Pixel {
    [
        BACKGROUND_COLOR[0],
        BACKGROUND_COLOR[1],
        BACKGROUND_COLOR[2],
        1.0,
    ]
}

/// Fixed-resolution HDR image, row-major, row 0 at the top.
///
/// Lives for the whole run and is mutated in place by the fade and splat
/// kernels every frame.
#[derive(Clone, Debug)]
pub struct AccumulationImage {
    size: ImageSize,
    pixels: Vec<Pixel>,
}

impl AccumulationImage {
    /// Allocate a background-filled image, reporting allocation failure
    /// instead of aborting.
    pub fn new(size: ImageSize) -> SimulationResult<Self> {
        let count = size.pixel_count();
        let requested = (count as u64).saturating_mul(std::mem::size_of::<Pixel>() as u64);

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(count)
            .map_err(|_| SimulationError::HostAllocation {
                resource: "accumulation image",
                requested,
            })?;
        pixels.resize(count, background_pixel());

        Ok(Self { size, pixels })
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width()
    }

    pub fn height(&self) -> u32 {
        self.size.height()
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Pixel] {
        &mut self.pixels
    }

    /// Pixel at column `x`, row `y` (panics when out of bounds)
    pub fn pixel(&self, x: u32, y: u32) -> Pixel {
        self.pixels[y as usize * self.size.width() as usize + x as usize]
    }

    /// Raw bytes in the same layout as the GPU image buffer
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Fail unless this image has exactly `expected` dimensions
    pub fn check_size(&self, expected: ImageSize) -> SimulationResult<()> {
        if self.size != expected {
            return Err(SimulationError::ImageSizeMismatch {
                expected,
                found: self.size,
            });
        }
        Ok(())
    }

    /// Overwrite every pixel with `source`'s, which must be the same size
    pub fn copy_from(&mut self, source: &AccumulationImage) -> SimulationResult<()> {
        self.check_size(source.size)?;
        self.pixels.copy_from_slice(&source.pixels);
        Ok(())
    }

    /// Reset every pixel to the background
    pub fn clear(&mut self) {
        self.pixels.fill(background_pixel());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_image_is_background() {
        let image = AccumulationImage::new(ImageSize::new(8, 4).unwrap()).unwrap();
        assert_eq!(image.pixels().len(), 32);
        assert!(image.pixels().iter().all(|p| *p == background_pixel()));
        assert_eq!(image.as_bytes().len(), 32 * 16);
    }

    #[test]
    fn test_pixel_indexing_is_row_major() {
        let mut image = AccumulationImage::new(ImageSize::new(3, 2).unwrap()).unwrap();
        image.pixels_mut()[4] = [1.0, 2.0, 3.0, 1.0];
        assert_eq!(image.pixel(1, 1), [1.0, 2.0, 3.0, 1.0]);
        image.clear();
        assert_eq!(image.pixel(1, 1), background_pixel());
    }

    #[test]
    fn test_copy_from_rejects_other_size() {
        let source = AccumulationImage::new(ImageSize::new(4, 4).unwrap()).unwrap();
        let mut target = AccumulationImage::new(ImageSize::new(4, 3).unwrap()).unwrap();
        target.pixels_mut()[0] = [9.0, 9.0, 9.0, 1.0];

        let err = target.copy_from(&source).unwrap_err();
        assert!(matches!(err, SimulationError::ImageSizeMismatch { .. }));
        // Untouched on failure
        assert_eq!(target.pixel(0, 0), [9.0, 9.0, 9.0, 1.0]);

        let mut same = AccumulationImage::new(ImageSize::new(4, 4).unwrap()).unwrap();
        same.pixels_mut()[5] = [1.0, 0.0, 0.0, 1.0];
        same.copy_from(&source).unwrap();
        assert_eq!(same.pixels(), source.pixels());
    }
}
