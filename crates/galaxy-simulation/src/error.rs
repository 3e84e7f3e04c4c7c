//! Error taxonomy for pipeline construction and readback

use galaxy_physics::{ConfigError, ImageSize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{resource} needs {requested} bytes but only {limit} are available")]
    ResourceExhaustion {
        resource: &'static str,
        requested: u64,
        limit: u64,
    },

    #[error("device ran out of memory allocating {requested} bytes for {resource}")]
    DeviceOutOfMemory {
        resource: &'static str,
        requested: u64,
    },

    #[error("host allocation of {requested} bytes for {resource} failed")]
    HostAllocation {
        resource: &'static str,
        requested: u64,
    },

    #[error(
        "image is {}x{} but the pipeline renders {}x{}",
        .found.width(), .found.height(), .expected.width(), .expected.height()
    )]
    ImageSizeMismatch {
        expected: ImageSize,
        found: ImageSize,
    },

    #[error("no compatible GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("GPU device request failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("waiting on the GPU failed: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("buffer readback failed: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),
}

impl SimulationError {
    /// True when a smaller body count or image might succeed
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(
            self,
            SimulationError::ResourceExhaustion { .. }
                | SimulationError::DeviceOutOfMemory { .. }
                | SimulationError::HostAllocation { .. }
        )
    }
}

pub type SimulationResult<T> = Result<T, SimulationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhaustion_variants_are_retryable() {
        let oom = SimulationError::DeviceOutOfMemory {
            resource: "body buffer",
            requested: 1 << 30,
        };
        assert!(oom.is_resource_exhaustion());

        let over_limit = SimulationError::ResourceExhaustion {
            resource: "image buffer",
            requested: 10,
            limit: 5,
        };
        assert!(over_limit.is_resource_exhaustion());

        let size = ImageSize::new(4, 4).unwrap();
        let mismatch = SimulationError::ImageSizeMismatch {
            expected: size,
            found: ImageSize::new(2, 2).unwrap(),
        };
        assert!(!mismatch.is_resource_exhaustion());
        assert_eq!(
            mismatch.to_string(),
            "image is 2x2 but the pipeline renders 4x4"
        );
    }
}
