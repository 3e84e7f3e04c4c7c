//! GPU device context shared by the simulation and the renderer

use bytemuck::Pod;
use wgpu::util::DeviceExt;

use crate::error::{SimulationError, SimulationResult};

/// Instance, adapter, device and queue for one simulation.
///
/// Owned by the caller and passed to every pipeline built on it, so several
/// simulations can coexist in one process.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Context without a presentation surface (tests, headless runs)
    pub async fn headless() -> SimulationResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        Self::new(instance, None).await
    }

    /// Context whose adapter can present to `compatible_surface`
    pub async fn new(
        instance: wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> SimulationResult<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await?;

        log::info!("✓ Using GPU: {}", adapter.get_info().name);

        // Ask for everything the adapter offers so large body counts and
        // images fit in a single storage binding.
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Galaxy Device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }

    /// Largest storage buffer this device can bind
    pub fn storage_limit(&self) -> u64 {
        let limits = self.device.limits();
        u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size)
    }

    /// Reject a storage allocation the device cannot hold.
    pub fn check_storage(&self, resource: &'static str, requested: u64) -> SimulationResult<()> {
        let limit = self.storage_limit();
        if requested > limit {
            return Err(SimulationError::ResourceExhaustion {
                resource,
                requested,
                limit,
            });
        }
        Ok(())
    }

    /// Reject a 1D dispatch that exceeds the per-dimension workgroup limit.
    pub fn check_dispatch(&self, resource: &'static str, workgroups: u32) -> SimulationResult<()> {
        let limit = self.device.limits().max_compute_workgroups_per_dimension;
        if workgroups > limit {
            return Err(SimulationError::ResourceExhaustion {
                resource,
                requested: u64::from(workgroups),
                limit: u64::from(limit),
            });
        }
        Ok(())
    }

    /// Create a buffer initialised with `contents`, failing instead of
    /// panicking when it is over the binding limit or the device is out of
    /// memory.
    pub fn create_storage_buffer(
        &self,
        resource: &'static str,
        descriptor: &wgpu::util::BufferInitDescriptor<'_>,
    ) -> SimulationResult<wgpu::Buffer> {
        let requested = descriptor.contents.len() as u64;
        self.check_storage(resource, requested)?;

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer_init(descriptor);
        let scope = pollster::block_on(self.device.pop_error_scope());
        allocation_outcome(resource, requested, scope)?;
        Ok(buffer)
    }

    /// Block until every submitted command buffer has finished.
    pub fn wait_idle(&self) -> SimulationResult<()> {
        self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })?;
        Ok(())
    }

    /// Copy the first `count` elements of `source` back to the host.
    ///
    /// `source` must have `COPY_SRC` usage. Blocks until the copy lands.
    pub fn read_buffer<T: Pod>(&self, source: &wgpu::Buffer, count: usize) -> SimulationResult<Vec<T>> {
        let size = (count * std::mem::size_of::<T>()) as u64;
        if size == 0 {
            return Ok(Vec::new());
        }

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.wait_idle()?;
        rx.recv().unwrap_or(Err(wgpu::BufferAsyncError))?;

        let values = {
            let data = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, T>(&data).to_vec()
        };
        staging.unmap();
        Ok(values)
    }
}

/// Map the error popped from an out-of-memory scope onto the error taxonomy
pub(crate) fn allocation_outcome(
    resource: &'static str,
    requested: u64,
    scope: Option<wgpu::Error>,
) -> SimulationResult<()> {
    match scope {
        None => Ok(()),
        Some(error) => {
            log::error!("{resource}: {error}");
            Err(SimulationError::DeviceOutOfMemory {
                resource,
                requested,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_memory_scope_maps_to_exhaustion() {
        let error = wgpu::Error::OutOfMemory {
            source: Box::new(std::io::Error::other("heap exhausted")),
        };
        let result = allocation_outcome("body buffer", 4096, Some(error));
        match result {
            Err(SimulationError::DeviceOutOfMemory {
                resource,
                requested,
            }) => {
                assert_eq!(resource, "body buffer");
                assert_eq!(requested, 4096);
            }
            other => panic!("expected DeviceOutOfMemory, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_scope_is_success() {
        assert!(allocation_outcome("image buffer", 16, None).is_ok());
    }

    #[test]
    fn test_storage_buffer_respects_binding_limit() {
        let ctx = match pollster::block_on(GpuContext::headless()) {
            Ok(ctx) => ctx,
            Err(err) => {
                eprintln!("skipping GPU test: {err}");
                return;
            }
        };

        let small = [0u8; 64];
        let buffer = ctx
            .create_storage_buffer(
                "test buffer",
                &wgpu::util::BufferInitDescriptor {
                    label: Some("Test Buffer"),
                    contents: &small,
                    usage: wgpu::BufferUsages::STORAGE,
                },
            )
            .unwrap();
        assert_eq!(buffer.size(), 64);

        let err = ctx
            .check_storage("test buffer", ctx.storage_limit() + 1)
            .unwrap_err();
        assert!(err.is_resource_exhaustion());
    }
}
