//! Per-frame stage sequence and its two execution backends
//!
//! A frame is `Fade -> [Force -> Integrate] -> Splat`; pausing drops the two
//! body stages. Each stage reads the complete output of the one before it,
//! so neither backend may reorder or overlap them.

use std::sync::Arc;

use galaxy_physics::{force_step, integrate, Body, BodyStore, FrameParams, ImageSize};
use galaxy_renderer::{fade, splat, Accumulator, AccumulationImage, FadeMode, Presenter};
use galaxy_simulation::{GpuContext, GravitySimulation, SimulationResult};
use glam::Vec2;

/// One data-parallel pass over bodies or pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fade,
    Force,
    Integrate,
    Splat,
}

const RUNNING_STAGES: [Stage; 4] = [Stage::Fade, Stage::Force, Stage::Integrate, Stage::Splat];
const PAUSED_STAGES: [Stage; 2] = [Stage::Fade, Stage::Splat];

/// Stages executed for one frame, in order
pub fn frame_stages(paused: bool) -> &'static [Stage] {
    if paused {
        &PAUSED_STAGES
    } else {
        &RUNNING_STAGES
    }
}

/// Run `build` with `count` bodies, halving the count while it fails on
/// resource exhaustion. Returns the result and the count that succeeded.
pub fn with_body_fallback<T, F>(count: usize, mut build: F) -> SimulationResult<(T, usize)>
where
    F: FnMut(usize) -> SimulationResult<T>,
{
    let mut count = count;
    loop {
        match build(count) {
            Ok(value) => return Ok((value, count)),
            Err(err) if err.is_resource_exhaustion() && count > 1 => {
                log::warn!("{err}; retrying with {} bodies", count / 2);
                count /= 2;
            }
            Err(err) => return Err(err),
        }
    }
}

/// A simulation plus accumulation image driven one frame at a time.
///
/// Owned by the caller; any number of pipelines can exist side by side.
pub trait FramePipeline {
    /// Short backend name for logs and window titles
    fn name(&self) -> &'static str;

    /// Replace the Body Store. Only call between frames.
    fn reset(&mut self, store: BodyStore) -> SimulationResult<()>;

    /// Run one frame's stage sequence to completion
    fn step_and_render(&mut self, frame: &FrameParams) -> SimulationResult<()>;

    /// Snapshot of the current bodies
    fn read_bodies(&self) -> SimulationResult<Vec<Body>>;

    /// Copy the accumulation image into `image`, which must match `image_size`
    fn read_image(&self, image: &mut AccumulationImage) -> SimulationResult<()>;

    /// Draw the accumulation image onto `surface_view`
    fn present(
        &self,
        presenter: &mut Presenter,
        ctx: &GpuContext,
        surface_view: &wgpu::TextureView,
    );

    fn body_count(&self) -> usize;

    fn image_size(&self) -> ImageSize;
}

/// rayon backend. Every stage is one parallel-for whose return is the barrier
/// before the next stage.
pub struct CpuPipeline {
    store: BodyStore,
    forces: Vec<Vec2>,
    image: AccumulationImage,
}

impl CpuPipeline {
    pub fn new(store: BodyStore, size: ImageSize) -> SimulationResult<Self> {
        let image = AccumulationImage::new(size)?;
        log::info!(
            "✓ CPU pipeline ready ({} bodies, {}x{}, {} threads)",
            store.len(),
            size.width(),
            size.height(),
            rayon::current_num_threads()
        );
        Ok(Self {
            forces: Vec::with_capacity(store.len()),
            store,
            image,
        })
    }

    /// Run one frame and hand back the updated image
    pub fn run_frame(&mut self, frame: &FrameParams) -> &AccumulationImage {
        for stage in frame_stages(frame.paused()) {
            match stage {
                Stage::Fade => fade(
                    &mut self.image,
                    FadeMode::from_trails(frame.trails_enabled()),
                ),
                Stage::Force => {
                    let rejected = force_step(
                        self.store.bodies_mut(),
                        frame.softening(),
                        frame.delta_time(),
                        &mut self.forces,
                    );
                    if rejected > 0 {
                        log::warn!("{rejected} bodies kept their velocity (non-finite update)");
                    }
                }
                Stage::Integrate => integrate(self.store.bodies_mut(), frame.delta_time()),
                Stage::Splat => {
                    let dropped =
                        splat(&mut self.image, self.store.bodies(), frame.particle_size());
                    if dropped > 0 {
                        log::warn!("{dropped} bodies dropped from splat (non-finite)");
                    }
                }
            }
        }
        &self.image
    }

    pub fn image(&self) -> &AccumulationImage {
        &self.image
    }

    pub fn store(&self) -> &BodyStore {
        &self.store
    }
}

impl FramePipeline for CpuPipeline {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn reset(&mut self, store: BodyStore) -> SimulationResult<()> {
        log::info!("Body store replaced ({} bodies)", store.len());
        self.store = store;
        self.forces.clear();
        Ok(())
    }

    fn step_and_render(&mut self, frame: &FrameParams) -> SimulationResult<()> {
        self.run_frame(frame);
        Ok(())
    }

    fn read_bodies(&self) -> SimulationResult<Vec<Body>> {
        Ok(self.store.bodies().to_vec())
    }

    fn read_image(&self, image: &mut AccumulationImage) -> SimulationResult<()> {
        image.copy_from(&self.image)
    }

    fn present(
        &self,
        presenter: &mut Presenter,
        ctx: &GpuContext,
        surface_view: &wgpu::TextureView,
    ) {
        presenter.present_host(&ctx.device, &ctx.queue, surface_view, &self.image);
    }

    fn body_count(&self) -> usize {
        self.store.len()
    }

    fn image_size(&self) -> ImageSize {
        self.image.size()
    }
}

/// wgpu backend. One compute pass per stage in a single encoder; the host
/// blocks on the device before returning.
pub struct GpuPipeline {
    ctx: Arc<GpuContext>,
    simulation: GravitySimulation,
    accumulator: Accumulator,
}

impl GpuPipeline {
    pub fn new(ctx: Arc<GpuContext>, store: BodyStore, size: ImageSize) -> SimulationResult<Self> {
        let simulation = GravitySimulation::new(&ctx, &store)?;
        log::info!("✓ Simulation initialized");

        let accumulator = Accumulator::new(&ctx, size, simulation.body_buffer())?;
        log::info!("✓ Accumulator initialized");

        Ok(Self {
            ctx,
            simulation,
            accumulator,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }
}

impl FramePipeline for GpuPipeline {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn reset(&mut self, store: BodyStore) -> SimulationResult<()> {
        // Nothing is in flight: every frame waits for the device before returning
        self.simulation.replace_store(&self.ctx, &store)?;
        self.accumulator.rebind_bodies(self.simulation.body_buffer());
        Ok(())
    }

    fn step_and_render(&mut self, frame: &FrameParams) -> SimulationResult<()> {
        self.simulation.update_params(frame);
        self.accumulator
            .update_params(frame, self.simulation.body_count());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        for stage in frame_stages(frame.paused()) {
            match stage {
                Stage::Fade => self.accumulator.encode_fade(&mut encoder),
                Stage::Force => self.simulation.encode_force(&mut encoder),
                Stage::Integrate => self.simulation.encode_integrate(&mut encoder),
                Stage::Splat => self.accumulator.encode_splat(&mut encoder),
            }
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        self.ctx.wait_idle()
    }

    fn read_bodies(&self) -> SimulationResult<Vec<Body>> {
        self.simulation.read_bodies(&self.ctx)
    }

    fn read_image(&self, image: &mut AccumulationImage) -> SimulationResult<()> {
        self.accumulator.read_into(&self.ctx, image)
    }

    fn present(
        &self,
        presenter: &mut Presenter,
        ctx: &GpuContext,
        surface_view: &wgpu::TextureView,
    ) {
        presenter.present(
            &ctx.device,
            &ctx.queue,
            surface_view,
            self.accumulator.image_buffer(),
            self.accumulator.size(),
        );
    }

    fn body_count(&self) -> usize {
        self.simulation.body_count() as usize
    }

    fn image_size(&self) -> ImageSize {
        self.accumulator.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galaxy_physics::ConfigError;
    use galaxy_simulation::SimulationError;

    #[test]
    fn test_running_frame_order() {
        assert_eq!(
            frame_stages(false),
            &[Stage::Fade, Stage::Force, Stage::Integrate, Stage::Splat]
        );
    }

    #[test]
    fn test_fallback_halves_until_allocation_fits() {
        let mut attempts = Vec::new();
        let (value, count) = with_body_fallback(1000, |count| {
            attempts.push(count);
            if count > 200 {
                Err(SimulationError::DeviceOutOfMemory {
                    resource: "body buffer",
                    requested: count as u64 * 32,
                })
            } else {
                Ok(count * 2)
            }
        })
        .unwrap();
        assert_eq!(attempts, vec![1000, 500, 250, 125]);
        assert_eq!((value, count), (250, 125));
    }

    #[test]
    fn test_fallback_passes_other_errors_through() {
        let mut calls = 0;
        let result: SimulationResult<((), usize)> = with_body_fallback(64, |_| {
            calls += 1;
            Err(ConfigError::NonPositiveSoftening(0.0).into())
        });
        assert!(matches!(result, Err(SimulationError::Config(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_paused_frame_skips_body_stages() {
        let stages = frame_stages(true);
        assert_eq!(stages, &[Stage::Fade, Stage::Splat]);
        assert!(!stages.contains(&Stage::Force));
        assert!(!stages.contains(&Stage::Integrate));
    }
}
