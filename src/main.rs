//! Galaxy Gravity Simulation
//!
//! Windowed driver and headless benchmark for the N-body frame pipeline.

use std::collections::VecDeque;
use std::error::Error;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use galaxies::{
    BodyStore, CpuPipeline, FrameParams, FramePipeline, GpuContext, GpuPipeline, ImageSize,
    Preset, Presenter, SimulationResult, with_body_fallback,
};
use galaxy_physics::{DEFAULT_PARTICLE_SIZE, DEFAULT_SEED};
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Cpu,
    Gpu,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of bodies
    #[arg(short, long, default_value_t = 2048)]
    bodies: usize,

    /// Initial scene: random-cloud, binary-star or galaxy-collision
    #[arg(short, long, default_value_t = Preset::GalaxyCollision)]
    preset: Preset,

    /// Seed for the scene generator
    #[arg(short, long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Accumulation image width in pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Accumulation image height in pixels
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Time step per frame
    #[arg(long, default_value_t = 0.001)]
    dt: f32,

    /// Added to the squared separation in the force law
    #[arg(long, default_value_t = 0.001)]
    softening: f32,

    /// Splat radius scale (multiplied by sqrt(mass))
    #[arg(long, default_value_t = DEFAULT_PARTICLE_SIZE)]
    particle_size: f32,

    /// Where the kernels run
    #[arg(long, value_enum, default_value_t = Backend::Gpu)]
    backend: Backend,

    /// Run this many frames without a window and report the frame time
    #[arg(long)]
    headless: Option<u32>,
}

impl Args {
    fn frame_params(&self) -> SimulationResult<FrameParams> {
        Ok(FrameParams::new(self.dt, self.softening, self.particle_size)?)
    }

    fn image_size(&self) -> SimulationResult<ImageSize> {
        Ok(ImageSize::new(self.width, self.height)?)
    }
}

/// Build the selected backend. The GPU backend reuses `ctx` when given one.
fn build_pipeline(
    args: &Args,
    store: BodyStore,
    ctx: Option<Arc<GpuContext>>,
) -> SimulationResult<Box<dyn FramePipeline>> {
    let size = args.image_size()?;
    match args.backend {
        Backend::Cpu => Ok(Box::new(CpuPipeline::new(store, size)?)),
        Backend::Gpu => {
            let ctx = match ctx {
                Some(ctx) => ctx,
                None => Arc::new(pollster::block_on(GpuContext::headless())?),
            };
            Ok(Box::new(GpuPipeline::new(ctx, store, size)?))
        }
    }
}

/// Build the pipeline, shrinking the body count until the device can hold it
fn build_with_fallback(
    args: &Args,
    ctx: Option<Arc<GpuContext>>,
) -> SimulationResult<(Box<dyn FramePipeline>, usize)> {
    with_body_fallback(args.bodies, |count| {
        let store = BodyStore::initialize(args.preset, count, args.seed)?;
        log::info!("✓ Initialized {} bodies ({})", store.len(), args.preset);
        build_pipeline(args, store, ctx.clone())
    })
}

struct GpuState {
    surface: wgpu::Surface<'static>,
    ctx: Arc<GpuContext>,
    config: wgpu::SurfaceConfiguration,

    pipeline: Box<dyn FramePipeline>,
    presenter: Presenter,

    frame: FrameParams,
    preset: Preset,
    seed: u64,
    body_count: usize,

    frame_times: VecDeque<f32>,
    last_frame_time: Instant,
}

impl GpuState {
    async fn new(window: Arc<Window>, args: &Args) -> Result<Self, Box<dyn Error>> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window.clone())?;
        let ctx = Arc::new(GpuContext::new(instance, Some(&surface)).await?);

        // Configure surface
        let surface_caps = surface.get_capabilities(&ctx.adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or("surface reports no texture formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&ctx.device, &config);

        let (pipeline, body_count) = build_with_fallback(args, Some(ctx.clone()))?;
        let presenter = Presenter::new(&ctx.device, config.format);
        log::info!("✓ Presenter initialized");

        Ok(Self {
            surface,
            ctx,
            config,
            pipeline,
            presenter,
            frame: args.frame_params()?,
            preset: args.preset,
            seed: args.seed,
            body_count,
            frame_times: VecDeque::with_capacity(100),
            last_frame_time: Instant::now(),
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.ctx.device, &self.config);
        }
    }

    /// Rebuild the Body Store. Runs between frames only.
    fn reset_scene(&mut self) {
        match BodyStore::initialize(self.preset, self.body_count, self.seed) {
            Ok(store) => match self.pipeline.reset(store) {
                Ok(()) => log::info!("Preset: {} (seed {})", self.preset, self.seed),
                Err(err) => log::error!("Failed to replace body store: {err}"),
            },
            Err(err) => log::error!("Failed to build {}: {err}", self.preset),
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Space => {
                self.frame.set_paused(!self.frame.paused());
                log::info!("Paused: {}", self.frame.paused());
            }
            KeyCode::KeyT => {
                self.frame.set_trails(!self.frame.trails_enabled());
                log::info!("Trails: {}", self.frame.trails_enabled());
            }
            KeyCode::Digit1 | KeyCode::Digit2 | KeyCode::Digit3 => {
                self.preset = match code {
                    KeyCode::Digit1 => Preset::RandomCloud,
                    KeyCode::Digit2 => Preset::BinaryStar,
                    _ => Preset::GalaxyCollision,
                };
                self.reset_scene();
            }
            KeyCode::KeyR => {
                self.seed = self.seed.wrapping_add(1);
                self.reset_scene();
            }
            _ => {}
        }
    }

    fn render(&mut self) -> Result<(f32, f32), wgpu::SurfaceError> {
        // Track frame time
        let now = Instant::now();
        let frame_time = (now - self.last_frame_time).as_secs_f32() * 1000.0;
        self.last_frame_time = now;

        self.frame_times.push_back(frame_time);
        if self.frame_times.len() > 100 {
            self.frame_times.pop_front();
        }

        let avg_frame_time = self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        let fps = 1000.0 / avg_frame_time;

        // A failed frame is still presented; the image is best-effort
        if let Err(err) = self.pipeline.step_and_render(&self.frame) {
            log::error!("Frame failed: {err}");
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.pipeline.present(&mut self.presenter, &self.ctx, &view);
        output.present();

        Ok((fps, avg_frame_time))
    }
}

struct App {
    args: Args,
    window: Option<Arc<Window>>,
    gpu_state: Option<GpuState>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title("Galaxy Gravity Simulation")
            .with_inner_size(winit::dpi::PhysicalSize::new(self.args.width, self.args.height));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };

        match pollster::block_on(GpuState::new(window.clone(), &self.args)) {
            Ok(gpu_state) => {
                self.window = Some(window);
                self.gpu_state = Some(gpu_state);
            }
            Err(err) => {
                log::error!("Failed to initialize: {err}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.handle_key(code);
                }
            }

            WindowEvent::Resized(physical_size) => {
                if let Some(gpu_state) = &mut self.gpu_state {
                    gpu_state.resize(physical_size);
                }
            }

            WindowEvent::RedrawRequested => {
                if let (Some(window), Some(gpu_state)) = (&self.window, &mut self.gpu_state) {
                    match gpu_state.render() {
                        Ok((fps, frame_time)) => {
                            window.set_title(&format!(
                                "Galaxies - {} - {:.0} FPS ({:.2}ms) - {} bodies [{}]{}",
                                gpu_state.preset,
                                fps,
                                frame_time,
                                gpu_state.pipeline.body_count(),
                                gpu_state.pipeline.name(),
                                if gpu_state.frame.paused() { " - paused" } else { "" }
                            ));
                        }
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            gpu_state.resize(window.inner_size())
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
                        Err(e) => log::warn!("Render error: {:?}", e),
                    }
                }
            }

            _ => {}
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Run `frames` frames without a window and log the average frame time
fn run_headless(args: &Args, frames: u32) -> SimulationResult<()> {
    let frame = args.frame_params()?;
    let (mut pipeline, _) = build_with_fallback(args, None)?;
    let initial_momentum: glam::Vec2 = pipeline
        .read_bodies()?
        .iter()
        .map(|body| body.momentum())
        .sum();

    log::info!(
        "Benchmark: {} frames, {} bodies ({}), {}x{} image, {} backend",
        frames,
        pipeline.body_count(),
        args.preset,
        args.width,
        args.height,
        pipeline.name()
    );

    let start = Instant::now();
    for index in 0..frames {
        let frame_start = Instant::now();
        pipeline.step_and_render(&frame)?;
        log::trace!(
            "frame {index}: {:.3} ms",
            frame_start.elapsed().as_secs_f64() * 1000.0
        );
    }
    let elapsed = start.elapsed().as_secs_f64();

    let bodies = pipeline.read_bodies()?;
    let momentum: glam::Vec2 = bodies.iter().map(|body| body.momentum()).sum();
    let non_finite = bodies.iter().filter(|body| !body.is_finite()).count();

    log::info!(
        "✓ {:.3} ms/frame average ({:.1} FPS)",
        elapsed * 1000.0 / f64::from(frames.max(1)),
        f64::from(frames) / elapsed.max(f64::EPSILON)
    );
    log::info!(
        "  momentum {:?} -> {:?}, {} non-finite bodies",
        initial_momentum,
        momentum,
        non_finite
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logger (RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Some(frames) = args.headless {
        run_headless(&args, frames)?;
        return Ok(());
    }

    log::info!("Starting galaxy gravity simulation...");
    log::info!("Controls: Space pause, T trails, 1/2/3 presets, R reseed, Esc quit");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App {
        args,
        window: None,
        gpu_state: None,
    };

    event_loop.run_app(&mut app)?;
    Ok(())
}
