//! GPU-based gravity simulation manager
//!
//! Owns the device-side Body Store and the force/integration compute
//! pipelines. Both passes share one bind group layout:
//! 0: bodies (storage, read_write), 1: params (uniform).

use galaxy_physics::{Body, BodyStore, FrameParams};
use wgpu::util::DeviceExt;

use crate::context::GpuContext;
use crate::error::SimulationResult;
use crate::params::SimParams;

/// Threads per workgroup for per-body passes (must match the WGSL)
pub const BODY_WORKGROUP_SIZE: u32 = 256;

/// GPU-based N-body gravity simulation
pub struct GravitySimulation {
    device: wgpu::Device,
    queue: wgpu::Queue,

    // Buffers
    body_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,

    // Compute pipelines
    force_pipeline: wgpu::ComputePipeline,
    integrate_pipeline: wgpu::ComputePipeline,

    // Bind groups
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,

    body_count: u32,
}

impl GravitySimulation {
    pub fn new(ctx: &GpuContext, store: &BodyStore) -> SimulationResult<Self> {
        log::info!("Initializing GravitySimulation...");
        let device = ctx.device.clone();
        let queue = ctx.queue.clone();

        let body_buffer = Self::create_body_buffer(ctx, store)?;

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sim Params Buffer"),
            contents: bytemuck::cast_slice(&[SimParams::default()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        log::info!("Buffers created");

        let force_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Force Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/forces.wgsl").into()),
        });

        let integrate_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Integration Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/integrate.wgsl").into()),
        });

        log::info!("Shaders loaded");

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Body Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Body Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let force_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Force Pipeline"),
            layout: Some(&pipeline_layout),
            module: &force_shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let integrate_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Integration Pipeline"),
            layout: Some(&pipeline_layout),
            module: &integrate_shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        log::info!("Pipelines created");

        let bind_group =
            Self::create_bind_group(&device, &bind_group_layout, &body_buffer, &params_buffer);

        Ok(Self {
            device,
            queue,
            body_buffer,
            params_buffer,
            force_pipeline,
            integrate_pipeline,
            bind_group_layout,
            bind_group,
            body_count: store.len() as u32,
        })
    }

    /// Upload `store`, padding to one body so the binding is never empty.
    fn create_body_buffer(ctx: &GpuContext, store: &BodyStore) -> SimulationResult<wgpu::Buffer> {
        ctx.check_dispatch("force dispatch", workgroups_for(store.len() as u32))?;

        let placeholder = [Body::default()];
        let bodies = if store.is_empty() {
            &placeholder[..]
        } else {
            store.bodies()
        };

        ctx.create_storage_buffer(
            "body buffer",
            &wgpu::util::BufferInitDescriptor {
                label: Some("Body Buffer"),
                contents: bytemuck::cast_slice(bodies),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
            },
        )
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        body_buffer: &wgpu::Buffer,
        params_buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Body Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: body_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        })
    }

    /// Replace the Body Store wholesale. Call only between frames.
    ///
    /// The old buffer is dropped; anything still holding it (such as a splat
    /// bind group) must be rebuilt against [`Self::body_buffer`].
    pub fn replace_store(&mut self, ctx: &GpuContext, store: &BodyStore) -> SimulationResult<()> {
        self.body_buffer = Self::create_body_buffer(ctx, store)?;
        self.bind_group = Self::create_bind_group(
            &self.device,
            &self.bind_group_layout,
            &self.body_buffer,
            &self.params_buffer,
        );
        self.body_count = store.len() as u32;
        log::info!("Body store replaced ({} bodies)", self.body_count);
        Ok(())
    }

    /// Update per-frame parameters. Lands before the next submitted pass.
    pub fn update_params(&self, frame: &FrameParams) {
        let params = SimParams::new(frame, self.body_count);
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::cast_slice(&[params]));
    }

    /// Record the force pass (velocity update) into `encoder`.
    pub fn encode_force(&self, encoder: &mut wgpu::CommandEncoder) {
        self.encode_pass(encoder, "Force Compute Pass", &self.force_pipeline);
    }

    /// Record the integration pass (position update + wrap) into `encoder`.
    pub fn encode_integrate(&self, encoder: &mut wgpu::CommandEncoder) {
        self.encode_pass(encoder, "Integration Compute Pass", &self.integrate_pipeline);
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
    ) {
        if self.body_count == 0 {
            return;
        }
        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(pipeline);
        compute_pass.set_bind_group(0, &self.bind_group, &[]);
        compute_pass.dispatch_workgroups(workgroups_for(self.body_count), 1, 1);
    }

    /// Step the simulation forward by one timestep (force, then integrate)
    pub fn step(&self, frame: &FrameParams) {
        self.update_params(frame);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Simulation Encoder"),
            });

        // Separate passes: integration must see every velocity from the force pass
        self.encode_force(&mut encoder);
        self.encode_integrate(&mut encoder);

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Copy the current bodies back to the host. Blocks on the GPU.
    pub fn read_bodies(&self, ctx: &GpuContext) -> SimulationResult<Vec<Body>> {
        ctx.read_buffer(&self.body_buffer, self.body_count as usize)
    }

    /// Get reference to body buffer (read-only usage is up to the caller).
    ///
    /// The splat pass binds this directly.
    pub fn body_buffer(&self) -> &wgpu::Buffer {
        &self.body_buffer
    }

    pub fn body_count(&self) -> u32 {
        self.body_count
    }
}

/// Workgroups needed to cover `count` bodies
pub fn workgroups_for(count: u32) -> u32 {
    count.div_ceil(BODY_WORKGROUP_SIZE)
}
