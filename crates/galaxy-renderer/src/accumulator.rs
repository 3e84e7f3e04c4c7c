//! GPU accumulation image: fade and splat compute passes
//!
//! Both passes share one bind group layout:
//! 0: image (storage, read_write), 1: params (uniform), 2: bodies (storage, read).
//! The body binding is the simulation's own buffer, so no copy happens
//! between the integrate and splat stages.

use galaxy_physics::{FrameParams, ImageSize};
use galaxy_simulation::{GpuContext, SimulationResult};
use wgpu::util::DeviceExt;

use crate::image::{AccumulationImage, Pixel};
use crate::params::RenderParams;

/// Workgroup edge for per-pixel passes (must match the WGSL)
pub const PIXEL_WORKGROUP_SIZE: u32 = 16;

pub struct Accumulator {
    device: wgpu::Device,
    queue: wgpu::Queue,

    size: ImageSize,
    image_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,

    fade_pipeline: wgpu::ComputePipeline,
    splat_pipeline: wgpu::ComputePipeline,

    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

impl Accumulator {
    pub fn new(
        ctx: &GpuContext,
        size: ImageSize,
        body_buffer: &wgpu::Buffer,
    ) -> SimulationResult<Self> {
        log::info!(
            "Initializing Accumulator ({}x{})...",
            size.width(),
            size.height()
        );
        let device = ctx.device.clone();
        let queue = ctx.queue.clone();

        let (groups_x, groups_y) = pixel_workgroups(size);
        ctx.check_dispatch("image dispatch", groups_x.max(groups_y))?;

        let initial = AccumulationImage::new(size)?;
        let image_buffer = ctx.create_storage_buffer(
            "accumulation image",
            &wgpu::util::BufferInitDescriptor {
                label: Some("Accumulation Image Buffer"),
                contents: initial.as_bytes(),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
            },
        )?;

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Render Params Buffer"),
            contents: bytemuck::cast_slice(&[RenderParams::new(
                size,
                &FrameParams::default(),
                0,
            )]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let fade_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Fade Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/fade.wgsl").into()),
        });

        let splat_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Splat Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/splat.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Accumulator Bind Group Layout"),
            entries: &[
                // Image (Storage) - Binding 0
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
                // Params (Uniform) - Binding 1
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
                // Bodies (Storage) - Binding 2
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Accumulator Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let fade_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Fade Pipeline"),
            layout: Some(&pipeline_layout),
            module: &fade_shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let splat_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Splat Pipeline"),
            layout: Some(&pipeline_layout),
            module: &splat_shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let bind_group = Self::create_bind_group(
            &device,
            &bind_group_layout,
            &image_buffer,
            &params_buffer,
            body_buffer,
        );

        log::info!("✓ Accumulator ready");

        Ok(Self {
            device,
            queue,
            size,
            image_buffer,
            params_buffer,
            fade_pipeline,
            splat_pipeline,
            bind_group_layout,
            bind_group,
        })
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        image_buffer: &wgpu::Buffer,
        params_buffer: &wgpu::Buffer,
        body_buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Accumulator Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: image_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: body_buffer.as_entire_binding(),
                },
            ],
        })
    }

    /// Point the splat pass at a new body buffer (after the store is replaced)
    pub fn rebind_bodies(&mut self, body_buffer: &wgpu::Buffer) {
        self.bind_group = Self::create_bind_group(
            &self.device,
            &self.bind_group_layout,
            &self.image_buffer,
            &self.params_buffer,
            body_buffer,
        );
    }

    pub fn update_params(&self, frame: &FrameParams, body_count: u32) {
        let params = RenderParams::new(self.size, frame, body_count);
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::cast_slice(&[params]));
    }

    /// Record the fade pass into `encoder`
    pub fn encode_fade(&self, encoder: &mut wgpu::CommandEncoder) {
        self.encode_pass(encoder, "Fade Compute Pass", &self.fade_pipeline);
    }

    /// Record the splat pass into `encoder`. Must come after the fade pass.
    pub fn encode_splat(&self, encoder: &mut wgpu::CommandEncoder) {
        self.encode_pass(encoder, "Splat Compute Pass", &self.splat_pipeline);
    }

    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
    ) {
        let (groups_x, groups_y) = pixel_workgroups(self.size);
        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        compute_pass.set_pipeline(pipeline);
        compute_pass.set_bind_group(0, &self.bind_group, &[]);
        compute_pass.dispatch_workgroups(groups_x, groups_y, 1);
    }

    pub fn image_buffer(&self) -> &wgpu::Buffer {
        &self.image_buffer
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Copy the image back into `image`. Blocks on the GPU.
    pub fn read_into(&self, ctx: &GpuContext, image: &mut AccumulationImage) -> SimulationResult<()> {
        image.check_size(self.size)?;
        let pixels: Vec<Pixel> = ctx.read_buffer(&self.image_buffer, self.size.pixel_count())?;
        image.pixels_mut().copy_from_slice(&pixels);
        Ok(())
    }
}

/// Workgroups needed to cover every pixel
pub fn pixel_workgroups(size: ImageSize) -> (u32, u32) {
    (
        size.width().div_ceil(PIXEL_WORKGROUP_SIZE),
        size.height().div_ceil(PIXEL_WORKGROUP_SIZE),
    )
}
