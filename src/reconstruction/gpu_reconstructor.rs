//! GPU cone tracing reconstructor
//!
//! Five full-screen render pipelines built from one shader module. The
//! reconstructor records a frame's passes into the caller's encoder; the
//! caller submits. Temporaries come from a `TargetPool` and go back to it
//! when the frame's guards drop.

use super::cone_tracing::FrameCamera;
use super::frame_plan::{plan_frame, FramePass, FramePlan, Slot};
use super::params::{ComputationMode, ReconstructionParameters};
use super::target_pool::TargetPool;
use crate::config::VxgiConfig;
use crate::constants::reconstruction::TEMPORARY_FORMAT;
use crate::error::VxgiResult;
use crate::gpu::layouts::{
    depth_texture_entry, float_texture_entry, storage_buffer_entry, uniform_buffer_entry,
    RenderTarget,
};
use crate::gpu::validation::{create_shader, validation_scope};
use crate::gpu::GpuContext;
use crate::voxel::{GpuVoxelGrid, VoxelGrid};
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::collections::HashMap;
use wgpu::util::DeviceExt;

/// Uniform block shared by every reconstruction pass
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ReconstructionUniforms {
    pub camera_to_world: [[f32; 4]; 4],
    pub inverse_projection: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub frame_extent: [f32; 2],
    pub temp_extent: [f32; 2],
    pub voxel_resolution: u32,
    pub world_boundary: f32,
    pub maximum_iterations: u32,
    pub cone_step: f32,
    pub cone_offset: f32,
    pub blur_step: f32,
    pub direct_strength: f32,
    pub indirect_strength: f32,
    pub threshold: f32,
    pub indirect_enabled: u32,
    pub grid_enabled: u32,
    pub _padding: u32,
}

const_assert_eq!(std::mem::size_of::<ReconstructionUniforms>(), 208);
const_assert_eq!(std::mem::size_of::<ReconstructionUniforms>() % 16, 0);

/// Frame colour plus camera
pub struct FrameInputs<'a> {
    pub source: &'a wgpu::TextureView,
    pub extent: (u32, u32),
    pub camera: FrameCamera,
}

/// Per-pixel surface data of the frame, all at the frame extent
pub struct GpuGBuffer<'a> {
    /// `Depth32Float` scene depth
    pub depth: &'a wgpu::TextureView,
    /// World-space normals in `xyz`
    pub normals: &'a wgpu::TextureView,
    /// Reflectivity mask, red channel
    pub mask: &'a wgpu::TextureView,
}

struct LoadedGrid {
    buffer: GpuVoxelGrid,
    resolution: u32,
    world_boundary: f32,
}

/// Screen-space VXGI reflections
pub struct ConeTracingReconstructor {
    ctx: GpuContext,
    mode: ComputationMode,
    params: ReconstructionParameters,
    grid: Option<LoadedGrid>,
    empty_grid: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    pipelines: HashMap<FramePass, wgpu::RenderPipeline>,
    uniform_buffer: wgpu::Buffer,
    pool: TargetPool<RenderTarget>,
    last_fallback: Option<String>,
}

impl ConeTracingReconstructor {
    /// Build the pipelines; `destination_format` is the format of the presented image
    pub fn new(
        ctx: &GpuContext,
        config: &VxgiConfig,
        destination_format: wgpu::TextureFormat,
    ) -> VxgiResult<Self> {
        config.reconstruction.validate()?;
        let device = &ctx.device;
        let shader = create_shader(
            device,
            "Cone Tracing Shader",
            include_str!("../shaders/cone_tracing.wgsl"),
        )?;

        let fragment = wgpu::ShaderStages::FRAGMENT;
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cone Tracing Bind Group Layout"),
            entries: &[
                uniform_buffer_entry(0, fragment),
                storage_buffer_entry(1, true, fragment),
                float_texture_entry(2, fragment),
                depth_texture_entry(3, fragment),
                float_texture_entry(4, fragment),
                float_texture_entry(5, fragment),
                float_texture_entry(6, fragment),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Cone Tracing Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let mut pipelines = HashMap::new();
        for pass in FramePass::ALL {
            let format = match pass {
                FramePass::Composite | FramePass::VoxelDebug => destination_format,
                _ => TEMPORARY_FORMAT,
            };
            let label = format!("Cone Tracing {:?} Pipeline", pass);
            let pipeline = validation_scope(device, &label, || {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(&label),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &shader,
                        entry_point: "vs_fullscreen",
                        buffers: &[],
                    },
                    primitive: wgpu::PrimitiveState::default(),
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    fragment: Some(wgpu::FragmentState {
                        module: &shader,
                        entry_point: pass.entry_point(),
                        targets: &[Some(wgpu::ColorTargetState {
                            format,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                    }),
                    multiview: None,
                })
            })?;
            pipelines.insert(pass, pipeline);
        }

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Cone Tracing Uniforms"),
            size: std::mem::size_of::<ReconstructionUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Bound in place of a grid so the layout is always satisfied
        let empty_grid = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Empty Voxel Grid"),
            contents: bytemuck::bytes_of(&0u32),
            usage: wgpu::BufferUsages::STORAGE,
        });

        log::info!(
            "[ConeTracingReconstructor] Created {} pass pipelines (mode {:?})",
            pipelines.len(),
            config.computation
        );

        Ok(Self {
            ctx: ctx.clone(),
            mode: config.computation,
            params: config.reconstruction.clone(),
            grid: None,
            empty_grid,
            bind_group_layout,
            pipelines,
            uniform_buffer,
            pool: TargetPool::new(),
            last_fallback: None,
        })
    }

    /// Upload a loaded grid as a read-only storage buffer
    pub fn set_grid(&mut self, grid: &VoxelGrid) {
        self.grid = Some(LoadedGrid {
            buffer: GpuVoxelGrid::from_host_read_only(&self.ctx, grid),
            resolution: grid.resolution(),
            world_boundary: grid.world_boundary(),
        });
        self.last_fallback = None;
    }

    pub fn clear_grid(&mut self) {
        self.grid = None;
    }

    pub fn has_grid(&self) -> bool {
        self.grid.is_some()
    }

    pub fn set_mode(&mut self, mode: ComputationMode) {
        self.mode = mode;
    }

    pub fn set_params(&mut self, params: ReconstructionParameters) -> VxgiResult<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    pub fn pool(&self) -> &TargetPool<RenderTarget> {
        &self.pool
    }

    fn warn_fallback(&mut self, reason: String) {
        if self.last_fallback.as_deref() != Some(reason.as_str()) {
            log::warn!(
                "[ConeTracingReconstructor] {}; rendering direct lighting only",
                reason
            );
            self.last_fallback = Some(reason);
        }
    }

    fn plan(&mut self, width: u32, height: u32) -> FramePlan {
        if self.grid.is_none() {
            self.warn_fallback("no voxel grid loaded".to_string());
            return FramePlan::direct_only(width, height);
        }
        match plan_frame(self.mode, &self.params, width, height) {
            Ok(plan) => plan,
            Err(e) => {
                self.warn_fallback(e.to_string());
                FramePlan::direct_only(width, height)
            }
        }
    }

    fn uniforms(&self, plan: &FramePlan, camera: &FrameCamera) -> ReconstructionUniforms {
        let (width, height) = plan.extent;
        let temp = plan.temp_extent.unwrap_or(plan.extent);
        let (resolution, boundary) = self
            .grid
            .as_ref()
            .map_or((1, 1.0), |g| (g.resolution, g.world_boundary));
        ReconstructionUniforms {
            camera_to_world: camera.camera_to_world.to_cols_array_2d(),
            inverse_projection: camera.inverse_projection.to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).to_array(),
            frame_extent: [width as f32, height as f32],
            temp_extent: [temp.0 as f32, temp.1 as f32],
            voxel_resolution: resolution,
            world_boundary: boundary,
            maximum_iterations: self.params.maximum_iterations,
            cone_step: self.params.cone_step,
            cone_offset: self.params.cone_offset,
            blur_step: self.params.blur_step,
            direct_strength: self.params.direct_strength,
            indirect_strength: self.params.indirect_strength,
            threshold: self.params.threshold,
            indirect_enabled: plan.indirect_enabled as u32,
            grid_enabled: self.grid.is_some() as u32,
            _padding: 0,
        }
    }

    /// Record the frame's passes into `encoder`, writing `destination`
    ///
    /// Never fails: a missing grid or an unusable frame extent runs the
    /// composite with indirect lighting disabled. Uniforms are written through
    /// the queue, so submit the encoder before recording the next frame.
    pub fn render_frame(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        inputs: &FrameInputs<'_>,
        gbuffer: &GpuGBuffer<'_>,
        destination: &wgpu::TextureView,
    ) -> FramePlan {
        let (width, height) = inputs.extent;
        let plan = self.plan(width, height);
        let uniforms = self.uniforms(&plan, &inputs.camera);
        self.ctx
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let device = &self.ctx.device;
        let create = |(w, h): (u32, u32)| {
            RenderTarget::color(device, "Indirect Specular Temporary", w, h, TEMPORARY_FORMAT)
        };
        let temp_a = plan.temp_extent.map(|e| self.pool.acquire(e, create));
        let temp_b = plan
            .temp_extent
            .filter(|_| plan.passes().any(|p| p == FramePass::BlurHorizontal))
            .map(|e| self.pool.acquire(e, create));

        let view_of = |slot: Slot| {
            match slot {
                Slot::Source => Some(inputs.source),
                Slot::Destination => Some(destination),
                Slot::TempA => temp_a.as_ref().map(|t| &t.view),
                Slot::TempB => temp_b.as_ref().map(|t| &t.view),
            }
        };

        let grid_buffer = self
            .grid
            .as_ref()
            .map_or(&self.empty_grid, |g| g.buffer.buffer());

        for step in &plan.steps {
            let (Some(input), Some(output), Some(pipeline)) = (
                view_of(step.input),
                view_of(step.output),
                self.pipelines.get(&step.pass),
            ) else {
                log::error!(
                    "[ConeTracingReconstructor] Skipping {:?}: missing {:?} or {:?}",
                    step.pass,
                    step.input,
                    step.output
                );
                continue;
            };

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Cone Tracing Bind Group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: grid_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(inputs.source),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(gbuffer.depth),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(gbuffer.normals),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: wgpu::BindingResource::TextureView(gbuffer.mask),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: wgpu::BindingResource::TextureView(input),
                    },
                ],
            });

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(step.pass.entry_point()),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: output,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        log::trace!(
            "[ConeTracingReconstructor] Recorded {} passes for {}x{}",
            plan.steps.len(),
            width,
            height
        );
        plan
    }
}
