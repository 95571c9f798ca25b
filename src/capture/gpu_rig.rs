//! GPU capture rig
//!
//! Each station owns a colour, a position and a depth target, all `D × D`.
//! A capture renders the visible objects twice: once lit, once with the
//! world-position override. Meshes are uploaded the first time an object is
//! drawn and cached by id for the rest of the rig's life.

use super::capture_data::{CaptureDirection, CaptureImages};
use crate::config::{DirectionalLight, VxgiConfig};
use crate::constants::capture::{DEPTH_FORMAT, TARGET_FORMAT};
use crate::error::{OptionExt, VxgiError, VxgiResult};
use crate::gpu::layouts::{uniform_buffer_entry, RenderTarget};
use crate::gpu::validation::{create_shader, validation_scope};
use crate::gpu::GpuContext;
use crate::scene::{MeshCache, Scene, SceneObject};
use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use static_assertions::const_assert_eq;
use std::time::Instant;
use wgpu::util::DeviceExt;

/// Vertex layout of the capture passes
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CaptureVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
}

const_assert_eq!(std::mem::size_of::<CaptureVertex>(), 36);

impl CaptureVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x3];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<CaptureVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Per-station camera and light block
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CaptureUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub light_direction: [f32; 4],
    pub light_color: [f32; 4],
    pub ambient: [f32; 4],
}

const_assert_eq!(std::mem::size_of::<CaptureUniforms>() % 16, 0);

impl CaptureUniforms {
    fn new(direction: CaptureDirection, world_boundary: f32, light: &DirectionalLight) -> Self {
        Self {
            view_proj: direction.view_projection(world_boundary).to_cols_array_2d(),
            light_direction: light.direction.extend(0.0).to_array(),
            light_color: light.color.extend(1.0).to_array(),
            ambient: light.ambient.extend(1.0).to_array(),
        }
    }
}

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    fn upload(device: &wgpu::Device, object: &SceneObject) -> Self {
        let color = object.base_color.to_array();
        let vertices: Vec<CaptureVertex> = object
            .mesh
            .positions
            .iter()
            .enumerate()
            .map(|(i, p)| CaptureVertex {
                position: p.to_array(),
                normal: object.mesh.normals.get(i).copied().unwrap_or(glam::Vec3::Y).to_array(),
                color,
            })
            .collect();

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Capture Vertices", object.name)),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Capture Indices", object.name)),
            contents: bytemuck::cast_slice(&object.mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: object.mesh.indices.len() as u32,
        }
    }
}

struct StationTargets {
    color: RenderTarget,
    position: RenderTarget,
    depth: RenderTarget,
    bind_group: wgpu::BindGroup,
}

/// One GPU capture station
pub struct GpuCaptureStation {
    pub direction: CaptureDirection,
    targets: Option<StationTargets>,
}

impl GpuCaptureStation {
    pub fn is_initialized(&self) -> bool {
        self.targets.is_some()
    }

    /// Direct-lit colour target view
    pub fn color_view(&self) -> Option<&wgpu::TextureView> {
        self.targets.as_ref().map(|t| &t.color.view)
    }

    /// World-position target view
    pub fn position_view(&self) -> Option<&wgpu::TextureView> {
        self.targets.as_ref().map(|t| &t.position.view)
    }
}

/// Six GPU stations plus the shared capture pipelines
pub struct GpuCaptureRig {
    ctx: GpuContext,
    stations: Vec<GpuCaptureStation>,
    bind_group_layout: wgpu::BindGroupLayout,
    direct_pipeline: wgpu::RenderPipeline,
    position_pipeline: wgpu::RenderPipeline,
    meshes: MeshCache<GpuMesh>,
    resolution: u32,
}

impl GpuCaptureRig {
    pub fn new(ctx: &GpuContext) -> VxgiResult<Self> {
        let device = &ctx.device;
        let shader = create_shader(device, "Capture Shader", include_str!("../shaders/capture.wgsl"))?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Capture Bind Group Layout"),
            entries: &[uniform_buffer_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Capture Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let direct_pipeline =
            Self::create_pipeline(device, &pipeline_layout, &shader, "fs_direct", "Capture Direct Pipeline")?;
        let position_pipeline = Self::create_pipeline(
            device,
            &pipeline_layout,
            &shader,
            "fs_position",
            "Capture Position Pipeline",
        )?;

        Ok(Self {
            ctx: ctx.clone(),
            stations: CaptureDirection::ALL
                .iter()
                .map(|&direction| GpuCaptureStation {
                    direction,
                    targets: None,
                })
                .collect(),
            bind_group_layout,
            direct_pipeline,
            position_pipeline,
            meshes: MeshCache::new(),
            resolution: 0,
        })
    }

    fn create_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        fragment_entry: &str,
        label: &str,
    ) -> VxgiResult<wgpu::RenderPipeline> {
        validation_scope(device, label, || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: "vs_main",
                    buffers: &[CaptureVertex::layout()],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    // Stations look at objects from every side
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: fragment_entry,
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
            })
        })
    }

    /// Release previous targets and allocate `D × D` targets for every station
    pub fn initialize(&mut self, config: &VxgiConfig) {
        self.release();
        let device = &self.ctx.device;
        let d = config.voxel_resolution;

        for station in &mut self.stations {
            let name = station.direction.name();
            let uniforms = CaptureUniforms::new(station.direction, config.world_boundary, &config.light);
            let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Uniforms", name)),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{} Bind Group", name)),
                layout: &self.bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

            station.targets = Some(StationTargets {
                color: RenderTarget::color(device, &format!("{} Direct", name), d, d, TARGET_FORMAT),
                position: RenderTarget::color(device, &format!("{} Position", name), d, d, TARGET_FORMAT),
                depth: RenderTarget::new(
                    device,
                    &format!("{} Depth", name),
                    d,
                    d,
                    DEPTH_FORMAT,
                    wgpu::TextureUsages::RENDER_ATTACHMENT,
                ),
                bind_group,
            });
        }

        self.resolution = d;
        log::info!(
            "[GpuCaptureRig] Initialized {} stations at {}x{}",
            self.stations.len(),
            d,
            d
        );
    }

    pub fn is_initialized(&self, direction: CaptureDirection) -> bool {
        self.stations[direction.index()].is_initialized()
    }

    pub fn station(&self, direction: CaptureDirection) -> &GpuCaptureStation {
        &self.stations[direction.index()]
    }

    /// Render the visible objects into one station's targets and submit
    pub fn capture(&mut self, direction: CaptureDirection, scene: &Scene) -> VxgiResult<()> {
        let start = Instant::now();

        let device = &self.ctx.device;
        let uploads = self.meshes.sync(
            scene,
            |object| object.base_color.extend(1.0).to_array(),
            |object| {
                log::debug!(
                    "[GpuCaptureRig] Uploading mesh '{}' ({} triangles)",
                    object.name,
                    object.mesh.triangle_count()
                );
                GpuMesh::upload(device, object)
            },
        );
        if uploads > 0 {
            log::trace!("[GpuCaptureRig] {} mesh uploads for {}", uploads, direction);
        }

        let targets = self.stations[direction.index()]
            .targets
            .as_ref()
            .ok_or_vxgi(|| {
                VxgiError::precondition(direction.name(), "capture station is not initialized")
            })?;

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(direction.name()),
            });

        let passes = [
            (&self.direct_pipeline, &targets.color, "Direct Pass"),
            (&self.position_pipeline, &targets.position, "Position Pass"),
        ];
        let mut draws = 0;
        for (pipeline, target, pass_label) in passes {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(pass_label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &targets.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &targets.bind_group, &[]);
            draws = 0;
            for object in scene.visible_objects() {
                let Some(mesh) = self.meshes.get(object.id) else {
                    continue;
                };
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                draws += 1;
            }
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        log::trace!(
            "[GpuCaptureRig] {} submitted {} draws per pass in {:?}",
            direction,
            draws,
            start.elapsed()
        );
        Ok(())
    }

    /// Read one station's targets back to the host
    pub fn read_images(&self, direction: CaptureDirection) -> VxgiResult<CaptureImages> {
        let targets = self.stations[direction.index()]
            .targets
            .as_ref()
            .ok_or_vxgi(|| {
                VxgiError::precondition(direction.name(), "capture station is not initialized")
            })?;
        Ok(CaptureImages {
            width: self.resolution,
            height: self.resolution,
            color: read_target(&self.ctx, &targets.color)?,
            position: read_target(&self.ctx, &targets.position)?,
        })
    }

    /// Free every station's targets and the uploaded meshes
    pub fn release(&mut self) {
        self.meshes.clear();
        let mut released = 0;
        for station in &mut self.stations {
            if station.targets.take().is_some() {
                released += 1;
            }
        }
        if released > 0 {
            log::debug!("[GpuCaptureRig] Released {} stations", released);
        }
    }
}

/// Blocking readback of an `Rgba32Float` target
fn read_target(ctx: &GpuContext, target: &RenderTarget) -> VxgiResult<Vec<Vec4>> {
    const TEXEL_BYTES: u32 = 16;
    let (width, height) = target.extent();
    let unpadded = width * TEXEL_BYTES;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;

    let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Capture Readback"),
        size: (padded * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Capture Readback Encoder"),
        });
    encoder.copy_texture_to_buffer(
        target.texture.as_image_copy(),
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        target.texture.size(),
    );
    ctx.queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    ctx.device.poll(wgpu::Maintain::Wait);
    receiver
        .recv()
        .map_err(|e| VxgiError::gpu("capture readback", e))?
        .map_err(|e| VxgiError::gpu("capture readback", e))?;

    let texels = {
        let data = slice.get_mapped_range();
        let mut texels = Vec::with_capacity((width * height) as usize);
        for row in data.chunks_exact(padded as usize) {
            texels.extend(
                row[..unpadded as usize]
                    .chunks_exact(TEXEL_BYTES as usize)
                    .map(|t| Vec4::from_array(bytemuck::pod_read_unaligned(t))),
            );
        }
        texels
    };
    staging.unmap();
    Ok(texels)
}
