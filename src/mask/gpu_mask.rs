//! Screen-sized reflectivity mask target

use crate::constants::reconstruction::MASK_FORMAT;
use crate::error::VxgiResult;
use crate::gpu::layouts::{uniform_buffer_entry, RenderTarget};
use crate::gpu::validation::{create_shader, validation_scope};
use crate::gpu::GpuContext;
use crate::scene::{MeshCache, Scene, SceneObject};
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MaskVertex {
    pub position: [f32; 3],
    pub reflectivity: f32,
}

impl MaskVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MaskVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

struct MaskMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl MaskMesh {
    fn upload(device: &wgpu::Device, object: &SceneObject) -> Self {
        let vertices: Vec<MaskVertex> = object
            .mesh
            .positions
            .iter()
            .map(|p| MaskVertex {
                position: p.to_array(),
                reflectivity: object.reflectivity,
            })
            .collect();
        Self {
            vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Mask Vertices", object.name)),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            index_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} Mask Indices", object.name)),
                contents: bytemuck::cast_slice(&object.mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            }),
            index_count: object.mesh.indices.len() as u32,
        }
    }
}

/// Reflectivity of every visible object, rendered through the frame camera
pub struct GpuReflectivityMask {
    ctx: GpuContext,
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    target: RenderTarget,
    depth: RenderTarget,
    meshes: MeshCache<MaskMesh>,
}

impl GpuReflectivityMask {
    /// Allocate a `width × height` mask (normally the screen size)
    pub fn new(ctx: &GpuContext, width: u32, height: u32) -> VxgiResult<Self> {
        let device = &ctx.device;
        let shader = create_shader(
            device,
            "Reflectivity Mask Shader",
            include_str!("../shaders/reflectivity_mask.wgsl"),
        )?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Reflectivity Mask Bind Group Layout"),
            entries: &[uniform_buffer_entry(0, wgpu::ShaderStages::VERTEX)],
        });
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Reflectivity Mask Uniforms"),
            size: std::mem::size_of::<[[f32; 4]; 4]>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Reflectivity Mask Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Reflectivity Mask Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = validation_scope(device, "Reflectivity Mask Pipeline", || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Reflectivity Mask Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &[MaskVertex::layout()],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: crate::constants::capture::DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: MASK_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
            })
        })?;

        let (target, depth) = Self::create_targets(device, width, height);
        log::info!("[GpuReflectivityMask] Created {}x{} mask", width, height);

        Ok(Self {
            ctx: ctx.clone(),
            pipeline,
            uniform_buffer,
            bind_group,
            target,
            depth,
            meshes: MeshCache::new(),
        })
    }

    fn create_targets(device: &wgpu::Device, width: u32, height: u32) -> (RenderTarget, RenderTarget) {
        (
            RenderTarget::color(device, "Reflectivity Mask", width, height, MASK_FORMAT),
            RenderTarget::new(
                device,
                "Reflectivity Mask Depth",
                width,
                height,
                crate::constants::capture::DEPTH_FORMAT,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
            ),
        )
    }

    /// Reallocate the targets when the screen size changes
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.target.extent() == (width, height) {
            return;
        }
        let (target, depth) = Self::create_targets(&self.ctx.device, width, height);
        self.target = target;
        self.depth = depth;
        log::debug!("[GpuReflectivityMask] Resized to {}x{}", width, height);
    }

    pub fn extent(&self) -> (u32, u32) {
        self.target.extent()
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.target.view
    }

    /// Render the visible objects' reflectivity with `view_proj`
    pub fn render(&mut self, encoder: &mut wgpu::CommandEncoder, scene: &Scene, view_proj: Mat4) {
        let device = &self.ctx.device;
        self.meshes.sync(
            scene,
            |object| [object.reflectivity, 0.0, 0.0, 0.0],
            |object| MaskMesh::upload(device, object),
        );
        self.ctx.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&view_proj.to_cols_array_2d()),
        );

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Reflectivity Mask Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        for object in scene.visible_objects() {
            if let Some(mesh) = self.meshes.get(object.id) {
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_stride() {
        assert_eq!(std::mem::size_of::<MaskVertex>(), 16);
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_resize_reallocates() {
        let ctx = GpuContext::new_headless_blocking().unwrap();
        let mut mask = GpuReflectivityMask::new(&ctx, 64, 32).unwrap();
        assert_eq!(mask.extent(), (64, 32));
        mask.resize(128, 64);
        assert_eq!(mask.extent(), (128, 64));
    }
}
