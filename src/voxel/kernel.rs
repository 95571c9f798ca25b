//! Voxelize pass
//!
//! Contract shared by the compute kernel and the host implementation: for
//! every capture texel whose position alpha is at least 0.5, find the grid
//! cell containing the captured world position and overwrite it with the
//! packed direct-lit colour. Texels without geometry never write, so across
//! dispatches the last non-empty writer wins, in submission order. Within a
//! single dispatch the host walks texels row by row; on the GPU concurrent
//! writes to one cell are unordered.

use super::gpu_grid::GpuVoxelGrid;
use super::voxel_data::{VoxelGrid, VoxelRecord};
use crate::capture::CaptureImages;
use crate::constants::capture::COVERAGE_THRESHOLD;
use crate::error::VxgiResult;
use crate::gpu::layouts::{float_texture_entry, storage_buffer_entry, uniform_buffer_entry};
use crate::gpu::validation::{create_shader, validation_scope};
use crate::gpu::GpuContext;
use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

/// Uniform block of the voxelize kernel
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct VoxelizeParams {
    pub resolution: u32,
    pub world_boundary: f32,
    pub _padding: [u32; 2],
}

const_assert_eq!(std::mem::size_of::<VoxelizeParams>(), 16);

/// Host implementation of the voxelize pass
///
/// Returns the number of texels that wrote a record.
pub fn voxelize_capture(grid: &mut VoxelGrid, images: &CaptureImages) -> usize {
    let mut written = 0;
    for (color, position) in images.color.iter().zip(&images.position) {
        if position.w < COVERAGE_THRESHOLD {
            continue;
        }
        if let Some(cell) = grid.cell_containing(position.truncate()) {
            grid.set(cell, VoxelRecord::from_color(color.truncate()));
            written += 1;
        }
    }
    written
}

/// Compute pipeline for the voxelize pass
pub struct VoxelizeKernel {
    ctx: GpuContext,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
}

impl VoxelizeKernel {
    pub fn new(ctx: &GpuContext) -> VxgiResult<Self> {
        let device = &ctx.device;
        let shader = create_shader(
            device,
            "Voxelize Shader",
            include_str!("../shaders/voxelize.wgsl"),
        )?;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Voxelize Bind Group Layout"),
            entries: &[
                storage_buffer_entry(0, false, wgpu::ShaderStages::COMPUTE),
                uniform_buffer_entry(1, wgpu::ShaderStages::COMPUTE),
                float_texture_entry(2, wgpu::ShaderStages::COMPUTE),
                float_texture_entry(3, wgpu::ShaderStages::COMPUTE),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Voxelize Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = validation_scope(device, "Voxelize Pipeline", || {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Voxelize Pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: "voxelize",
            })
        })?;

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Voxelize Params"),
            size: std::mem::size_of::<VoxelizeParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        log::info!("[VoxelizeKernel] Compute pipeline ready");

        Ok(Self {
            ctx: ctx.clone(),
            pipeline,
            bind_group_layout,
            params_buffer,
        })
    }

    /// Set the grid resolution and boundary used by later dispatches
    pub fn set_params(&self, resolution: u32, world_boundary: f32) {
        let params = VoxelizeParams {
            resolution,
            world_boundary,
            _padding: [0; 2],
        };
        self.ctx
            .queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));
    }

    /// Encode and submit one dispatch over a `D × D` capture
    pub fn dispatch(
        &self,
        grid: &GpuVoxelGrid,
        color_view: &wgpu::TextureView,
        position_view: &wgpu::TextureView,
        label: &str,
    ) {
        let device = &self.ctx.device;
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Voxelize Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: grid.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(color_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(position_view),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Voxelize Encoder"),
        });

        // One work group per texel on the capture plane, one along its depth axis
        let resolution = grid.resolution();
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(resolution, resolution, 1);
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        log::debug!(
            "[VoxelizeKernel] Dispatched {}x{}x1 work groups for {}",
            resolution,
            resolution,
            label
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{UVec3, Vec4};

    fn images(color: Vec<Vec4>, position: Vec<Vec4>) -> CaptureImages {
        CaptureImages {
            width: color.len() as u32,
            height: 1,
            color,
            position,
        }
    }

    #[test]
    fn test_empty_texels_do_not_write() {
        let mut grid = VoxelGrid::allocate(4, 10.0).unwrap();
        let written = voxelize_capture(
            &mut grid,
            &images(vec![Vec4::ONE; 2], vec![Vec4::new(2.5, 2.5, 2.5, 0.0), Vec4::ZERO]),
        );
        assert_eq!(written, 0);
        assert_eq!(grid.occupied_count(), 0);
    }

    #[test]
    fn test_last_writer_wins() {
        let mut grid = VoxelGrid::allocate(4, 10.0).unwrap();
        let p = Vec4::new(2.5, 2.5, 2.5, 1.0);
        voxelize_capture(&mut grid, &images(vec![Vec4::new(1.0, 0.0, 0.0, 1.0)], vec![p]));
        voxelize_capture(&mut grid, &images(vec![Vec4::new(0.0, 0.0, 1.0, 1.0)], vec![p]));
        let record = grid.get(UVec3::splat(2)).unwrap();
        assert_eq!(record, VoxelRecord::from_color(glam::Vec3::Z));
    }

    #[test]
    fn test_positions_outside_grid_are_skipped() {
        let mut grid = VoxelGrid::allocate(2, 1.0).unwrap();
        let written = voxelize_capture(
            &mut grid,
            &images(vec![Vec4::ONE], vec![Vec4::new(5.0, 0.0, 0.0, 1.0)]),
        );
        assert_eq!(written, 0);
    }

    #[test]
    fn test_params_layout() {
        assert_eq!(std::mem::size_of::<VoxelizeParams>() % 16, 0);
    }
}
