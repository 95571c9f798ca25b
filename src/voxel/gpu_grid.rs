//! GPU-resident mirror of the voxel grid
//!
//! During a bake the buffer is written by the voxelize kernel and read back
//! once at the end. At runtime the grid is uploaded once at load and bound
//! read-only; reloading means dropping this buffer and creating a new one.

use super::voxel_data::{VoxelGrid, VoxelRecord};
use crate::constants::grid::RECORD_SIZE;
use crate::error::{VxgiError, VxgiResult};
use crate::gpu::GpuContext;
use std::time::Instant;
use wgpu::util::DeviceExt;

/// Storage buffer holding D³ packed records
pub struct GpuVoxelGrid {
    ctx: GpuContext,
    buffer: wgpu::Buffer,
    resolution: u32,
    read_only: bool,
}

impl GpuVoxelGrid {
    /// Zero-initialised bake target with readback support
    pub fn allocate(ctx: &GpuContext, resolution: u32) -> VxgiResult<Self> {
        if resolution == 0 {
            return Err(VxgiError::invalid_config(
                "voxel_resolution",
                resolution,
                "must be greater than 0",
            ));
        }

        let size = (resolution as u64).pow(3) * RECORD_SIZE;
        let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Voxel Grid Buffer"),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Voxel Grid Clear"),
            });
        encoder.clear_buffer(&buffer, 0, None);
        ctx.queue.submit(std::iter::once(encoder.finish()));

        log::info!(
            "[GpuVoxelGrid] Allocated {}³ grid ({} KB)",
            resolution,
            size / 1024
        );

        Ok(Self {
            ctx: ctx.clone(),
            buffer,
            resolution,
            read_only: false,
        })
    }

    /// Immutable runtime copy of a loaded grid
    pub fn from_host_read_only(ctx: &GpuContext, grid: &VoxelGrid) -> Self {
        let buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Runtime Voxel Grid Buffer"),
                contents: bytemuck::cast_slice(grid.records()),
                usage: wgpu::BufferUsages::STORAGE,
            });

        log::info!(
            "[GpuVoxelGrid] Uploaded read-only {}³ grid ({} occupied)",
            grid.resolution(),
            grid.occupied_count()
        );

        Self {
            ctx: ctx.clone(),
            buffer,
            resolution: grid.resolution(),
            read_only: true,
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn size_bytes(&self) -> u64 {
        (self.resolution as u64).pow(3) * RECORD_SIZE
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Copy the host records into the device buffer
    pub fn upload(&self, grid: &VoxelGrid) -> VxgiResult<()> {
        if self.read_only {
            return Err(VxgiError::precondition(
                "GpuVoxelGrid",
                "runtime grids are immutable; reload instead of uploading",
            ));
        }
        if grid.resolution() != self.resolution {
            return Err(VxgiError::SizeMismatch {
                artifact: "<upload>".to_string(),
                expected: (self.resolution as usize).pow(3),
                found: grid.len(),
            });
        }
        self.ctx
            .queue
            .write_buffer(&self.buffer, 0, bytemuck::cast_slice(grid.records()));
        Ok(())
    }

    /// Blocking readback of the whole grid
    ///
    /// Stalls until every command submitted before this call has retired, so
    /// it must only be issued after the last voxelize dispatch.
    pub fn download(&self, world_boundary: f32) -> VxgiResult<VoxelGrid> {
        if self.read_only {
            return Err(VxgiError::precondition(
                "GpuVoxelGrid",
                "runtime grids do not support readback",
            ));
        }

        let start = Instant::now();
        let size = self.size_bytes();
        let device = &self.ctx.device;

        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Voxel Grid Staging Buffer"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Voxel Grid Readback"),
        });
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging_buffer, 0, size);
        self.ctx.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        device.poll(wgpu::Maintain::Wait);

        receiver
            .recv()
            .map_err(|_| VxgiError::gpu("voxel grid readback", "mapping callback dropped"))?
            .map_err(|e| VxgiError::gpu("voxel grid readback", format!("{:?}", e)))?;

        let records: Vec<VoxelRecord> = {
            let mapped = buffer_slice.get_mapped_range();
            bytemuck::cast_slice(&mapped).to_vec()
        };
        staging_buffer.unmap();

        let grid = VoxelGrid::from_records(self.resolution, world_boundary, records)?;

        log::info!(
            "[GpuVoxelGrid] Readback of {} records completed in {:.2}ms ({} occupied)",
            grid.len(),
            start.elapsed().as_secs_f64() * 1000.0,
            grid.occupied_count()
        );

        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{UVec3, Vec3};

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_upload_download_round_trip() {
        let ctx = GpuContext::new_headless_blocking().unwrap();
        let mut host = VoxelGrid::allocate(8, 2.0).unwrap();
        host.set(UVec3::new(1, 2, 3), VoxelRecord::from_color(Vec3::new(0.2, 0.4, 0.6)));

        let device_grid = GpuVoxelGrid::allocate(&ctx, 8).unwrap();
        device_grid.upload(&host).unwrap();
        assert_eq!(device_grid.download(2.0).unwrap(), host);
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn test_read_only_grid_rejects_upload() {
        let ctx = GpuContext::new_headless_blocking().unwrap();
        let host = VoxelGrid::allocate(2, 1.0).unwrap();
        let runtime = GpuVoxelGrid::from_host_read_only(&ctx, &host);
        assert!(runtime.upload(&host).is_err());
        assert!(runtime.download(1.0).is_err());
    }
}
