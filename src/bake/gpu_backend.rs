//! wgpu bake backend

use super::backend::BakeBackend;
use crate::capture::{CaptureDirection, GpuCaptureRig};
use crate::config::VxgiConfig;
use crate::error::{OptionExt, VxgiError, VxgiResult};
use crate::gpu::{validation_scope, GpuContext};
use crate::scene::Scene;
use crate::voxel::{GpuVoxelGrid, VoxelGrid, VoxelizeKernel};

/// Rasterizing capture rig, voxelize compute kernel and device grid
pub struct GpuBakeBackend {
    ctx: GpuContext,
    rig: GpuCaptureRig,
    kernel: VoxelizeKernel,
    grid: Option<GpuVoxelGrid>,
    world_boundary: f32,
}

impl GpuBakeBackend {
    pub fn new(ctx: &GpuContext) -> VxgiResult<Self> {
        Ok(Self {
            ctx: ctx.clone(),
            rig: GpuCaptureRig::new(ctx)?,
            kernel: VoxelizeKernel::new(ctx)?,
            grid: None,
            world_boundary: 0.0,
        })
    }

    pub fn rig(&self) -> &GpuCaptureRig {
        &self.rig
    }
}

impl BakeBackend for GpuBakeBackend {
    fn name(&self) -> &str {
        "gpu"
    }

    fn allocate_grid(&mut self, config: &VxgiConfig) -> VxgiResult<()> {
        match &self.grid {
            // Re-bake at the same resolution: clear the existing buffer in place
            Some(grid) if grid.resolution() == config.voxel_resolution => {
                grid.upload(&VoxelGrid::allocate(
                    config.voxel_resolution,
                    config.world_boundary,
                )?)?;
                log::debug!("[GpuBakeBackend] Cleared the device grid for a re-bake");
            }
            _ => self.grid = Some(GpuVoxelGrid::allocate(&self.ctx, config.voxel_resolution)?),
        }
        self.world_boundary = config.world_boundary;
        self.kernel
            .set_params(config.voxel_resolution, config.world_boundary);
        Ok(())
    }

    fn initialize_stations(&mut self, config: &VxgiConfig) -> VxgiResult<()> {
        self.rig.initialize(config);
        Ok(())
    }

    fn station_initialized(&self, direction: CaptureDirection) -> bool {
        self.rig.is_initialized(direction)
    }

    fn capture(&mut self, direction: CaptureDirection, scene: &Scene) -> VxgiResult<()> {
        let device = self.ctx.device.clone();
        validation_scope(&device, direction.name(), || self.rig.capture(direction, scene))?
    }

    fn dispatch_voxelization(&mut self, direction: CaptureDirection) -> VxgiResult<()> {
        let grid = self
            .grid
            .as_ref()
            .ok_or_vxgi(|| VxgiError::precondition("VoxelGrid", "grid is not allocated"))?;
        let station = self.rig.station(direction);
        let (Some(color), Some(position)) = (station.color_view(), station.position_view()) else {
            return Err(VxgiError::precondition(
                direction.name(),
                "capture station is not initialized",
            ));
        };
        validation_scope(&self.ctx.device, "Voxelize Dispatch", || {
            self.kernel.dispatch(grid, color, position, direction.name())
        })
    }

    fn download_grid(&mut self) -> VxgiResult<VoxelGrid> {
        self.grid
            .as_ref()
            .ok_or_vxgi(|| VxgiError::precondition("VoxelGrid", "grid is not allocated"))?
            .download(self.world_boundary)
    }

    fn release_stations(&mut self) {
        self.rig.release();
    }
}
