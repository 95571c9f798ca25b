//! Host bake backend

use super::backend::BakeBackend;
use crate::capture::{CaptureDirection, SoftwareCaptureRig};
use crate::config::VxgiConfig;
use crate::error::{OptionExt, VxgiError, VxgiResult};
use crate::scene::Scene;
use crate::voxel::{voxelize_capture, VoxelGrid};

/// Ray-cast capture rig plus a host grid
#[derive(Debug, Default)]
pub struct SoftwareBakeBackend {
    rig: SoftwareCaptureRig,
    grid: Option<VoxelGrid>,
}

impl SoftwareBakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rig(&self) -> &SoftwareCaptureRig {
        &self.rig
    }
}

impl BakeBackend for SoftwareBakeBackend {
    fn name(&self) -> &str {
        "software"
    }

    fn allocate_grid(&mut self, config: &VxgiConfig) -> VxgiResult<()> {
        self.grid = Some(VoxelGrid::allocate(config.voxel_resolution, config.world_boundary)?);
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
        self.rig.capture(direction, scene).map(|_| ())
    }

    fn dispatch_voxelization(&mut self, direction: CaptureDirection) -> VxgiResult<()> {
        let grid = self
            .grid
            .as_mut()
            .ok_or_vxgi(|| VxgiError::precondition("VoxelGrid", "grid is not allocated"))?;
        let images = self.rig.station(direction).images().ok_or_vxgi(|| {
            VxgiError::precondition(direction.name(), "capture station is not initialized")
        })?;
        let written = voxelize_capture(grid, images);
        log::trace!(
            "[SoftwareBakeBackend] {} wrote {} voxels",
            direction,
            written
        );
        Ok(())
    }

    fn download_grid(&mut self) -> VxgiResult<VoxelGrid> {
        self.grid
            .clone()
            .ok_or_vxgi(|| VxgiError::precondition("VoxelGrid", "grid is not allocated"))
    }

    fn release_stations(&mut self) {
        self.rig.release();
    }
}
