//! Bake execution seam
//!
//! Orchestration (`PerObjectVoxelizer`, `ReflectionBaker`) only talks to a
//! `BakeBackend`. The wgpu backend renders and dispatches on the device; the
//! software backend runs the same contract on the host.

use crate::capture::CaptureDirection;
use crate::config::VxgiConfig;
use crate::error::VxgiResult;
use crate::scene::Scene;
use crate::voxel::VoxelGrid;
use std::ops::{Deref, DerefMut};

/// Capture stations, voxelize pass and grid storage of one bake
pub trait BakeBackend {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Allocate (or re-zero) the grid for `config`
    fn allocate_grid(&mut self, config: &VxgiConfig) -> VxgiResult<()>;

    /// Release any previous station targets and allocate `D × D` ones
    fn initialize_stations(&mut self, config: &VxgiConfig) -> VxgiResult<()>;

    fn station_initialized(&self, direction: CaptureDirection) -> bool;

    /// Render the scene's visible objects into one station
    fn capture(&mut self, direction: CaptureDirection, scene: &Scene) -> VxgiResult<()>;

    /// Project one station's last capture into the grid
    fn dispatch_voxelization(&mut self, direction: CaptureDirection) -> VxgiResult<()>;

    /// Copy the grid to the host once every dispatch has been submitted
    fn download_grid(&mut self) -> VxgiResult<VoxelGrid>;

    fn release_stations(&mut self);
}

/// Initialized stations that are released when the lease is dropped
pub struct StationLease<'a, B: BakeBackend + ?Sized> {
    backend: &'a mut B,
}

impl<'a, B: BakeBackend + ?Sized> StationLease<'a, B> {
    pub fn initialize(backend: &'a mut B, config: &VxgiConfig) -> VxgiResult<Self> {
        if let Err(e) = backend.initialize_stations(config) {
            backend.release_stations();
            return Err(e);
        }
        Ok(Self { backend })
    }
}

impl<B: BakeBackend + ?Sized> Deref for StationLease<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.backend
    }
}

impl<B: BakeBackend + ?Sized> DerefMut for StationLease<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.backend
    }
}

impl<B: BakeBackend + ?Sized> Drop for StationLease<'_, B> {
    fn drop(&mut self) {
        self.backend.release_stations();
        log::debug!("[StationLease] Released {} capture stations", self.backend.name());
    }
}
