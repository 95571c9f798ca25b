//! Per-object voxelization
//!
//! Every voxelizable object is captured alone: all renderables are hidden,
//! the object is shown, the six stations capture it and each capture is
//! dispatched into the grid straight away. Objects never occlude each other,
//! so an object's voxels do not depend on what else is in the scene.

use super::backend::BakeBackend;
use crate::capture::CaptureDirection;
use crate::error::{VxgiError, VxgiResult};
use crate::scene::{snapshot_objects, HiddenScene, Scene};
use std::time::Instant;

/// Outcome of one voxelization run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoxelizationReport {
    pub objects: usize,
    pub dispatches: usize,
}

pub struct PerObjectVoxelizer;

impl PerObjectVoxelizer {
    /// Capture and voxelize every static visible object of `scene`
    ///
    /// Visibility is restored on every exit path. Failures are wrapped with
    /// the object and station they happened at.
    pub fn voxelize<B: BakeBackend + ?Sized>(
        backend: &mut B,
        scene: &mut Scene,
    ) -> VxgiResult<VoxelizationReport> {
        let start = Instant::now();
        let set = snapshot_objects(scene);

        if let Some(direction) = CaptureDirection::ALL
            .into_iter()
            .find(|&d| !backend.station_initialized(d))
        {
            return Err(VxgiError::precondition(
                direction.name(),
                "capture station is not initialized",
            ));
        }

        if set.is_empty() {
            log::warn!(
                "[PerObjectVoxelizer] No static visible objects among {} renderables; grid stays empty",
                set.all_renderables.len()
            );
            return Ok(VoxelizationReport::default());
        }

        let mut report = VoxelizationReport::default();
        let mut hidden = HiddenScene::hide(scene, &set)?;

        for &id in &set.voxelizable {
            let name = hidden
                .scene()
                .object(id)
                .map(|o| o.name.clone())
                .unwrap_or_else(|| format!("{:?}", id));
            let isolated = hidden.isolate(id)?;

            for direction in CaptureDirection::ALL {
                backend
                    .capture(direction, &isolated)
                    .and_then(|()| backend.dispatch_voxelization(direction))
                    .map_err(|e| VxgiError::BakeStep {
                        object: name.clone(),
                        station: direction.name().to_string(),
                        error: Box::new(e),
                    })?;
                report.dispatches += 1;
            }

            report.objects += 1;
            log::debug!("[PerObjectVoxelizer] Voxelized '{}'", name);
        }

        log::info!(
            "[PerObjectVoxelizer] Voxelized {} objects ({} dispatches) on {} backend in {:?}",
            report.objects,
            report.dispatches,
            backend.name(),
            start.elapsed()
        );
        Ok(report)
    }
}
