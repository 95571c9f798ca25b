//! Host capture rig
//!
//! Replaces rasterization with one ray per texel centre against the visible
//! objects' triangles. Texel order and the lighting model match the GPU rig,
//! so both backends feed the voxelize pass the same kind of images.

use super::capture_data::{shade, CaptureDirection, CaptureImages};
use crate::config::{DirectionalLight, VxgiConfig};
use crate::error::{OptionExt, VxgiError, VxgiResult};
use crate::scene::{raycast_visible, Scene};
use glam::Vec4;
use rayon::prelude::*;
use std::time::Instant;

/// One host capture station; images exist only while initialized
#[derive(Debug, Clone)]
pub struct SoftwareCaptureStation {
    pub direction: CaptureDirection,
    images: Option<CaptureImages>,
}

impl SoftwareCaptureStation {
    fn new(direction: CaptureDirection) -> Self {
        Self {
            direction,
            images: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.images.is_some()
    }

    pub fn images(&self) -> Option<&CaptureImages> {
        self.images.as_ref()
    }
}

/// Six host stations sharing one resolution and boundary
#[derive(Debug, Clone)]
pub struct SoftwareCaptureRig {
    stations: Vec<SoftwareCaptureStation>,
    resolution: u32,
    world_boundary: f32,
    light: DirectionalLight,
}

impl SoftwareCaptureRig {
    pub fn new() -> Self {
        Self {
            stations: CaptureDirection::ALL
                .iter()
                .map(|&d| SoftwareCaptureStation::new(d))
                .collect(),
            resolution: 0,
            world_boundary: 0.0,
            light: DirectionalLight::default(),
        }
    }

    /// Release previous targets and allocate cleared `D × D` images
    pub fn initialize(&mut self, config: &VxgiConfig) {
        self.release();
        self.resolution = config.voxel_resolution;
        self.world_boundary = config.world_boundary;
        self.light = config.light;
        for station in &mut self.stations {
            station.images = Some(CaptureImages::empty(self.resolution, self.resolution));
        }
        log::debug!(
            "[SoftwareCaptureRig] Initialized {} stations at {}x{}",
            self.stations.len(),
            self.resolution,
            self.resolution
        );
    }

    pub fn is_initialized(&self, direction: CaptureDirection) -> bool {
        self.stations[direction.index()].is_initialized()
    }

    pub fn station(&self, direction: CaptureDirection) -> &SoftwareCaptureStation {
        &self.stations[direction.index()]
    }

    /// Render the scene's visible objects into one station's images
    pub fn capture(
        &mut self,
        direction: CaptureDirection,
        scene: &Scene,
    ) -> VxgiResult<&CaptureImages> {
        let start = Instant::now();
        let (resolution, boundary, light) = (self.resolution, self.world_boundary, self.light);
        let station = &mut self.stations[direction.index()];
        let images = station.images.as_mut().ok_or_vxgi(|| {
            VxgiError::precondition(direction.name(), "capture station is not initialized")
        })?;

        let texels: Vec<(Vec4, Vec4)> = (0..resolution * resolution)
            .into_par_iter()
            .map(|i| {
                let (u, v) = (i % resolution, i / resolution);
                let (origin, dir) = direction.texel_ray(u, v, resolution, boundary);
                match raycast_visible(scene, origin, dir, 2.0 * boundary) {
                    Some(hit) => {
                        let base_color = scene
                            .object(hit.object)
                            .map_or(glam::Vec3::ZERO, |o| o.base_color);
                        (
                            shade(base_color, hit.normal, &light).extend(1.0),
                            hit.position.extend(1.0),
                        )
                    }
                    None => (Vec4::ZERO, Vec4::ZERO),
                }
            })
            .collect();

        for (i, (color, position)) in texels.into_iter().enumerate() {
            images.color[i] = color;
            images.position[i] = position;
        }

        log::trace!(
            "[SoftwareCaptureRig] {} captured {} texels in {:?}",
            direction,
            images.covered_texels(),
            start.elapsed()
        );
        Ok(images)
    }

    /// Drop every station's images
    pub fn release(&mut self) {
        for station in &mut self.stations {
            station.images = None;
        }
    }
}

impl Default for SoftwareCaptureRig {
    fn default() -> Self {
        Self::new()
    }
}
