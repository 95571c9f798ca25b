/// Mask Module - per-pixel reflectivity consumed by the indirect pass
///
/// - mod.rs: the `ReflectivityMask` trait and the host mask
/// - gpu_mask.rs: screen-sized mask target rendered from the scene
///
/// Reflectivity is stored in the red channel. Pixels without geometry read 0.

pub mod gpu_mask;

pub use gpu_mask::{GpuReflectivityMask, MaskVertex};

use crate::reconstruction::FrameCamera;
use crate::scene::{raycast_visible, Scene};
use glam::Vec2;
use rayon::prelude::*;

/// Per-pixel reflectivity for host consumers
pub trait ReflectivityMask {
    fn extent(&self) -> (u32, u32);

    /// Reflectivity at pixel `(x, y)`, 0 outside the mask
    fn reflectivity_at(&self, x: u32, y: u32) -> f32;
}

/// Image-backed mask
#[derive(Debug, Clone, PartialEq)]
pub struct HostReflectivityMask {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl HostReflectivityMask {
    /// Mask of a uniform reflectivity
    pub fn uniform(width: u32, height: u32, reflectivity: f32) -> Self {
        Self {
            width,
            height,
            values: vec![reflectivity; (width * height) as usize],
        }
    }

    /// Wrap row-major values; `None` if the length does not match the extent
    pub fn from_values(width: u32, height: u32, values: Vec<f32>) -> Option<Self> {
        (values.len() == (width * height) as usize).then_some(Self {
            width,
            height,
            values,
        })
    }

    /// Cast one ray per pixel centre and record the nearest object's reflectivity
    pub fn from_scene(scene: &Scene, camera: &FrameCamera, width: u32, height: u32, far: f32) -> Self {
        let values = (0..width * height)
            .into_par_iter()
            .map(|i| {
                let uv = Vec2::new(
                    ((i % width) as f32 + 0.5) / width as f32,
                    ((i / width) as f32 + 0.5) / height as f32,
                );
                raycast_visible(scene, camera.position, camera.view_ray(uv), far)
                    .and_then(|hit| scene.object(hit.object))
                    .map_or(0.0, |object| object.reflectivity)
            })
            .collect();
        Self {
            width,
            height,
            values,
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

impl ReflectivityMask for HostReflectivityMask {
    fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn reflectivity_at(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.values[(y * self.width + x) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{MeshData, ObjectDesc};
    use glam::{Mat4, Vec3};

    #[test]
    fn test_out_of_range_reads_zero() {
        let mask = HostReflectivityMask::uniform(2, 2, 0.7);
        assert_eq!(mask.reflectivity_at(1, 1), 0.7);
        assert_eq!(mask.reflectivity_at(2, 0), 0.0);
        assert!(HostReflectivityMask::from_values(2, 2, vec![0.0; 3]).is_none());
    }

    #[test]
    fn test_mask_from_scene() {
        let mut scene = Scene::new();
        scene.add_object(
            ObjectDesc::new("Mirror", MeshData::cuboid(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0)))
                .with_reflectivity(0.9),
        );
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(0.8, 1.0, 0.1, 100.0);
        let camera = FrameCamera::new(view, projection);

        let mask = HostReflectivityMask::from_scene(&scene, &camera, 9, 9, 100.0);
        assert!((mask.reflectivity_at(4, 4) - 0.9).abs() < 1e-6);
        assert_eq!(mask.reflectivity_at(0, 0), 0.0);
    }
}
