//! Capture station data
//!
//! Six axial orthographic stations surround the voxelized cube. Station
//! order is fixed: it is also the voxelize submission order, and with
//! last-writer-wins accumulation it decides which colour a shared cell keeps.

use crate::config::DirectionalLight;
use crate::constants::capture::STATION_COUNT;
use glam::{Mat4, Vec3, Vec4};

/// One of the six axial capture stations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureDirection {
    Front,
    Back,
    Left,
    Right,
    Top,
    Bottom,
}

impl CaptureDirection {
    /// Submission order of the stations
    pub const ALL: [CaptureDirection; STATION_COUNT] = [
        CaptureDirection::Front,
        CaptureDirection::Back,
        CaptureDirection::Left,
        CaptureDirection::Right,
        CaptureDirection::Top,
        CaptureDirection::Bottom,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CaptureDirection::Front => "Front Camera",
            CaptureDirection::Back => "Back Camera",
            CaptureDirection::Left => "Left Camera",
            CaptureDirection::Right => "Right Camera",
            CaptureDirection::Top => "Top Camera",
            CaptureDirection::Bottom => "Bottom Camera",
        }
    }

    /// Position in [`CaptureDirection::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Direction the station looks along
    pub fn forward(self) -> Vec3 {
        match self {
            CaptureDirection::Front => Vec3::Z,
            CaptureDirection::Back => Vec3::NEG_Z,
            CaptureDirection::Left => Vec3::X,
            CaptureDirection::Right => Vec3::NEG_X,
            CaptureDirection::Top => Vec3::NEG_Y,
            CaptureDirection::Bottom => Vec3::Y,
        }
    }

    pub fn up(self) -> Vec3 {
        match self {
            CaptureDirection::Top | CaptureDirection::Bottom => Vec3::Z,
            _ => Vec3::Y,
        }
    }

    /// Camera position for a cube of half-extent `world_boundary`
    pub fn eye(self, world_boundary: f32) -> Vec3 {
        -self.forward() * world_boundary
    }

    /// Camera-space right and up axes in world space
    pub fn basis(self) -> (Vec3, Vec3) {
        let forward = self.forward();
        let right = forward.cross(self.up()).normalize();
        (right, right.cross(forward))
    }

    pub fn view(self, world_boundary: f32) -> Mat4 {
        Mat4::look_to_rh(self.eye(world_boundary), self.forward(), self.up())
    }

    /// Orthographic projection covering `[-B, B]` across and `[0, 2B]` deep
    pub fn projection(world_boundary: f32) -> Mat4 {
        let b = world_boundary;
        Mat4::orthographic_rh(-b, b, -b, b, 0.0, 2.0 * b)
    }

    pub fn view_projection(self, world_boundary: f32) -> Mat4 {
        Self::projection(world_boundary) * self.view(world_boundary)
    }

    /// Ray through the centre of texel `(u, v)` of a `resolution²` target
    ///
    /// Row 0 is the top of the image, matching the rasterizer's texel order.
    pub fn texel_ray(self, u: u32, v: u32, resolution: u32, world_boundary: f32) -> (Vec3, Vec3) {
        let d = resolution as f32;
        let ndc_x = (u as f32 + 0.5) / d * 2.0 - 1.0;
        let ndc_y = 1.0 - (v as f32 + 0.5) / d * 2.0;
        let (right, up) = self.basis();
        let origin = self.eye(world_boundary) + (right * ndc_x + up * ndc_y) * world_boundary;
        (origin, self.forward())
    }
}

impl std::fmt::Display for CaptureDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Host copy of one station's targets, row-major `width × height`
///
/// `position.w` is 1 where geometry was captured and 0 elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureImages {
    pub width: u32,
    pub height: u32,
    pub color: Vec<Vec4>,
    pub position: Vec<Vec4>,
}

impl CaptureImages {
    /// Cleared targets
    pub fn empty(width: u32, height: u32) -> Self {
        let texels = (width * height) as usize;
        Self {
            width,
            height,
            color: vec![Vec4::ZERO; texels],
            position: vec![Vec4::ZERO; texels],
        }
    }

    /// Texels carrying geometry
    pub fn covered_texels(&self) -> usize {
        self.position.iter().filter(|p| p.w >= 0.5).count()
    }
}

/// Direct lighting model shared by both capture backends
pub fn shade(base_color: Vec3, normal: Vec3, light: &DirectionalLight) -> Vec3 {
    let to_light = -light.direction.normalize_or_zero();
    let diffuse = normal.dot(to_light).max(0.0);
    base_color * (light.ambient + light.color * diffuse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_order_and_names() {
        let names: Vec<_> = CaptureDirection::ALL.iter().map(|d| d.name()).collect();
        assert_eq!(
            names,
            [
                "Front Camera",
                "Back Camera",
                "Left Camera",
                "Right Camera",
                "Top Camera",
                "Bottom Camera"
            ]
        );
        assert_eq!(CaptureDirection::ALL.len(), STATION_COUNT);
        for (i, dir) in CaptureDirection::ALL.iter().enumerate() {
            assert_eq!(dir.index(), i);
        }
    }

    #[test]
    fn test_forward_axes() {
        assert_eq!(CaptureDirection::Front.forward(), Vec3::Z);
        assert_eq!(CaptureDirection::Right.forward(), Vec3::NEG_X);
        assert_eq!(CaptureDirection::Top.forward(), Vec3::NEG_Y);
        for dir in CaptureDirection::ALL {
            assert!(dir.forward().dot(dir.up()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_view_projection_maps_cube_to_clip_volume() {
        let b = 10.0;
        for dir in CaptureDirection::ALL {
            let vp = dir.view_projection(b);
            let near = vp.project_point3(dir.eye(b));
            let far = vp.project_point3(dir.eye(b) + dir.forward() * 2.0 * b);
            assert!(near.z.abs() < 1e-5, "{}: near {}", dir, near.z);
            assert!((far.z - 1.0).abs() < 1e-5, "{}: far {}", dir, far.z);
        }
    }

    #[test]
    fn test_texel_ray_matches_projection() {
        let b = 10.0;
        let d = 8;
        for dir in CaptureDirection::ALL {
            let vp = dir.view_projection(b);
            let (origin, direction) = dir.texel_ray(2, 5, d, b);
            let ndc = vp.project_point3(origin + direction * b);
            let u = (ndc.x + 1.0) * 0.5 * d as f32;
            let v = (1.0 - ndc.y) * 0.5 * d as f32;
            assert!((u - 2.5).abs() < 1e-4, "{}: u {}", dir, u);
            assert!((v - 5.5).abs() < 1e-4, "{}: v {}", dir, v);
        }
    }

    #[test]
    fn test_shade_facing_light() {
        let light = DirectionalLight {
            direction: Vec3::NEG_Y,
            color: Vec3::ONE,
            ambient: Vec3::splat(0.25),
        };
        let lit = shade(Vec3::new(0.5, 0.5, 0.5), Vec3::Y, &light);
        assert!((lit - Vec3::splat(0.625)).length() < 1e-6);
        let unlit = shade(Vec3::ONE, Vec3::NEG_Y, &light);
        assert!((unlit - Vec3::splat(0.25)).length() < 1e-6);
    }
}
