//! Cone tracing math
//!
//! Host versions of the functions in `cone_tracing.wgsl`. The software
//! reconstructor runs these directly; the shader mirrors them line for line.

use super::params::ReconstructionParameters;
use crate::voxel::VoxelGrid;
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Per-frame camera inputs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameCamera {
    pub view_projection: Mat4,
    pub camera_to_world: Mat4,
    pub inverse_projection: Mat4,
    pub position: Vec3,
}

impl FrameCamera {
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        let camera_to_world = view.inverse();
        Self {
            view_projection: projection * view,
            camera_to_world,
            inverse_projection: projection.inverse(),
            position: camera_to_world.w_axis.truncate(),
        }
    }

    /// World-space direction of the view ray through `uv`
    pub fn view_ray(&self, uv: Vec2) -> Vec3 {
        let far = reconstruct_world_position(uv, 1.0, self.inverse_projection, self.camera_to_world);
        (far - self.position).normalize_or_zero()
    }

    /// Depth in `[0, 1]` of a world position
    pub fn depth_of(&self, position: Vec3) -> f32 {
        self.view_projection.project_point3(position).z
    }
}

/// World position of the surface seen at `uv` (origin top-left) with depth in `[0, 1]`
pub fn reconstruct_world_position(
    uv: Vec2,
    depth: f32,
    inverse_projection: Mat4,
    camera_to_world: Mat4,
) -> Vec3 {
    let ndc = Vec4::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, depth, 1.0);
    let view = inverse_projection * ndc;
    let view = view / view.w;
    (camera_to_world * view).truncate()
}

/// Mirror `incident` about `normal`
#[inline]
pub fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - 2.0 * normal.dot(incident) * normal
}

#[inline]
pub fn attenuation(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

/// Reflectivity applied to the indirect term, 0 below `threshold`
#[inline]
pub fn gate_reflectivity(reflectivity: f32, threshold: f32) -> f32 {
    if reflectivity < threshold {
        0.0
    } else {
        reflectivity
    }
}

fn inside_grid(grid: &VoxelGrid, position: Vec3) -> bool {
    let b = grid.world_boundary();
    position.cmpge(Vec3::splat(-b)).all() && position.cmplt(Vec3::splat(b)).all()
}

/// March from `origin` along `direction` and return the first occupied voxel's
/// colour attenuated by distance, or black on a miss
///
/// Samples sit at `cone_offset + i · cone_step` for `i < maximum_iterations`.
/// A sample outside the grid cube ends the march.
pub fn trace_specular_cone(
    grid: &VoxelGrid,
    origin: Vec3,
    direction: Vec3,
    params: &ReconstructionParameters,
) -> Vec3 {
    for i in 0..params.maximum_iterations {
        let t = params.cone_offset + i as f32 * params.cone_step;
        let sample = origin + direction * t;
        if !inside_grid(grid, sample) {
            break;
        }
        let record = grid.sample_world(sample);
        if record.is_occupied() {
            return record.color() * attenuation(t);
        }
    }
    Vec3::ZERO
}

/// Indirect specular of one surface point
///
/// The cone starts one cell above the surface along its normal so the
/// surface's own voxel is not reported as its reflection.
pub fn indirect_specular(
    grid: &VoxelGrid,
    camera_position: Vec3,
    surface: Vec3,
    normal: Vec3,
    reflectivity: f32,
    params: &ReconstructionParameters,
) -> Vec3 {
    let weight = gate_reflectivity(reflectivity, params.threshold);
    if weight == 0.0 {
        return Vec3::ZERO;
    }
    let view_dir = (surface - camera_position).normalize_or_zero();
    let direction = reflect(view_dir, normal).normalize_or_zero();
    let origin = surface + normal * grid.cell_size();
    trace_specular_cone(grid, origin, direction, params) * weight
}

/// `direct · direct_strength + indirect · indirect_strength`, alpha from direct
pub fn composite(
    direct: Vec4,
    indirect: Vec3,
    params: &ReconstructionParameters,
    indirect_enabled: bool,
) -> Vec4 {
    let mut rgb = direct.truncate() * params.direct_strength;
    if indirect_enabled {
        rgb += indirect * params.indirect_strength;
    }
    rgb.extend(direct.w)
}

/// Ray parameters where a ray enters and leaves the grid cube
fn grid_span(grid: &VoxelGrid, origin: Vec3, direction: Vec3) -> Option<(f32, f32)> {
    let b = grid.world_boundary();
    let inv = direction.recip();
    let t0 = (Vec3::splat(-b) - origin) * inv;
    let t1 = (Vec3::splat(b) - origin) * inv;
    let near = t0.min(t1).max_element().max(0.0);
    let far = t0.max(t1).min_element();
    (near <= far).then_some((near, far))
}

/// First occupied voxel along a view ray, marched in half-cell steps
pub fn march_voxel_debug(grid: &VoxelGrid, origin: Vec3, direction: Vec3) -> Vec3 {
    let Some((near, far)) = grid_span(grid, origin, direction) else {
        return Vec3::ZERO;
    };
    let step = grid.cell_size() * 0.5;
    let mut t = near + step * 0.5;
    while t < far {
        let record = grid.sample_world(origin + direction * t);
        if record.is_occupied() {
            return record.color();
        }
        t += step;
    }
    Vec3::ZERO
}
