//! Scene operations - pure functions over `Scene`
//!
//! Snapshotting decides which objects a bake touches; ray casting is what the
//! host capture path and the host reflectivity mask use in place of rasterization.

use super::scene_data::{ObjectId, Scene, SceneObject, SceneObjectSet};
use glam::Vec3;

/// Nearest intersection of a ray with visible geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub object: ObjectId,
    pub distance: f32,
    pub position: Vec3,
    /// Interpolated vertex normal, normalized
    pub normal: Vec3,
}

/// Build the per-bake object set
///
/// Renderables are the currently visible objects that carry geometry; the
/// voxelizable subset keeps only static ones. Scene order is preserved.
pub fn snapshot_objects(scene: &Scene) -> SceneObjectSet {
    let all_renderables: Vec<ObjectId> = scene
        .objects()
        .iter()
        .filter(|o| o.visible && !o.mesh.is_empty())
        .map(|o| o.id)
        .collect();

    let voxelizable = scene
        .objects()
        .iter()
        .filter(|o| o.is_static && all_renderables.contains(&o.id))
        .map(|o| o.id)
        .collect();

    SceneObjectSet {
        all_renderables,
        voxelizable,
    }
}

/// Cast a ray against every visible object and keep the nearest hit
///
/// Ties keep the object that comes first in scene order.
pub fn raycast_visible(scene: &Scene, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
    let mut nearest: Option<RayHit> = None;
    for object in scene.visible_objects() {
        let limit = nearest.map_or(max_distance, |hit| hit.distance);
        if let Some(hit) = raycast_object(object, origin, direction, limit) {
            if nearest.map_or(true, |n| hit.distance < n.distance) {
                nearest = Some(hit);
            }
        }
    }
    nearest
}

fn raycast_object(object: &SceneObject, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
    let mesh = &object.mesh;
    let mut best: Option<(f32, f32, f32, usize)> = None;

    for (triangle, corners) in mesh.indices.chunks_exact(3).enumerate() {
        let (Some(&a), Some(&b), Some(&c)) = (
            mesh.positions.get(corners[0] as usize),
            mesh.positions.get(corners[1] as usize),
            mesh.positions.get(corners[2] as usize),
        ) else {
            continue;
        };
        let limit = best.map_or(max_distance, |(t, ..)| t);
        if let Some((t, u, v)) = ray_triangle(origin, direction, a, b, c) {
            if t < limit {
                best = Some((t, u, v, triangle));
            }
        }
    }

    let (t, u, v, triangle) = best?;
    let corners = &mesh.indices[triangle * 3..triangle * 3 + 3];
    let normal_at = |i: u32| mesh.normals.get(i as usize).copied();
    let normal = match (normal_at(corners[0]), normal_at(corners[1]), normal_at(corners[2])) {
        (Some(n0), Some(n1), Some(n2)) => (n0 * (1.0 - u - v) + n1 * u + n2 * v).normalize_or_zero(),
        _ => {
            let p = |i: u32| mesh.positions[i as usize];
            (p(corners[1]) - p(corners[0]))
                .cross(p(corners[2]) - p(corners[0]))
                .normalize_or_zero()
        }
    };

    Some(RayHit {
        object: object.id,
        distance: t,
        position: origin + direction * t,
        normal,
    })
}

/// Möller–Trumbore intersection, double sided
///
/// Returns `(t, u, v)` with barycentrics relative to `a` for hits in front of
/// the origin.
pub fn ray_triangle(origin: Vec3, direction: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<(f32, f32, f32)> {
    const EPSILON: f32 = 1e-7;
    // Rays through a shared edge must hit at least one of its triangles
    const EDGE_TOLERANCE: f32 = 1e-5;

    let edge1 = b - a;
    let edge2 = c - a;
    let p = direction.cross(edge2);
    let det = edge1.dot(p);
    if det.abs() < EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let s = origin - a;
    let u = s.dot(p) * inv_det;
    if !(-EDGE_TOLERANCE..=1.0 + EDGE_TOLERANCE).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = direction.dot(q) * inv_det;
    if v < -EDGE_TOLERANCE || u + v > 1.0 + EDGE_TOLERANCE {
        return None;
    }

    let t = edge2.dot(q) * inv_det;
    (t > EPSILON).then_some((t, u, v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{MeshData, ObjectDesc};

    fn two_cube_scene() -> (Scene, ObjectId, ObjectId) {
        let mut scene = Scene::new();
        let near = scene.add_object(
            ObjectDesc::new("near", MeshData::cube(Vec3::new(0.0, 0.0, -2.0), 0.5)).static_geometry(),
        );
        let far = scene.add_object(ObjectDesc::new("far", MeshData::cube(Vec3::new(0.0, 0.0, 2.0), 0.5)));
        (scene, near, far)
    }

    #[test]
    fn test_snapshot_filters_static_and_visible() {
        let (mut scene, near, far) = two_cube_scene();
        let hidden = scene.add_object(
            ObjectDesc::new("hidden", MeshData::cube(Vec3::ZERO, 0.5))
                .static_geometry()
                .hidden(),
        );
        let empty = scene.add_object(ObjectDesc::new("empty", MeshData::default()).static_geometry());

        let set = snapshot_objects(&scene);
        assert_eq!(set.all_renderables, vec![near, far]);
        assert_eq!(set.voxelizable, vec![near]);
        assert!(!set.all_renderables.contains(&hidden));
        assert!(!set.all_renderables.contains(&empty));
        assert!(set.voxelizable.iter().all(|id| set.all_renderables.contains(id)));
    }

    #[test]
    fn test_raycast_returns_nearest_surface() {
        let (scene, near, _) = two_cube_scene();
        let hit = raycast_visible(&scene, Vec3::new(0.0, 0.0, -10.0), Vec3::Z, 100.0).unwrap();
        assert_eq!(hit.object, near);
        assert!((hit.position.z - -2.5).abs() < 1e-5);
        assert!((hit.normal - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn test_raycast_skips_hidden_objects() {
        let (mut scene, near, far) = two_cube_scene();
        scene.set_visible(near, false).unwrap();
        let hit = raycast_visible(&scene, Vec3::new(0.0, 0.0, -10.0), Vec3::Z, 100.0).unwrap();
        assert_eq!(hit.object, far);
    }

    #[test]
    fn test_raycast_respects_max_distance() {
        let (scene, ..) = two_cube_scene();
        assert!(raycast_visible(&scene, Vec3::new(0.0, 0.0, -10.0), Vec3::Z, 5.0).is_none());
    }

    #[test]
    fn test_ray_triangle_miss_behind_origin() {
        let hit = ray_triangle(
            Vec3::new(0.2, 0.2, 1.0),
            Vec3::Z,
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
        );
        assert!(hit.is_none());
    }
}
