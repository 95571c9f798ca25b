//! Scene data structures
//!
//! Geometry is static and already in world space; the bake never moves it.

use crate::error::{VxgiError, VxgiResult};
use glam::Vec3;
use std::sync::Arc;

/// Stable handle of an object within one `Scene`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

/// Indexed triangle mesh in world space
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Axis-aligned box with outward face normals (24 vertices, 12 triangles)
    pub fn cuboid(min: Vec3, max: Vec3) -> Self {
        let faces: [(Vec3, [Vec3; 4]); 6] = [
            (
                Vec3::X,
                [
                    Vec3::new(max.x, min.y, min.z),
                    Vec3::new(max.x, max.y, min.z),
                    Vec3::new(max.x, max.y, max.z),
                    Vec3::new(max.x, min.y, max.z),
                ],
            ),
            (
                Vec3::NEG_X,
                [
                    Vec3::new(min.x, min.y, max.z),
                    Vec3::new(min.x, max.y, max.z),
                    Vec3::new(min.x, max.y, min.z),
                    Vec3::new(min.x, min.y, min.z),
                ],
            ),
            (
                Vec3::Y,
                [
                    Vec3::new(min.x, max.y, min.z),
                    Vec3::new(min.x, max.y, max.z),
                    Vec3::new(max.x, max.y, max.z),
                    Vec3::new(max.x, max.y, min.z),
                ],
            ),
            (
                Vec3::NEG_Y,
                [
                    Vec3::new(min.x, min.y, max.z),
                    Vec3::new(min.x, min.y, min.z),
                    Vec3::new(max.x, min.y, min.z),
                    Vec3::new(max.x, min.y, max.z),
                ],
            ),
            (
                Vec3::Z,
                [
                    Vec3::new(min.x, min.y, max.z),
                    Vec3::new(max.x, min.y, max.z),
                    Vec3::new(max.x, max.y, max.z),
                    Vec3::new(min.x, max.y, max.z),
                ],
            ),
            (
                Vec3::NEG_Z,
                [
                    Vec3::new(max.x, min.y, min.z),
                    Vec3::new(min.x, min.y, min.z),
                    Vec3::new(min.x, max.y, min.z),
                    Vec3::new(max.x, max.y, min.z),
                ],
            ),
        ];

        let mut mesh = MeshData::default();
        for (normal, corners) in faces {
            let base = mesh.positions.len() as u32;
            mesh.positions.extend_from_slice(&corners);
            mesh.normals.extend_from_slice(&[normal; 4]);
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }

    /// Cube centred on `center`
    pub fn cube(center: Vec3, half_extent: f32) -> Self {
        Self::cuboid(center - Vec3::splat(half_extent), center + Vec3::splat(half_extent))
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.len() < 3 || self.positions.is_empty()
    }
}

/// Description of an object before it is added to a scene
#[derive(Debug, Clone)]
pub struct ObjectDesc {
    pub name: String,
    pub mesh: MeshData,
    pub base_color: Vec3,
    /// Value written into the reflectivity mask, 0 = matte
    pub reflectivity: f32,
    /// Only static objects are voxelized
    pub is_static: bool,
    pub visible: bool,
}

impl ObjectDesc {
    pub fn new(name: impl Into<String>, mesh: MeshData) -> Self {
        Self {
            name: name.into(),
            mesh,
            base_color: Vec3::ONE,
            reflectivity: 0.0,
            is_static: false,
            visible: true,
        }
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.base_color = color;
        self
    }

    pub fn with_reflectivity(mut self, reflectivity: f32) -> Self {
        self.reflectivity = reflectivity;
        self
    }

    pub fn static_geometry(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// Object owned by a scene
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub id: ObjectId,
    pub name: String,
    pub mesh: Arc<MeshData>,
    pub base_color: Vec3,
    pub reflectivity: f32,
    pub is_static: bool,
    pub visible: bool,
}

/// Flat list of scene objects in insertion order
#[derive(Debug, Clone, Default)]
pub struct Scene {
    objects: Vec<SceneObject>,
    next_id: u32,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_object(&mut self, desc: ObjectDesc) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.push(SceneObject {
            id,
            name: desc.name,
            mesh: Arc::new(desc.mesh),
            base_color: desc.base_color,
            reflectivity: desc.reflectivity,
            is_static: desc.is_static,
            visible: desc.visible,
        });
        id
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn object(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn is_visible(&self, id: ObjectId) -> Option<bool> {
        self.object(id).map(|o| o.visible)
    }

    pub fn set_visible(&mut self, id: ObjectId, visible: bool) -> VxgiResult<()> {
        let object = self
            .objects
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| VxgiError::precondition("Scene", format!("object {:?} not found", id)))?;
        object.visible = visible;
        Ok(())
    }

    pub fn visible_objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(|o| o.visible)
    }

    /// Visibility of every object, in scene order
    pub fn visibility_snapshot(&self) -> Vec<(ObjectId, bool)> {
        self.objects.iter().map(|o| (o.id, o.visible)).collect()
    }
}

/// Objects taking part in one bake run
///
/// `voxelizable` is always a subset of `all_renderables`, in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneObjectSet {
    pub all_renderables: Vec<ObjectId>,
    pub voxelizable: Vec<ObjectId>,
}

impl SceneObjectSet {
    pub fn is_empty(&self) -> bool {
        self.voxelizable.is_empty()
    }
}
