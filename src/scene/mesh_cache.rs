//! Per-object device resources keyed by object identity
//!
//! An entry is reused only while the object still holds the same mesh
//! allocation and the same baked attribute (colour, reflectivity). Ids restart
//! at 0 in every `Scene`, so an id alone says nothing about the geometry.

use super::scene_data::{MeshData, ObjectId, Scene, SceneObject};
use std::collections::HashMap;
use std::sync::Arc;

struct CacheEntry<M> {
    mesh: Arc<MeshData>,
    attribute: [u32; 4],
    resource: M,
}

/// Cache of uploaded meshes for the objects of the last synced scene
pub struct MeshCache<M> {
    entries: HashMap<ObjectId, CacheEntry<M>>,
}

impl<M> MeshCache<M> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Upload stale or missing entries for `scene`'s visible objects and drop
    /// entries of objects the scene no longer has
    ///
    /// `attribute` returns the per-object value baked into the resource; it is
    /// compared bitwise. Hidden objects keep their entries. Returns the number
    /// of uploads.
    pub fn sync(
        &mut self,
        scene: &Scene,
        attribute: impl Fn(&SceneObject) -> [f32; 4],
        mut upload: impl FnMut(&SceneObject) -> M,
    ) -> usize {
        self.entries.retain(|id, entry| {
            scene
                .object(*id)
                .is_some_and(|o| Arc::ptr_eq(&entry.mesh, &o.mesh))
        });

        let mut uploads = 0;
        for object in scene.visible_objects().filter(|o| !o.mesh.is_empty()) {
            let bits = attribute(object).map(f32::to_bits);
            let fresh = self
                .entries
                .get(&object.id)
                .is_some_and(|e| Arc::ptr_eq(&e.mesh, &object.mesh) && e.attribute == bits);
            if !fresh {
                self.entries.insert(
                    object.id,
                    CacheEntry {
                        mesh: Arc::clone(&object.mesh),
                        attribute: bits,
                        resource: upload(object),
                    },
                );
                uploads += 1;
            }
        }
        uploads
    }

    pub fn get(&self, id: ObjectId) -> Option<&M> {
        self.entries.get(&id).map(|e| &e.resource)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<M> Default for MeshCache<M> {
    fn default() -> Self {
        Self::new()
    }
}
