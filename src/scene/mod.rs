/// Scene Module - the bake's view of the static scene
///
/// - scene_data.rs: objects, meshes and the per-bake object snapshot
/// - mesh_cache.rs: uploaded per-object meshes, invalidated by mesh identity and attribute
/// - scene_operations.rs: snapshotting and ray casting against visible geometry
/// - visibility.rs: scoped hide/isolate guards used during per-object capture

pub mod mesh_cache;
pub mod scene_data;
pub mod scene_operations;
pub mod visibility;

pub use mesh_cache::MeshCache;
pub use scene_data::{MeshData, ObjectDesc, ObjectId, Scene, SceneObject, SceneObjectSet};
pub use scene_operations::{raycast_visible, snapshot_objects, RayHit};
pub use visibility::{HiddenScene, IsolatedObject};
