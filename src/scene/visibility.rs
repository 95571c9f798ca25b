//! Scoped visibility for per-object capture
//!
//! `HiddenScene` hides every renderable for the duration of a bake and puts
//! each one back to its pre-bake visibility when dropped. `IsolatedObject`
//! shows a single object and hides it again when dropped. Both restore on
//! every exit path, including `?` propagation and panics.

use super::scene_data::{ObjectId, Scene, SceneObjectSet};
use crate::error::VxgiResult;
use std::ops::Deref;

/// Scene with all renderables of a snapshot hidden
pub struct HiddenScene<'a> {
    scene: &'a mut Scene,
    restore: Vec<(ObjectId, bool)>,
}

impl<'a> HiddenScene<'a> {
    pub fn hide(scene: &'a mut Scene, set: &SceneObjectSet) -> VxgiResult<Self> {
        let mut restore = Vec::with_capacity(set.all_renderables.len());
        for &id in &set.all_renderables {
            if let Some(visible) = scene.is_visible(id) {
                restore.push((id, visible));
            }
        }

        let mut hidden = Self { scene, restore };
        for &(id, _) in &hidden.restore.clone() {
            hidden.scene.set_visible(id, false)?;
        }

        log::debug!(
            "[HiddenScene] Hid {} renderables",
            hidden.restore.len()
        );
        Ok(hidden)
    }

    /// Show only `id` until the returned guard is dropped
    pub fn isolate(&mut self, id: ObjectId) -> VxgiResult<IsolatedObject<'_>> {
        self.scene.set_visible(id, true)?;
        Ok(IsolatedObject {
            scene: &mut *self.scene,
            id,
        })
    }

    pub fn scene(&self) -> &Scene {
        &*self.scene
    }
}

impl Drop for HiddenScene<'_> {
    fn drop(&mut self) {
        for &(id, visible) in &self.restore {
            if let Err(e) = self.scene.set_visible(id, visible) {
                log::warn!("[HiddenScene] Could not restore visibility of {:?}: {}", id, e);
            }
        }
        log::debug!(
            "[HiddenScene] Restored visibility of {} renderables",
            self.restore.len()
        );
    }
}

/// Scene in which exactly one renderable is visible
pub struct IsolatedObject<'b> {
    scene: &'b mut Scene,
    id: ObjectId,
}

impl IsolatedObject<'_> {
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

impl Deref for IsolatedObject<'_> {
    type Target = Scene;

    fn deref(&self) -> &Scene {
        &*self.scene
    }
}

impl Drop for IsolatedObject<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.scene.set_visible(self.id, false) {
            log::warn!("[IsolatedObject] Could not hide {:?}: {}", self.id, e);
        }
    }
}
