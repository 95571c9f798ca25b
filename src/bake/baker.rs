//! Reflection baker
//!
//! `bake` is the single entry point of the offline pipeline: zeroed grid,
//! initialized stations, per-object voxelization, one readback, one artifact.
//! A failed bake leaves the previous artifact untouched.

use super::backend::{BakeBackend, StationLease};
use super::voxelizer::PerObjectVoxelizer;
use crate::config::VxgiConfig;
use crate::error::VxgiResult;
use crate::persistence::BakeArtifactStore;
use crate::scene::Scene;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Summary of a finished bake
#[derive(Debug, Clone, PartialEq)]
pub struct BakeReport {
    pub artifact_path: PathBuf,
    pub objects_voxelized: usize,
    pub occupied_cells: usize,
    pub elapsed: Duration,
}

/// Offline bake driver over any backend
pub struct ReflectionBaker<B: BakeBackend> {
    config: VxgiConfig,
    backend: B,
    store: BakeArtifactStore,
}

impl<B: BakeBackend> ReflectionBaker<B> {
    pub fn new(config: VxgiConfig, backend: B) -> VxgiResult<Self> {
        config.validate()?;
        let store = BakeArtifactStore::new(&config.artifact_dir);
        Ok(Self {
            config,
            backend,
            store,
        })
    }

    pub fn config(&self) -> &VxgiConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &BakeArtifactStore {
        &self.store
    }

    /// Voxelize the static scene and write the artifact named by `baker_name`
    pub fn bake(&mut self, scene: &mut Scene) -> VxgiResult<BakeReport> {
        let start = Instant::now();
        log::info!(
            "[ReflectionBaker] Baking '{}' at {}^3 over [-{b}, {b}]^3 ({} backend)",
            self.config.baker_name,
            self.config.voxel_resolution,
            self.backend.name(),
            b = self.config.world_boundary
        );

        self.backend.allocate_grid(&self.config)?;

        let voxelization = {
            let mut lease = StationLease::initialize(&mut self.backend, &self.config)?;
            PerObjectVoxelizer::voxelize(&mut *lease, scene)?
        };

        let grid = self.backend.download_grid()?;
        let artifact_path = self.store.write(&self.config.baker_name, &grid)?;

        let report = BakeReport {
            artifact_path,
            objects_voxelized: voxelization.objects,
            occupied_cells: grid.occupied_count(),
            elapsed: start.elapsed(),
        };
        log::info!(
            "[ReflectionBaker] Baked {} objects into {} occupied cells in {:?}",
            report.objects_voxelized,
            report.occupied_cells,
            report.elapsed
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bake::SoftwareBakeBackend;
    use crate::capture::{shade, CaptureDirection};
    use crate::error::VxgiError;
    use crate::scene::{MeshData, ObjectDesc};
    use crate::voxel::{VoxelGrid, VoxelRecord};
    use glam::{UVec3, Vec3};

    fn config(dir: &std::path::Path, resolution: u32) -> VxgiConfig {
        VxgiConfig {
            voxel_resolution: resolution,
            world_boundary: 10.0,
            artifact_dir: dir.to_path_buf(),
            baker_name: "Reflection Baker".to_string(),
            ..Default::default()
        }
    }

    fn static_cube(name: &str, min: Vec3, max: Vec3) -> ObjectDesc {
        ObjectDesc::new(name, MeshData::cuboid(min, max)).static_geometry()
    }

    fn bake_grid(dir: &std::path::Path, resolution: u32, scene: &mut Scene) -> VoxelGrid {
        let mut baker =
            ReflectionBaker::new(config(dir, resolution), SoftwareBakeBackend::new()).unwrap();
        baker.bake(scene).unwrap();
        baker
            .store()
            .read("Reflection Baker", resolution, 10.0)
            .unwrap()
    }

    /// Wraps the host backend and fails the n-th capture
    struct FailingBackend {
        inner: SoftwareBakeBackend,
        fail_at: usize,
        captures: usize,
        releases: usize,
    }

    impl BakeBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }
        fn allocate_grid(&mut self, config: &VxgiConfig) -> VxgiResult<()> {
            self.inner.allocate_grid(config)
        }
        fn initialize_stations(&mut self, config: &VxgiConfig) -> VxgiResult<()> {
            self.inner.initialize_stations(config)
        }
        fn station_initialized(&self, direction: CaptureDirection) -> bool {
            self.inner.station_initialized(direction)
        }
        fn capture(&mut self, direction: CaptureDirection, scene: &Scene) -> VxgiResult<()> {
            self.captures += 1;
            if self.captures == self.fail_at {
                return Err(VxgiError::gpu("capture", "device lost"));
            }
            self.inner.capture(direction, scene)
        }
        fn dispatch_voxelization(&mut self, direction: CaptureDirection) -> VxgiResult<()> {
            self.inner.dispatch_voxelization(direction)
        }
        fn download_grid(&mut self) -> VxgiResult<VoxelGrid> {
            self.inner.download_grid()
        }
        fn release_stations(&mut self) {
            self.releases += 1;
            self.inner.release_stations()
        }
    }

    #[test]
    fn test_cube_scenario_single_cell() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = Scene::new();
        scene.add_object(static_cube("Cube", Vec3::splat(0.5), Vec3::splat(4.5)));

        let mut baker = ReflectionBaker::new(config(dir.path(), 4), SoftwareBakeBackend::new()).unwrap();
        let report = baker.bake(&mut scene).unwrap();
        assert_eq!(report.objects_voxelized, 1);
        assert_eq!(report.occupied_cells, 1);

        let text = std::fs::read_to_string(&report.artifact_path).unwrap();
        assert_eq!(text.lines().count(), 64);

        let grid = baker.store().read("Reflection Baker", 4, 10.0).unwrap();
        assert_eq!(grid.occupied_cells(), vec![UVec3::splat(2)]);
    }

    #[test]
    fn test_large_cube_fills_eight_cells() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = Scene::new();
        scene.add_object(static_cube("Cube", Vec3::splat(0.5), Vec3::splat(9.5)));
        let grid = bake_grid(dir.path(), 4, &mut scene);

        let mut cells = grid.occupied_cells();
        cells.sort_by_key(|c| (c.x, c.y, c.z));
        let mut expected = Vec::new();
        for x in 2..4 {
            for y in 2..4 {
                for z in 2..4 {
                    expected.push(UVec3::new(x, y, z));
                }
            }
        }
        assert_eq!(cells, expected);
    }

    #[test]
    fn test_rebake_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = Scene::new();
        scene.add_object(
            static_cube("Red", Vec3::splat(-8.0), Vec3::splat(-1.0)).with_color(Vec3::X),
        );
        scene.add_object(static_cube("Blue", Vec3::splat(1.0), Vec3::splat(7.0)).with_color(Vec3::Z));

        let mut baker = ReflectionBaker::new(config(dir.path(), 8), SoftwareBakeBackend::new()).unwrap();
        let first = baker.bake(&mut scene).unwrap();
        let first_text = std::fs::read_to_string(&first.artifact_path).unwrap();
        let second = baker.bake(&mut scene).unwrap();
        let second_text = std::fs::read_to_string(&second.artifact_path).unwrap();
        assert_eq!(first_text, second_text);
        assert!(first.occupied_cells > 0);
    }

    #[test]
    fn test_objects_do_not_occlude_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let front = || static_cube("Front", Vec3::new(0.5, 0.5, -9.5), Vec3::new(4.5, 4.5, -5.5));
        let back = || static_cube("Back", Vec3::splat(0.5), Vec3::splat(4.5));

        let mut both = Scene::new();
        both.add_object(front());
        both.add_object(back());
        let combined = bake_grid(dir.path(), 4, &mut both);

        let mut alone = Scene::new();
        alone.add_object(back());
        let back_only = bake_grid(dir.path(), 4, &mut alone);

        for cell in back_only.occupied_cells() {
            assert_eq!(combined.get(cell), back_only.get(cell));
        }
        assert_eq!(combined.occupied_count(), 2);
    }

    #[test]
    fn test_last_station_decides_shared_cell() {
        // Every face of the cube lands in cell (2, 2, 2); Bottom is captured last
        let dir = tempfile::tempdir().unwrap();
        let mut scene = Scene::new();
        scene.add_object(static_cube("Cube", Vec3::splat(0.5), Vec3::splat(4.5)));
        let grid = bake_grid(dir.path(), 4, &mut scene);

        let light = config(dir.path(), 4).light;
        let bottom = VoxelRecord::from_color(shade(Vec3::ONE, Vec3::NEG_Y, &light));
        let top = VoxelRecord::from_color(shade(Vec3::ONE, Vec3::Y, &light));
        assert_ne!(bottom, top);
        assert_eq!(grid.get(UVec3::splat(2)), Some(bottom));
    }

    #[test]
    fn test_combined_bake_equals_ordered_merge_of_single_bakes() {
        let dir = tempfile::tempdir().unwrap();
        let objects = || {
            [
                static_cube("Front", Vec3::new(0.5, 0.5, -9.5), Vec3::new(4.5, 4.5, -5.5))
                    .with_color(Vec3::X),
                static_cube("Outer", Vec3::splat(0.5), Vec3::splat(9.5)).with_color(Vec3::Y),
                // Inside Outer: hidden from every station when both are visible
                static_cube("Inner", Vec3::splat(1.0), Vec3::splat(4.0)).with_color(Vec3::Z),
            ]
        };

        let mut all = Scene::new();
        for desc in objects() {
            all.add_object(desc);
        }
        let combined = bake_grid(dir.path(), 4, &mut all);

        let mut merged = VoxelGrid::allocate(4, 10.0).unwrap();
        for desc in objects() {
            let mut single = Scene::new();
            single.add_object(desc);
            let grid = bake_grid(dir.path(), 4, &mut single);
            for cell in grid.occupied_cells() {
                merged.set(cell, grid.get(cell).unwrap());
            }
        }

        assert_eq!(combined, merged);
        let inner = combined.get(UVec3::splat(2)).unwrap().color();
        assert_eq!((inner.x, inner.y), (0.0, 0.0));
        assert!(inner.z > 0.0);
    }

    #[test]
    fn test_consecutive_bakes_of_different_scenes() {
        let dir = tempfile::tempdir().unwrap();
        let mut baker = ReflectionBaker::new(config(dir.path(), 4), SoftwareBakeBackend::new()).unwrap();

        let mut first = Scene::new();
        first.add_object(
            static_cube("Cube", Vec3::splat(-9.5), Vec3::splat(-5.5)).with_color(Vec3::X),
        );
        baker.bake(&mut first).unwrap();

        let mut second = Scene::new();
        second.add_object(static_cube("Cube", Vec3::splat(5.5), Vec3::splat(9.5)).with_color(Vec3::Z));
        baker.bake(&mut second).unwrap();

        let grid = baker.store().read("Reflection Baker", 4, 10.0).unwrap();
        assert_eq!(grid.occupied_cells(), vec![UVec3::splat(3)]);
        let color = grid.get(UVec3::splat(3)).unwrap().color();
        assert_eq!(color.x, 0.0);
        assert!(color.z > 0.0);
    }

    #[test]
    fn test_dynamic_and_hidden_objects_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = Scene::new();
        let dynamic = scene.add_object(ObjectDesc::new("Dynamic", MeshData::cube(Vec3::ZERO, 2.0)));
        let hidden = scene.add_object(static_cube("Hidden", Vec3::splat(0.5), Vec3::splat(4.5)).hidden());

        let grid = bake_grid(dir.path(), 4, &mut scene);
        assert_eq!(grid.occupied_count(), 0);
        assert_eq!(scene.is_visible(dynamic), Some(true));
        assert_eq!(scene.is_visible(hidden), Some(false));
    }

    #[test]
    fn test_empty_scene_writes_empty_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let grid = bake_grid(dir.path(), 1, &mut Scene::new());
        assert_eq!(grid.len(), 1);
        assert_eq!(grid.occupied_count(), 0);
    }

    #[test]
    fn test_single_cell_grid() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = Scene::new();
        scene.add_object(static_cube("Cube", Vec3::splat(-5.0), Vec3::splat(5.0)));
        let grid = bake_grid(dir.path(), 1, &mut scene);
        assert!(grid.records()[0].is_occupied());
    }

    #[test]
    fn test_failure_restores_visibility_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = Scene::new();
        scene.add_object(static_cube("A", Vec3::splat(-8.0), Vec3::splat(-1.0)));
        scene.add_object(static_cube("B", Vec3::splat(1.0), Vec3::splat(7.0)));
        scene.add_object(ObjectDesc::new("Dynamic", MeshData::cube(Vec3::ZERO, 0.5)));
        let before = scene.visibility_snapshot();

        let backend = FailingBackend {
            inner: SoftwareBakeBackend::new(),
            fail_at: 9,
            captures: 0,
            releases: 0,
        };
        let mut baker = ReflectionBaker::new(config(dir.path(), 4), backend).unwrap();
        let err = baker.bake(&mut scene).unwrap_err();

        match err {
            VxgiError::BakeStep { object, station, .. } => {
                assert_eq!(object, "B");
                assert_eq!(station, "Left Camera");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(scene.visibility_snapshot(), before);
        assert!(!baker.store().exists("Reflection Baker").unwrap());
        assert_eq!(baker.backend().releases, 1);
        assert!(!baker.backend().station_initialized(CaptureDirection::Front));
    }

    #[test]
    fn test_uninitialized_stations_fail_fast() {
        let mut backend = SoftwareBakeBackend::new();
        let mut scene = Scene::new();
        scene.add_object(static_cube("Cube", Vec3::splat(0.5), Vec3::splat(4.5)));
        let before = scene.visibility_snapshot();

        let err = PerObjectVoxelizer::voxelize(&mut backend, &mut scene).unwrap_err();
        assert!(matches!(err, VxgiError::Precondition { ref component, .. } if component == "Front Camera"));
        assert_eq!(scene.visibility_snapshot(), before);
    }
}
