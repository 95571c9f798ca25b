//! Runtime grid loading

use crate::config::VxgiConfig;
use crate::error::VxgiResult;
use crate::persistence::BakeArtifactStore;
use crate::voxel::VoxelGrid;

/// Load the artifact named by `config.baker_name` at the configured resolution
///
/// The artifact carries no dimension, so a resolution that differs from the
/// bake surfaces as a size mismatch here rather than as a misaligned grid.
pub fn load_runtime_grid(config: &VxgiConfig) -> VxgiResult<VoxelGrid> {
    let store = BakeArtifactStore::new(&config.artifact_dir);
    let grid = store.read(
        &config.baker_name,
        config.voxel_resolution,
        config.world_boundary,
    )?;
    log::info!(
        "[Runtime] Loaded '{}': {}^3 grid, {} occupied cells",
        config.baker_name,
        grid.resolution(),
        grid.occupied_count()
    );
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VxgiError;
    use crate::voxel::VoxelRecord;
    use glam::{UVec3, Vec3};

    #[test]
    fn test_load_baked_grid() {
        let dir = tempfile::tempdir().unwrap();
        let config = VxgiConfig {
            voxel_resolution: 4,
            artifact_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let mut grid = VoxelGrid::allocate(4, config.world_boundary).unwrap();
        grid.set(UVec3::new(1, 2, 3), VoxelRecord::from_color(Vec3::Y));
        BakeArtifactStore::new(dir.path())
            .write(&config.baker_name, &grid)
            .unwrap();

        assert_eq!(load_runtime_grid(&config).unwrap(), grid);
    }

    #[test]
    fn test_resolution_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let grid = VoxelGrid::allocate(4, 10.0).unwrap();
        BakeArtifactStore::new(dir.path())
            .write("Reflection Baker", &grid)
            .unwrap();

        let config = VxgiConfig {
            voxel_resolution: 8,
            artifact_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(matches!(
            load_runtime_grid(&config),
            Err(VxgiError::SizeMismatch {
                expected: 512,
                found: 64,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_artifact_is_precondition() {
        let dir = tempfile::tempdir().unwrap();
        let config = VxgiConfig {
            artifact_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(matches!(
            load_runtime_grid(&config),
            Err(VxgiError::Precondition { .. })
        ));
    }
}
