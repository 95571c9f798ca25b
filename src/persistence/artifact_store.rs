//! Bake artifact store
//!
//! Artifacts live at `<root>/<id>.txt`. Writes go to a sibling temporary
//! file that is renamed over the target, so readers only ever see a
//! complete previous artifact or a complete new one.

use super::{ArtifactError, ArtifactResult};
use crate::constants::artifacts::EXTENSION;
use crate::error::VxgiError;
use crate::voxel::{VoxelGrid, VoxelRecord};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Directory of baked voxel grids
#[derive(Debug, Clone)]
pub struct BakeArtifactStore {
    root: PathBuf,
}

impl BakeArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Artifact path for `id`
    pub fn path_for(&self, id: &str) -> ArtifactResult<PathBuf> {
        validate_id(id)?;
        Ok(self.root.join(format!("{}.{}", id, EXTENSION)))
    }

    pub fn exists(&self, id: &str) -> ArtifactResult<bool> {
        Ok(self.path_for(id)?.is_file())
    }

    /// Serialize `grid` under `id`, replacing any previous artifact
    pub fn write(&self, id: &str, grid: &VoxelGrid) -> ArtifactResult<PathBuf> {
        let start = Instant::now();
        let path = self.path_for(id)?;
        let temp_path = path.with_extension(format!("{}.tmp", EXTENSION));
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| ArtifactError::Io { path, source }
        };

        fs::create_dir_all(&self.root).map_err(io_err(&self.root))?;

        let result = (|| {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            for record in grid.records() {
                writeln!(writer, "{}", record.to_artifact_int())?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()
        })();

        if let Err(source) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(ArtifactError::Io {
                path: temp_path,
                source,
            });
        }

        fs::rename(&temp_path, &path).map_err(io_err(&path))?;

        log::info!(
            "[BakeArtifactStore] Wrote '{}' ({} records) to {} in {:?}",
            id,
            grid.len(),
            path.display(),
            start.elapsed()
        );
        Ok(path)
    }

    /// Parse the artifact `id` into a grid of `resolution³` records
    ///
    /// Either returns a complete grid or an error; a partially parsed grid
    /// never escapes.
    pub fn read(&self, id: &str, resolution: u32, world_boundary: f32) -> ArtifactResult<VoxelGrid> {
        let start = Instant::now();
        let path = self.path_for(id)?;
        let empty =
            VoxelGrid::allocate(resolution, world_boundary).map_err(|e| invalid_grid(id, e))?;
        if !path.is_file() {
            return Err(ArtifactError::NotFound {
                artifact: id.to_string(),
                path,
            });
        }

        let text = fs::read_to_string(&path).map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;

        let mut lines: Vec<&str> = text.lines().collect();
        if lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }

        let records = lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let value = line.trim();
                value
                    .parse::<i32>()
                    .map(VoxelRecord::from_artifact_int)
                    .map_err(|_| ArtifactError::Format {
                        artifact: id.to_string(),
                        line: i + 1,
                        value: value.to_string(),
                    })
            })
            .collect::<ArtifactResult<Vec<_>>>()?;

        let expected = empty.len();
        if records.len() != expected {
            return Err(ArtifactError::SizeMismatch {
                artifact: id.to_string(),
                expected,
                found: records.len(),
            });
        }

        let grid = VoxelGrid::from_records(resolution, world_boundary, records)
            .map_err(|e| invalid_grid(id, e))?;

        log::info!(
            "[BakeArtifactStore] Read '{}' ({} records, {} occupied) in {:?}",
            id,
            grid.len(),
            grid.occupied_count(),
            start.elapsed()
        );
        Ok(grid)
    }

    /// Delete the artifact; returns whether one existed
    pub fn remove(&self, id: &str) -> ArtifactResult<bool> {
        let path = self.path_for(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ArtifactError::Io { path, source }),
        }
    }
}

fn validate_id(id: &str) -> ArtifactResult<()> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\', '\0']) {
        return Err(ArtifactError::InvalidName {
            artifact: id.to_string(),
        });
    }
    Ok(())
}

fn invalid_grid(id: &str, error: VxgiError) -> ArtifactError {
    match error {
        VxgiError::InvalidConfig {
            field,
            value,
            reason,
        } => ArtifactError::InvalidGrid {
            artifact: id.to_string(),
            field,
            value,
            reason,
        },
        other => ArtifactError::InvalidGrid {
            artifact: id.to_string(),
            field: "grid".to_string(),
            value: String::new(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{UVec3, Vec3};
    use rand::{Rng, SeedableRng};

    fn random_grid(resolution: u32, seed: u64) -> VoxelGrid {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut grid = VoxelGrid::allocate(resolution, 10.0).unwrap();
        for i in 0..grid.len() {
            if rng.gen_bool(0.3) {
                let color = Vec3::new(rng.gen(), rng.gen(), rng.gen());
                grid.set(grid.cell_of_index(i), VoxelRecord::from_color(color));
            }
        }
        grid
    }

    #[test]
    fn test_write_then_read_preserves_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = BakeArtifactStore::new(dir.path());
        for (seed, d) in [1u32, 2, 8, 32].into_iter().enumerate() {
            let grid = random_grid(d, seed as u64);
            store.write("Reflection Baker", &grid).unwrap();
            let loaded = store.read("Reflection Baker", d, 10.0).unwrap();
            assert_eq!(loaded, grid, "resolution {}", d);
        }
    }

    #[test]
    fn test_artifact_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = BakeArtifactStore::new(dir.path());
        let mut grid = VoxelGrid::allocate(2, 1.0).unwrap();
        grid.set(UVec3::new(1, 0, 0), VoxelRecord::from_color(Vec3::new(1.0, 0.0, 0.0)));

        let path = store.write("baker", &grid).unwrap();
        assert_eq!(path, dir.path().join("baker.txt"));
        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "0");
        assert_eq!(lines[1], (255 | (1 << 24)).to_string());
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_short_artifact_is_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let text = "0\n".repeat(60);
        std::fs::write(dir.path().join("baker.txt"), text).unwrap();
        let store = BakeArtifactStore::new(dir.path());
        let result = store.read("baker", 4, 10.0);
        assert!(matches!(
            result,
            Err(ArtifactError::SizeMismatch {
                expected: 64,
                found: 60,
                ..
            })
        ));
    }

    #[test]
    fn test_long_artifact_is_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("baker.txt"), "0\n".repeat(70)).unwrap();
        let store = BakeArtifactStore::new(dir.path());
        assert!(matches!(
            store.read("baker", 4, 10.0),
            Err(ArtifactError::SizeMismatch {
                expected: 64,
                found: 70,
                ..
            })
        ));
    }

    #[test]
    fn test_zero_resolution_is_invalid_grid() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("baker.txt"), "").unwrap();
        let store = BakeArtifactStore::new(dir.path());
        let err = store.read("baker", 0, 10.0).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::InvalidGrid { ref field, .. } if field == "voxel_resolution"
        ));
        assert!(matches!(
            VxgiError::from(err),
            VxgiError::InvalidConfig { ref field, .. } if field == "voxel_resolution"
        ));

        assert!(matches!(
            store.read("baker", 4, f32::NAN),
            Err(ArtifactError::InvalidGrid { ref field, .. }) if field == "world_boundary"
        ));
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("baker.txt"), "0\n0\nabc\n0\n0\n0\n0\n0\n").unwrap();
        let store = BakeArtifactStore::new(dir.path());
        match store.read("baker", 2, 1.0) {
            Err(ArtifactError::Format { line, value, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_trailing_blank_line_and_whitespace_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("baker.txt"), " 16777216 \r\n0\n\n").unwrap();
        let store = BakeArtifactStore::new(dir.path());
        let err = store.read("baker", 1, 1.0).unwrap_err();
        // Two records for a single-cell grid
        assert!(matches!(err, ArtifactError::SizeMismatch { found: 2, .. }));

        std::fs::write(dir.path().join("baker.txt"), " 16777216 \r\n\n").unwrap();
        let grid = store.read("baker", 1, 1.0).unwrap();
        assert!(grid.records()[0].is_occupied());
    }

    #[test]
    fn test_negative_records_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = BakeArtifactStore::new(dir.path());
        let grid = VoxelGrid::from_records(1, 1.0, vec![VoxelRecord(0x8000_0001)]).unwrap();
        store.write("baker", &grid).unwrap();
        let text = std::fs::read_to_string(store.path_for("baker").unwrap()).unwrap();
        assert!(text.starts_with('-'));
        assert_eq!(store.read("baker", 1, 1.0).unwrap(), grid);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = BakeArtifactStore::new(dir.path());
        assert!(!store.exists("baker").unwrap());
        assert!(matches!(
            store.read("baker", 4, 10.0),
            Err(ArtifactError::NotFound { .. })
        ));
        assert!(!store.remove("baker").unwrap());
    }

    #[test]
    fn test_overwrite_replaces_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = BakeArtifactStore::new(dir.path());
        store.write("baker", &random_grid(4, 1)).unwrap();
        let second = random_grid(4, 2);
        store.write("baker", &second).unwrap();
        assert_eq!(store.read("baker", 4, 10.0).unwrap(), second);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
        assert!(store.remove("baker").unwrap());
        assert!(!store.exists("baker").unwrap());
    }

    #[test]
    fn test_invalid_ids_rejected() {
        let store = BakeArtifactStore::new("unused");
        for id in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(store.path_for(id), Err(ArtifactError::InvalidName { .. })));
        }
    }
}
