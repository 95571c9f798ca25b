//! Shared immutable configuration
//!
//! A single `VxgiConfig` is built before the bake or the first frame and handed
//! to the capture rig, the voxel grid, the baker and the reconstructor.
//! Changing `voxel_resolution` after a grid is loaded means reloading the grid.

use crate::constants::{artifacts, gpu_limits, grid};
use crate::error::{VxgiError, VxgiResult};
use crate::reconstruction::{ComputationMode, ReconstructionParameters};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directional light used by the capture stations' direct-lighting pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalLight {
    /// Direction the light travels (normalized on use)
    pub direction: Vec3,
    pub color: Vec3,
    pub ambient: Vec3,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.4, -1.0, 0.3),
            color: Vec3::splat(1.0),
            ambient: Vec3::splat(0.15),
        }
    }
}

/// Configuration for bake and runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VxgiConfig {
    /// Voxels per axis (D)
    pub voxel_resolution: u32,
    /// Half-extent of the voxelized cube centred on the origin (B)
    pub world_boundary: f32,
    /// Directory holding bake artifacts
    pub artifact_dir: PathBuf,
    /// Identifier of the baking rig; names the artifact
    pub baker_name: String,
    pub computation: ComputationMode,
    pub reconstruction: ReconstructionParameters,
    pub light: DirectionalLight,
}

impl Default for VxgiConfig {
    fn default() -> Self {
        Self {
            voxel_resolution: grid::DEFAULT_RESOLUTION,
            world_boundary: grid::DEFAULT_WORLD_BOUNDARY,
            artifact_dir: PathBuf::from(artifacts::DEFAULT_DIR),
            baker_name: artifacts::DEFAULT_BAKER_NAME.to_string(),
            computation: ComputationMode::default(),
            reconstruction: ReconstructionParameters::default(),
            light: DirectionalLight::default(),
        }
    }
}

impl VxgiConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> VxgiResult<Self> {
        toml::from_str(text).map_err(|e| VxgiError::InvalidConfig {
            field: "<toml>".to_string(),
            value: String::new(),
            reason: e.to_string(),
        })
    }

    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> VxgiResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| VxgiError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let config = Self::from_toml_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Total number of voxel records (D³)
    pub fn voxel_count(&self) -> usize {
        (self.voxel_resolution as usize).pow(3)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> VxgiResult<()> {
        if self.voxel_resolution == 0 {
            return Err(VxgiError::invalid_config(
                "voxel_resolution",
                self.voxel_resolution,
                "must be greater than 0",
            ));
        }

        let grid_bytes = (self.voxel_resolution as u64).pow(3) * grid::RECORD_SIZE;
        if grid_bytes > gpu_limits::MAX_BUFFER_BINDING_SIZE {
            return Err(VxgiError::invalid_config(
                "voxel_resolution",
                self.voxel_resolution,
                "grid exceeds the storage buffer binding limit",
            ));
        }

        if !self.world_boundary.is_finite() || self.world_boundary <= 0.0 {
            return Err(VxgiError::invalid_config(
                "world_boundary",
                self.world_boundary,
                "must be a positive finite half-extent",
            ));
        }

        if self.baker_name.is_empty() || self.baker_name.contains(['/', '\\']) {
            return Err(VxgiError::invalid_config(
                "baker_name",
                &self.baker_name,
                "must be non-empty and free of path separators",
            ));
        }

        if self.light.direction.length_squared() == 0.0 {
            return Err(VxgiError::invalid_config(
                "light.direction",
                self.light.direction,
                "must be non-zero",
            ));
        }

        self.reconstruction.validate()?;

        log::info!(
            "[VxgiConfig] Validated: resolution={}, boundary={}, grid={}KB, baker='{}', mode={:?}",
            self.voxel_resolution,
            self.world_boundary,
            grid_bytes / 1024,
            self.baker_name,
            self.computation
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(VxgiConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_resolution_rejected() {
        let config = VxgiConfig {
            voxel_resolution: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(VxgiError::InvalidConfig { ref field, .. }) if field == "voxel_resolution"
        ));
    }

    #[test]
    fn test_oversized_grid_rejected() {
        let config = VxgiConfig {
            voxel_resolution: 1024,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_baker_name_with_separator_rejected() {
        let config = VxgiConfig {
            baker_name: "../escape".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = VxgiConfig::from_toml_str(
            r#"
            voxel_resolution = 4
            baker_name = "Bakery"
            computation = "voxelization"

            [reconstruction]
            blur_iterations = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.voxel_resolution, 4);
        assert_eq!(config.baker_name, "Bakery");
        assert_eq!(config.computation, ComputationMode::Voxelization);
        assert_eq!(config.reconstruction.blur_iterations, 2);
        assert_eq!(config.reconstruction.downsample, 1);
        assert_eq!(config.world_boundary, grid::DEFAULT_WORLD_BOUNDARY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = VxgiConfig::load(dir.path().join("missing.toml"));
        assert!(matches!(result, Err(VxgiError::Io { .. })));
    }
}
