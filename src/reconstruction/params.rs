//! Runtime reconstruction parameters

use crate::constants::reconstruction::MAX_CONE_ITERATIONS;
use crate::error::{VxgiError, VxgiResult};
use serde::{Deserialize, Serialize};

/// Which pipeline a frame runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputationMode {
    /// Indirect specular from cone tracing, composited over direct lighting
    #[default]
    Specular,
    /// Debug view of the baked grid
    Voxelization,
}

/// Cone tracing, blur and composite controls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionParameters {
    /// Samples per cone (0..=500)
    pub maximum_iterations: u32,
    /// Distance between cone samples, world units
    pub cone_step: f32,
    /// Distance of the first sample from the surface
    pub cone_offset: f32,
    pub blur_iterations: u32,
    /// Blur tap distance in texels
    pub blur_step: f32,
    pub direct_strength: f32,
    pub indirect_strength: f32,
    /// Reflectivity below this value receives no indirect specular
    pub threshold: f32,
    /// Integer divisor of the indirect target extent
    pub downsample: u32,
}

impl Default for ReconstructionParameters {
    fn default() -> Self {
        Self {
            maximum_iterations: 10,
            cone_step: 0.5,
            cone_offset: 0.1,
            blur_iterations: 0,
            blur_step: 1.0,
            direct_strength: 0.5,
            indirect_strength: 1.0,
            threshold: 0.1,
            downsample: 1,
        }
    }
}

impl ReconstructionParameters {
    pub fn validate(&self) -> VxgiResult<()> {
        if self.maximum_iterations > MAX_CONE_ITERATIONS {
            return Err(VxgiError::invalid_config(
                "reconstruction.maximum_iterations",
                self.maximum_iterations,
                "must not exceed 500",
            ));
        }
        if self.downsample == 0 {
            return Err(VxgiError::invalid_config(
                "reconstruction.downsample",
                self.downsample,
                "must be at least 1",
            ));
        }
        if !(self.cone_step.is_finite() && self.cone_step > 0.0) {
            return Err(VxgiError::invalid_config(
                "reconstruction.cone_step",
                self.cone_step,
                "must be positive",
            ));
        }
        if !(self.blur_step.is_finite() && self.blur_step > 0.0) {
            return Err(VxgiError::invalid_config(
                "reconstruction.blur_step",
                self.blur_step,
                "must be positive",
            ));
        }

        let finite = [
            ("reconstruction.cone_offset", self.cone_offset),
            ("reconstruction.direct_strength", self.direct_strength),
            ("reconstruction.indirect_strength", self.indirect_strength),
            ("reconstruction.threshold", self.threshold),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(VxgiError::invalid_config(field, value, "must be finite"));
            }
        }
        Ok(())
    }
}
