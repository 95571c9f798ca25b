//! Per-frame pass scheduling
//!
//! A frame is a short list of full-screen passes between four image slots.
//! The GPU and host reconstructors both execute the same plan.

use super::params::{ComputationMode, ReconstructionParameters};
use crate::error::{VxgiError, VxgiResult};

/// The five shader passes, numbered as in the reconstruction shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FramePass {
    IndirectSpecular = 0,
    Composite = 1,
    BlurHorizontal = 2,
    BlurVertical = 3,
    VoxelDebug = 4,
}

impl FramePass {
    pub const ALL: [FramePass; 5] = [
        FramePass::IndirectSpecular,
        FramePass::Composite,
        FramePass::BlurHorizontal,
        FramePass::BlurVertical,
        FramePass::VoxelDebug,
    ];

    pub fn index(self) -> u32 {
        self as u32
    }

    /// Fragment entry point in the reconstruction shader
    pub fn entry_point(self) -> &'static str {
        match self {
            FramePass::IndirectSpecular => "fs_indirect_specular",
            FramePass::Composite => "fs_composite",
            FramePass::BlurHorizontal => "fs_blur_horizontal",
            FramePass::BlurVertical => "fs_blur_vertical",
            FramePass::VoxelDebug => "fs_voxel_debug",
        }
    }
}

/// Image slots a pass reads from and writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The frame's lit colour
    Source,
    /// The image presented after the effect
    Destination,
    TempA,
    TempB,
}

/// One scheduled pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassStep {
    pub pass: FramePass,
    pub input: Slot,
    pub output: Slot,
}

impl PassStep {
    fn new(pass: FramePass, input: Slot, output: Slot) -> Self {
        Self { pass, input, output }
    }
}

/// Ordered passes of one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlan {
    pub steps: Vec<PassStep>,
    pub extent: (u32, u32),
    /// Extent of `TempA`/`TempB`; `None` when the plan uses no temporaries
    pub temp_extent: Option<(u32, u32)>,
    /// `false` when the composite runs without indirect light
    pub indirect_enabled: bool,
}

impl FramePlan {
    /// Fallback plan: composite with the indirect contribution disabled
    pub fn direct_only(width: u32, height: u32) -> Self {
        Self {
            steps: vec![PassStep::new(FramePass::Composite, Slot::Source, Slot::Destination)],
            extent: (width, height),
            temp_extent: None,
            indirect_enabled: false,
        }
    }

    pub fn passes(&self) -> impl Iterator<Item = FramePass> + '_ {
        self.steps.iter().map(|s| s.pass)
    }
}

/// Schedule the passes of one frame
///
/// Specular: indirect into `TempA` at `(w / downsample, h / downsample)`,
/// then `blur_iterations` horizontal/vertical pairs bouncing through
/// `TempB`, then the composite of `Source` and `TempA` into `Destination`.
/// Voxelization: the debug pass alone.
pub fn plan_frame(
    mode: ComputationMode,
    params: &ReconstructionParameters,
    width: u32,
    height: u32,
) -> VxgiResult<FramePlan> {
    if width == 0 || height == 0 {
        return Err(VxgiError::InvalidFrame {
            reason: format!("frame extent {}x{} is empty", width, height),
        });
    }

    match mode {
        ComputationMode::Voxelization => Ok(FramePlan {
            steps: vec![PassStep::new(FramePass::VoxelDebug, Slot::Source, Slot::Destination)],
            extent: (width, height),
            temp_extent: None,
            indirect_enabled: false,
        }),
        ComputationMode::Specular => {
            if params.downsample == 0 {
                return Err(VxgiError::InvalidFrame {
                    reason: "downsample factor is 0".to_string(),
                });
            }
            let temp = (width / params.downsample, height / params.downsample);
            if temp.0 == 0 || temp.1 == 0 {
                return Err(VxgiError::InvalidFrame {
                    reason: format!(
                        "downsample {} leaves an empty {}x{} indirect target for a {}x{} frame",
                        params.downsample, temp.0, temp.1, width, height
                    ),
                });
            }

            let mut steps = Vec::with_capacity(2 + 2 * params.blur_iterations as usize);
            steps.push(PassStep::new(FramePass::IndirectSpecular, Slot::Source, Slot::TempA));
            for _ in 0..params.blur_iterations {
                steps.push(PassStep::new(FramePass::BlurHorizontal, Slot::TempA, Slot::TempB));
                steps.push(PassStep::new(FramePass::BlurVertical, Slot::TempB, Slot::TempA));
            }
            steps.push(PassStep::new(FramePass::Composite, Slot::TempA, Slot::Destination));

            Ok(FramePlan {
                steps,
                extent: (width, height),
                temp_extent: Some(temp),
                indirect_enabled: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_indices_are_fixed() {
        let indices: Vec<u32> = FramePass::ALL.iter().map(|p| p.index()).collect();
        assert_eq!(indices, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_specular_plan_with_blur() {
        let params = ReconstructionParameters {
            blur_iterations: 2,
            downsample: 2,
            ..Default::default()
        };
        let plan = plan_frame(ComputationMode::Specular, &params, 1920, 1080).unwrap();
        let passes: Vec<u32> = plan.passes().map(FramePass::index).collect();
        assert_eq!(passes, [0, 2, 3, 2, 3, 1]);
        assert_eq!(plan.temp_extent, Some((960, 540)));
        assert_eq!(plan.steps.last().unwrap().input, Slot::TempA);
        assert!(plan.indirect_enabled);
    }

    #[test]
    fn test_specular_plan_without_blur() {
        let plan = plan_frame(
            ComputationMode::Specular,
            &ReconstructionParameters::default(),
            64,
            48,
        )
        .unwrap();
        let passes: Vec<u32> = plan.passes().map(FramePass::index).collect();
        assert_eq!(passes, [0, 1]);
        assert_eq!(plan.temp_extent, Some((64, 48)));
    }

    #[test]
    fn test_voxelization_plan() {
        let plan = plan_frame(
            ComputationMode::Voxelization,
            &ReconstructionParameters::default(),
            4,
            4,
        )
        .unwrap();
        assert_eq!(plan.passes().collect::<Vec<_>>(), [FramePass::VoxelDebug]);
        assert_eq!(plan.temp_extent, None);
    }

    #[test]
    fn test_downsample_larger_than_frame_is_invalid() {
        let params = ReconstructionParameters {
            downsample: 8,
            ..Default::default()
        };
        let result = plan_frame(ComputationMode::Specular, &params, 4, 64);
        assert!(matches!(result, Err(VxgiError::InvalidFrame { .. })));
    }

    #[test]
    fn test_direct_only_fallback() {
        let plan = FramePlan::direct_only(8, 8);
        assert_eq!(plan.passes().collect::<Vec<_>>(), [FramePass::Composite]);
        assert!(!plan.indirect_enabled);
    }
}
