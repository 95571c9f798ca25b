/// Capture Module - six axial orthographic stations around the grid
///
/// - capture_data.rs: station directions, cameras, texel rays and the light model
/// - software_rig.rs: host rig that ray-casts texel centres
/// - gpu_rig.rs: wgpu rig rendering direct colour and world position targets

pub mod capture_data;
pub mod gpu_rig;
pub mod software_rig;

pub use capture_data::{shade, CaptureDirection, CaptureImages};
pub use gpu_rig::{CaptureUniforms, CaptureVertex, GpuCaptureRig, GpuCaptureStation};
pub use software_rig::{SoftwareCaptureRig, SoftwareCaptureStation};
