/// Reconstruction Module - per-frame indirect specular from the baked grid
///
/// - params.rs: computation mode and the tunable cone parameters
/// - frame_plan.rs: pass scheduling for one frame
/// - cone_tracing.rs: camera reconstruction, cone march and composite math
/// - target_pool.rs: temporaries borrowed per frame and returned on drop
/// - software.rs: host reconstructor executing a frame plan on images
/// - gpu_reconstructor.rs: wgpu full-screen passes executing the same plan
/// - runtime.rs: loading the baked artifact at startup

pub mod cone_tracing;
pub mod frame_plan;
pub mod gpu_reconstructor;
pub mod params;
pub mod runtime;
pub mod software;
pub mod target_pool;

pub use cone_tracing::{
    attenuation, composite, indirect_specular, march_voxel_debug, reconstruct_world_position,
    trace_specular_cone, FrameCamera,
};
pub use frame_plan::{plan_frame, FramePass, FramePlan, PassStep, Slot};
pub use gpu_reconstructor::{
    ConeTracingReconstructor, FrameInputs, GpuGBuffer, ReconstructionUniforms,
};
pub use params::{ComputationMode, ReconstructionParameters};
pub use runtime::load_runtime_grid;
pub use software::{box_blur, HostGBuffer, HostImage, SoftwareReconstructor};
pub use target_pool::{PooledTarget, TargetPool};
