/// Bake Module - offline voxelization of the static scene
///
/// - backend.rs: the `BakeBackend` seam and the scoped station lease
/// - software_backend.rs: host capture, host voxelize pass, host grid
/// - gpu_backend.rs: wgpu capture rig, voxelize compute kernel, device grid
/// - voxelizer.rs: per-object capture and dispatch loop
/// - baker.rs: the bake entry point that writes the artifact

pub mod backend;
pub mod baker;
pub mod gpu_backend;
pub mod software_backend;
pub mod voxelizer;

pub use backend::{BakeBackend, StationLease};
pub use baker::{BakeReport, ReflectionBaker};
pub use gpu_backend::GpuBakeBackend;
pub use software_backend::SoftwareBakeBackend;
pub use voxelizer::{PerObjectVoxelizer, VoxelizationReport};
