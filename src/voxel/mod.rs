/// Voxel Module - the shared bake target and runtime grid
///
/// - voxel_data.rs: packed record encoding and the host-side grid
/// - gpu_grid.rs: device mirror with upload and blocking readback
/// - kernel.rs: the voxelize pass (host implementation and compute pipeline)

pub mod gpu_grid;
pub mod kernel;
pub mod voxel_data;

pub use gpu_grid::GpuVoxelGrid;
pub use kernel::{voxelize_capture, VoxelizeKernel, VoxelizeParams};
pub use voxel_data::{VoxelGrid, VoxelRecord};
