//! Voxel global illumination reflections
//!
//! Two phases share one `VxgiConfig` and one grid layout:
//!
//! - Bake: six axial orthographic capture stations render each static object
//!   in isolation; a voxelize pass writes every covered texel into a
//!   `D × D × D` grid of packed RGB records, which is persisted as a flat text
//!   artifact named after the baker.
//! - Runtime: the artifact is loaded once and a chain of full-screen passes
//!   cone-traces the grid along the reflected view ray of every reflective
//!   pixel, blurs the result and composites it over the direct frame.
//!
//! Both phases have a host implementation and a wgpu implementation behind the
//! same contracts, so the whole pipeline runs in tests without a GPU.

pub mod bake;
pub mod capture;
pub mod config;
pub mod constants;
pub mod error;
pub mod gpu;
pub mod mask;
pub mod persistence;
pub mod reconstruction;
pub mod scene;
pub mod voxel;

pub use bake::{
    BakeBackend, BakeReport, GpuBakeBackend, PerObjectVoxelizer, ReflectionBaker,
    SoftwareBakeBackend,
};
pub use capture::{CaptureDirection, CaptureImages};
pub use config::{DirectionalLight, VxgiConfig};
pub use error::{OptionExt, VxgiError, VxgiResult};
pub use gpu::GpuContext;
pub use mask::{HostReflectivityMask, ReflectivityMask};
pub use persistence::{ArtifactError, BakeArtifactStore};
pub use reconstruction::{
    load_runtime_grid, ComputationMode, ConeTracingReconstructor, FrameCamera, HostGBuffer,
    HostImage, ReconstructionParameters, SoftwareReconstructor,
};
pub use scene::{MeshData, ObjectDesc, ObjectId, Scene};
pub use voxel::{VoxelGrid, VoxelRecord};

// Re-export wgpu for callers that drive the GPU path themselves
pub use wgpu;
