//! Constants shared by the bake and the runtime passes

/// Voxel grid defaults
pub mod grid {
    /// Default voxels per axis
    pub const DEFAULT_RESOLUTION: u32 = 64;

    /// Default half-extent of the voxelized cube (world units)
    pub const DEFAULT_WORLD_BOUNDARY: f32 = 10.0;

    /// Bytes per packed voxel record
    pub const RECORD_SIZE: u64 = 4;
}

/// GPU limits the grid has to respect
pub mod gpu_limits {
    /// Conservative storage buffer binding limit (wgpu default limits)
    pub const MAX_BUFFER_BINDING_SIZE: u64 = 128 * 1024 * 1024;
}

/// Capture rig
pub mod capture {
    /// Number of axial capture stations
    pub const STATION_COUNT: usize = 6;

    /// Format of the direct-lit colour and world-position targets
    pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Position texels below this alpha carry no geometry
    pub const COVERAGE_THRESHOLD: f32 = 0.5;
}

/// Runtime reconstruction
pub mod reconstruction {
    /// Upper bound of the cone iteration slider
    pub const MAX_CONE_ITERATIONS: u32 = 500;

    /// Format of the indirect specular temporaries
    pub const TEMPORARY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

    /// Format of the reflectivity mask target
    pub const MASK_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
}

/// Artifact storage
pub mod artifacts {
    /// Fixed asset directory holding baked grids
    pub const DEFAULT_DIR: &str = "assets/resources";

    pub const EXTENSION: &str = "txt";

    pub const DEFAULT_BAKER_NAME: &str = "Reflection Baker";
}
