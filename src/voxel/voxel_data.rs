//! Packed voxel records and the host-side grid
//!
//! Storage is a flat array of D³ records. Cell `(x, y, z)` lives at
//! `x + y·D + z·D²`. The grid covers the world-space cube `[-B, B]³`.

use crate::error::{VxgiError, VxgiResult};
use bytemuck::{Pod, Zeroable};
use glam::{UVec3, Vec3};

/// Packed voxel format, 32 bits per voxel:
/// - Bits 0-7: Red (8-bit unorm)
/// - Bits 8-15: Green
/// - Bits 16-23: Blue
/// - Bit 24: Occupied
/// - Bits 25-31: Reserved (zero)
///
/// The voxelize kernel and the reconstruction shader use the same layout.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct VoxelRecord(pub u32);

impl VoxelRecord {
    pub const EMPTY: Self = Self(0);

    pub const OCCUPIED_BIT: u32 = 1 << 24;

    /// Occupied record carrying `color`, channels clamped to [0, 1]
    #[inline]
    pub fn from_color(color: Vec3) -> Self {
        let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0 + 0.5).floor() as u32;
        Self(
            quantize(color.x)
                | (quantize(color.y) << 8)
                | (quantize(color.z) << 16)
                | Self::OCCUPIED_BIT,
        )
    }

    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.0 & Self::OCCUPIED_BIT != 0
    }

    #[inline]
    pub fn color(&self) -> Vec3 {
        Vec3::new(
            (self.0 & 0xFF) as f32,
            ((self.0 >> 8) & 0xFF) as f32,
            ((self.0 >> 16) & 0xFF) as f32,
        ) / 255.0
    }

    /// Integer written to bake artifacts
    #[inline]
    pub fn to_artifact_int(self) -> i32 {
        self.0 as i32
    }

    #[inline]
    pub fn from_artifact_int(value: i32) -> Self {
        Self(value as u32)
    }
}

/// Host copy of a cubic voxel grid
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelGrid {
    resolution: u32,
    world_boundary: f32,
    records: Vec<VoxelRecord>,
}

impl VoxelGrid {
    /// Zeroed grid of `resolution³` records
    pub fn allocate(resolution: u32, world_boundary: f32) -> VxgiResult<Self> {
        if resolution == 0 {
            return Err(VxgiError::invalid_config(
                "voxel_resolution",
                resolution,
                "must be greater than 0",
            ));
        }
        if !world_boundary.is_finite() || world_boundary <= 0.0 {
            return Err(VxgiError::invalid_config(
                "world_boundary",
                world_boundary,
                "must be a positive finite half-extent",
            ));
        }
        Ok(Self {
            resolution,
            world_boundary,
            records: vec![VoxelRecord::EMPTY; (resolution as usize).pow(3)],
        })
    }

    /// Wrap existing records; the length must be exactly `resolution³`
    pub fn from_records(
        resolution: u32,
        world_boundary: f32,
        records: Vec<VoxelRecord>,
    ) -> VxgiResult<Self> {
        let mut grid = Self::allocate(resolution, world_boundary)?;
        if records.len() != grid.records.len() {
            return Err(VxgiError::SizeMismatch {
                artifact: "<memory>".to_string(),
                expected: grid.records.len(),
                found: records.len(),
            });
        }
        grid.records = records;
        Ok(grid)
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn world_boundary(&self) -> f32 {
        self.world_boundary
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[VoxelRecord] {
        &self.records
    }

    /// Edge length of one cell in world units
    pub fn cell_size(&self) -> f32 {
        2.0 * self.world_boundary / self.resolution as f32
    }

    #[inline]
    pub fn linear_index(&self, cell: UVec3) -> usize {
        let d = self.resolution as usize;
        cell.x as usize + cell.y as usize * d + cell.z as usize * d * d
    }

    #[inline]
    pub fn cell_of_index(&self, index: usize) -> UVec3 {
        let d = self.resolution as usize;
        UVec3::new((index % d) as u32, ((index / d) % d) as u32, (index / (d * d)) as u32)
    }

    pub fn get(&self, cell: UVec3) -> Option<VoxelRecord> {
        if cell.max_element() >= self.resolution {
            return None;
        }
        self.records.get(self.linear_index(cell)).copied()
    }

    /// Overwrite one cell; out-of-range cells are ignored
    pub fn set(&mut self, cell: UVec3, record: VoxelRecord) {
        if cell.max_element() >= self.resolution {
            return;
        }
        let index = self.linear_index(cell);
        self.records[index] = record;
    }

    /// Cell containing a world-space position, `None` outside `[-B, B)³`
    pub fn cell_containing(&self, position: Vec3) -> Option<UVec3> {
        let normalized = (position + Vec3::splat(self.world_boundary)) / (2.0 * self.world_boundary);
        if !normalized.is_finite()
            || normalized.min_element() < 0.0
            || normalized.max_element() >= 1.0
        {
            return None;
        }
        let cell = (normalized * self.resolution as f32).floor().as_uvec3();
        Some(cell.min(UVec3::splat(self.resolution - 1)))
    }

    /// World-space centre of a cell
    pub fn cell_center(&self, cell: UVec3) -> Vec3 {
        (cell.as_vec3() + Vec3::splat(0.5)) * self.cell_size() - Vec3::splat(self.world_boundary)
    }

    /// Record at a world-space position, empty outside the grid
    pub fn sample_world(&self, position: Vec3) -> VoxelRecord {
        self.cell_containing(position)
            .and_then(|cell| self.get(cell))
            .unwrap_or(VoxelRecord::EMPTY)
    }

    pub fn occupied_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_occupied()).count()
    }

    /// Occupied cells in linear order
    pub fn occupied_cells(&self) -> Vec<UVec3> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_occupied())
            .map(|(i, _)| self.cell_of_index(i))
            .collect()
    }

    /// Reset every record to empty
    pub fn clear(&mut self) {
        self.records.fill(VoxelRecord::EMPTY);
    }
}
