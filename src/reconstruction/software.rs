//! Host reconstructor
//!
//! Executes a `FramePlan` on host images with the functions from
//! `cone_tracing`. Used by tests, by the demo when no adapter is available,
//! and as the reference the shader passes are checked against.

use super::cone_tracing::{
    composite, indirect_specular, march_voxel_debug, reconstruct_world_position, FrameCamera,
};
use super::frame_plan::{plan_frame, FramePass, FramePlan, Slot};
use super::params::{ComputationMode, ReconstructionParameters};
use super::target_pool::{PooledTarget, TargetPool};
use crate::capture::shade;
use crate::config::{DirectionalLight, VxgiConfig};
use crate::error::{VxgiError, VxgiResult};
use crate::mask::{HostReflectivityMask, ReflectivityMask};
use crate::scene::{raycast_visible, Scene};
use crate::voxel::VoxelGrid;
use glam::{Vec2, Vec3, Vec4};
use rayon::prelude::*;
use std::path::Path;

/// Row-major RGBA float image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostImage {
    width: u32,
    height: u32,
    pixels: Vec<Vec4>,
}

impl HostImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Vec4::ZERO)
    }

    pub fn filled(width: u32, height: u32, value: Vec4) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; (width * height) as usize],
        }
    }

    pub fn from_pixels(width: u32, height: u32, pixels: Vec<Vec4>) -> VxgiResult<Self> {
        if pixels.len() != (width * height) as usize {
            return Err(VxgiError::InvalidFrame {
                reason: format!(
                    "{} pixels for a {}x{} image",
                    pixels.len(),
                    width,
                    height
                ),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: Vec4) {
        let index = (y * self.width + x) as usize;
        self.pixels[index] = value;
    }

    /// Read with coordinates clamped to the edge; an empty image reads zero
    pub fn get_clamped(&self, x: i64, y: i64) -> Vec4 {
        if self.pixels.is_empty() {
            return Vec4::ZERO;
        }
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.get(x, y)
    }

    /// Nearest texel to a normalized coordinate; an empty image reads zero
    pub fn sample_nearest(&self, uv: Vec2) -> Vec4 {
        if self.pixels.is_empty() {
            return Vec4::ZERO;
        }
        let x = ((uv.x * self.width as f32) as u32).min(self.width - 1);
        let y = ((uv.y * self.height as f32) as u32).min(self.height - 1);
        self.get(x, y)
    }

    fn fill_with(&mut self, shader: impl Fn(u32, u32) -> Vec4 + Sync) {
        let width = self.width;
        self.pixels
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, pixel)| *pixel = shader(i as u32 % width, i as u32 / width));
    }

    /// Write an 8-bit sRGB-agnostic PNG, channels clamped to [0, 1]
    pub fn save_png(&self, path: impl AsRef<Path>) -> VxgiResult<()> {
        let path = path.as_ref();
        let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        let image = image::RgbaImage::from_fn(self.width, self.height, |x, y| {
            let p = self.get(x, y);
            image::Rgba([to_byte(p.x), to_byte(p.y), to_byte(p.z), to_byte(p.w)])
        });
        image.save(path).map_err(|e| VxgiError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }
}

/// Per-pixel inputs of a frame
#[derive(Debug, Clone)]
pub struct HostGBuffer {
    /// Lit colour of the frame
    pub color: HostImage,
    /// Depth in `[0, 1]`, 1 where nothing was drawn
    pub depth: Vec<f32>,
    /// World-space normals
    pub normals: Vec<Vec3>,
    pub reflectivity: HostReflectivityMask,
}

impl HostGBuffer {
    /// Ray-cast the visible scene through `camera`
    pub fn from_scene(
        scene: &Scene,
        camera: &FrameCamera,
        light: &DirectionalLight,
        width: u32,
        height: u32,
    ) -> Self {
        let texels: Vec<(Vec4, f32, Vec3, f32)> = (0..width * height)
            .into_par_iter()
            .map(|i| {
                let uv = Vec2::new(
                    ((i % width) as f32 + 0.5) / width as f32,
                    ((i / width) as f32 + 0.5) / height as f32,
                );
                let hit = raycast_visible(scene, camera.position, camera.view_ray(uv), f32::INFINITY);
                match hit.and_then(|h| scene.object(h.object).map(|o| (h, o))) {
                    Some((hit, object)) => (
                        shade(object.base_color, hit.normal, light).extend(1.0),
                        camera.depth_of(hit.position).clamp(0.0, 1.0),
                        hit.normal,
                        object.reflectivity,
                    ),
                    None => (Vec4::W, 1.0, Vec3::ZERO, 0.0),
                }
            })
            .collect();

        let mut color = Vec::with_capacity(texels.len());
        let mut depth = Vec::with_capacity(texels.len());
        let mut normals = Vec::with_capacity(texels.len());
        let mut reflectivity = Vec::with_capacity(texels.len());
        for (c, d, n, r) in texels {
            color.push(c);
            depth.push(d);
            normals.push(n);
            reflectivity.push(r);
        }

        Self {
            color: HostImage {
                width,
                height,
                pixels: color,
            },
            depth,
            normals,
            reflectivity: HostReflectivityMask::from_values(width, height, reflectivity)
                .unwrap_or_else(|| HostReflectivityMask::uniform(width, height, 0.0)),
        }
    }

    pub fn extent(&self) -> (u32, u32) {
        self.color.extent()
    }

    fn validate(&self) -> VxgiResult<()> {
        let texels = self.color.pixels.len();
        if self.depth.len() != texels
            || self.normals.len() != texels
            || self.reflectivity.extent() != self.color.extent()
        {
            return Err(VxgiError::InvalidFrame {
                reason: "g-buffer planes disagree on the frame extent".to_string(),
            });
        }
        Ok(())
    }
}

/// Three equal taps at `-step`, `0`, `+step` texels along one axis, clamped to the edge
pub fn box_blur(input: &HostImage, output: &mut HostImage, horizontal: bool, step: f32) {
    let offsets = [-1.0f32, 0.0, 1.0].map(|k| (k * step + 0.5).floor() as i64);
    if output.extent() != input.extent() {
        *output = HostImage::new(input.width, input.height);
    }
    output.fill_with(|x, y| {
        let sum: Vec4 = offsets
            .iter()
            .map(|&o| {
                if horizontal {
                    input.get_clamped(x as i64 + o, y as i64)
                } else {
                    input.get_clamped(x as i64, y as i64 + o)
                }
            })
            .sum();
        sum / 3.0
    });
}

struct HostSlots<'a> {
    source: &'a HostImage,
    destination: HostImage,
    temp_a: Option<PooledTarget<HostImage>>,
    temp_b: Option<PooledTarget<HostImage>>,
}

impl HostSlots<'_> {
    fn read(&self, slot: Slot) -> Option<&HostImage> {
        match slot {
            Slot::Source => Some(self.source),
            Slot::Destination => Some(&self.destination),
            Slot::TempA => self.temp_a.as_deref(),
            Slot::TempB => self.temp_b.as_deref(),
        }
    }

    fn take(&mut self, slot: Slot) -> Option<HostImage> {
        match slot {
            Slot::Source => None,
            Slot::Destination => Some(std::mem::take(&mut self.destination)),
            Slot::TempA => self.temp_a.as_deref_mut().map(std::mem::take),
            Slot::TempB => self.temp_b.as_deref_mut().map(std::mem::take),
        }
    }

    fn put(&mut self, slot: Slot, image: HostImage) {
        match slot {
            Slot::Source => {}
            Slot::Destination => self.destination = image,
            Slot::TempA => {
                if let Some(target) = self.temp_a.as_deref_mut() {
                    *target = image;
                }
            }
            Slot::TempB => {
                if let Some(target) = self.temp_b.as_deref_mut() {
                    *target = image;
                }
            }
        }
    }
}

/// Host execution of the reconstruction passes
pub struct SoftwareReconstructor {
    mode: ComputationMode,
    params: ReconstructionParameters,
    grid: Option<VoxelGrid>,
    pool: TargetPool<HostImage>,
}

impl SoftwareReconstructor {
    pub fn new(mode: ComputationMode, params: ReconstructionParameters) -> Self {
        Self {
            mode,
            params,
            grid: None,
            pool: TargetPool::new(),
        }
    }

    pub fn from_config(config: &VxgiConfig) -> Self {
        Self::new(config.computation, config.reconstruction.clone())
    }

    pub fn set_grid(&mut self, grid: Option<VoxelGrid>) {
        self.grid = grid;
    }

    pub fn grid(&self) -> Option<&VoxelGrid> {
        self.grid.as_ref()
    }

    pub fn set_mode(&mut self, mode: ComputationMode) {
        self.mode = mode;
    }

    pub fn params_mut(&mut self) -> &mut ReconstructionParameters {
        &mut self.params
    }

    pub fn pool(&self) -> &TargetPool<HostImage> {
        &self.pool
    }

    /// Plan for the next frame, or the direct-only fallback
    pub fn plan(&self, width: u32, height: u32) -> FramePlan {
        if self.grid.is_none() {
            log::warn!("[SoftwareReconstructor] No voxel grid loaded; rendering direct lighting only");
            return FramePlan::direct_only(width, height);
        }
        match plan_frame(self.mode, &self.params, width, height) {
            Ok(plan) => plan,
            Err(e) => {
                log::warn!("[SoftwareReconstructor] {}; rendering direct lighting only", e);
                FramePlan::direct_only(width, height)
            }
        }
    }

    /// Reconstruct one frame; never fails, degrading to direct lighting instead
    pub fn render_frame(&self, gbuffer: &HostGBuffer, camera: &FrameCamera) -> HostImage {
        let (width, height) = gbuffer.extent();
        let plan = self.plan(width, height);
        match self.execute(&plan, gbuffer, camera) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("[SoftwareReconstructor] {}; rendering direct lighting only", e);
                let mut image = HostImage::new(width, height);
                image.fill_with(|x, y| composite(gbuffer.color.get(x, y), Vec3::ZERO, &self.params, false));
                image
            }
        }
    }

    /// Run `plan` step by step
    pub fn execute(
        &self,
        plan: &FramePlan,
        gbuffer: &HostGBuffer,
        camera: &FrameCamera,
    ) -> VxgiResult<HostImage> {
        gbuffer.validate()?;
        let (width, height) = plan.extent;
        let mut slots = HostSlots {
            source: &gbuffer.color,
            destination: HostImage::new(width, height),
            temp_a: plan
                .temp_extent
                .map(|e| self.pool.acquire(e, |(w, h)| HostImage::new(w, h))),
            temp_b: plan
                .temp_extent
                .map(|e| self.pool.acquire(e, |(w, h)| HostImage::new(w, h))),
        };

        for step in &plan.steps {
            let mut output = slots.take(step.output).ok_or_else(|| VxgiError::InvalidFrame {
                reason: format!("{:?} cannot be written by {:?}", step.output, step.pass),
            })?;
            let Some(input) = slots.read(step.input) else {
                slots.put(step.output, output);
                return Err(VxgiError::InvalidFrame {
                    reason: format!("{:?} has no {:?} target", step.pass, step.input),
                });
            };

            let result = match step.pass {
                FramePass::IndirectSpecular => self.indirect_pass(gbuffer, camera, &mut output),
                FramePass::BlurHorizontal => {
                    box_blur(input, &mut output, true, self.params.blur_step);
                    Ok(())
                }
                FramePass::BlurVertical => {
                    box_blur(input, &mut output, false, self.params.blur_step);
                    Ok(())
                }
                FramePass::Composite => {
                    let source = slots.source;
                    let indirect = plan.indirect_enabled.then_some(input);
                    let (w, h) = output.extent();
                    output.fill_with(|x, y| {
                        let uv = Vec2::new((x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32);
                        let indirect = indirect.map_or(Vec3::ZERO, |i| i.sample_nearest(uv).truncate());
                        composite(source.get(x, y), indirect, &self.params, plan.indirect_enabled)
                    });
                    Ok(())
                }
                FramePass::VoxelDebug => self.require_grid().map(|grid| {
                    let (w, h) = output.extent();
                    output.fill_with(|x, y| {
                        let uv = Vec2::new((x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32);
                        march_voxel_debug(grid, camera.position, camera.view_ray(uv)).extend(1.0)
                    });
                }),
            };
            // Pooled targets keep their extent even when the pass fails
            slots.put(step.output, output);
            result?;
        }

        Ok(std::mem::take(&mut slots.destination))
    }

    fn require_grid(&self) -> VxgiResult<&VoxelGrid> {
        self.grid
            .as_ref()
            .ok_or_else(|| VxgiError::precondition("SoftwareReconstructor", "no voxel grid loaded"))
    }

    fn indirect_pass(
        &self,
        gbuffer: &HostGBuffer,
        camera: &FrameCamera,
        output: &mut HostImage,
    ) -> VxgiResult<()> {
        let grid = self.require_grid()?;
        let (width, height) = gbuffer.extent();
        let (tw, th) = output.extent();
        output.fill_with(|x, y| {
            let uv = Vec2::new((x as f32 + 0.5) / tw as f32, (y as f32 + 0.5) / th as f32);
            let px = ((uv.x * width as f32) as u32).min(width - 1);
            let py = ((uv.y * height as f32) as u32).min(height - 1);
            let index = (py * width + px) as usize;
            let depth = gbuffer.depth[index];
            if depth >= 1.0 {
                return Vec4::W;
            }
            let surface =
                reconstruct_world_position(uv, depth, camera.inverse_projection, camera.camera_to_world);
            indirect_specular(
                grid,
                camera.position,
                surface,
                gbuffer.normals[index],
                gbuffer.reflectivity.reflectivity_at(px, py),
                &self.params,
            )
            .extend(1.0)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::VoxelRecord;
    use glam::{Mat4, UVec3};

    fn camera_looking_down() -> FrameCamera {
        let view = Mat4::look_at_rh(Vec3::new(2.5, 9.0, 2.5), Vec3::new(2.5, 0.0, 2.5), Vec3::Z);
        let projection = Mat4::perspective_rh(0.5, 1.0, 0.1, 50.0);
        FrameCamera::new(view, projection)
    }

    /// One-pixel mirror floor at y = 0 seen from above
    fn mirror_gbuffer(camera: &FrameCamera, reflectivity: f32) -> HostGBuffer {
        HostGBuffer {
            color: HostImage::filled(1, 1, Vec4::new(0.2, 0.2, 0.2, 1.0)),
            depth: vec![camera.depth_of(Vec3::new(2.5, 0.0, 2.5))],
            normals: vec![Vec3::Y],
            reflectivity: HostReflectivityMask::uniform(1, 1, reflectivity),
        }
    }

    fn red_voxel_grid() -> VoxelGrid {
        let mut grid = VoxelGrid::allocate(4, 10.0).unwrap();
        grid.set(UVec3::new(2, 3, 2), VoxelRecord::from_color(Vec3::X));
        grid
    }

    #[test]
    fn test_empty_grid_gives_scaled_direct() {
        let camera = camera_looking_down();
        let mut reconstructor =
            SoftwareReconstructor::new(ComputationMode::Specular, ReconstructionParameters::default());
        reconstructor.set_grid(Some(VoxelGrid::allocate(4, 10.0).unwrap()));
        let frame = reconstructor.render_frame(&mirror_gbuffer(&camera, 1.0), &camera);
        assert!((frame.get(0, 0) - Vec4::new(0.1, 0.1, 0.1, 1.0)).length() < 1e-6);
        assert_eq!(reconstructor.pool().outstanding(), 0);
    }

    #[test]
    fn test_mirror_reflects_voxel() {
        let camera = camera_looking_down();
        let params = ReconstructionParameters {
            blur_iterations: 1,
            ..Default::default()
        };
        let mut reconstructor = SoftwareReconstructor::new(ComputationMode::Specular, params);
        reconstructor.set_grid(Some(red_voxel_grid()));

        let frame = reconstructor.render_frame(&mirror_gbuffer(&camera, 1.0), &camera);
        let pixel = frame.get(0, 0);
        assert!((pixel.x - (0.1 + 1.0 / 1.1)).abs() < 1e-4, "{:?}", pixel);
        assert!((pixel.y - 0.1).abs() < 1e-6);

        let matte = reconstructor.render_frame(&mirror_gbuffer(&camera, 0.05), &camera);
        assert!((matte.get(0, 0).x - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_missing_grid_degrades_to_direct() {
        let camera = camera_looking_down();
        let reconstructor =
            SoftwareReconstructor::new(ComputationMode::Specular, ReconstructionParameters::default());
        let frame = reconstructor.render_frame(&mirror_gbuffer(&camera, 1.0), &camera);
        assert!((frame.get(0, 0).x - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_oversized_downsample_degrades_to_direct() {
        let camera = camera_looking_down();
        let params = ReconstructionParameters {
            downsample: 4,
            ..Default::default()
        };
        let mut reconstructor = SoftwareReconstructor::new(ComputationMode::Specular, params);
        reconstructor.set_grid(Some(red_voxel_grid()));
        let plan = reconstructor.plan(1, 1);
        assert!(!plan.indirect_enabled);
        let frame = reconstructor.render_frame(&mirror_gbuffer(&camera, 1.0), &camera);
        assert!((frame.get(0, 0).x - 0.1).abs() < 1e-6);
        assert_eq!(reconstructor.pool().outstanding(), 0);
    }

    #[test]
    fn test_failed_pass_returns_full_size_temporaries() {
        let camera = camera_looking_down();
        let gbuffer = mirror_gbuffer(&camera, 1.0);
        let params = ReconstructionParameters {
            blur_iterations: 1,
            ..Default::default()
        };
        let mut reconstructor = SoftwareReconstructor::new(ComputationMode::Specular, params.clone());

        // No grid: the indirect pass fails after taking TempA out of its slot
        let plan = plan_frame(ComputationMode::Specular, &params, 1, 1).unwrap();
        assert!(matches!(
            reconstructor.execute(&plan, &gbuffer, &camera),
            Err(VxgiError::Precondition { .. })
        ));
        assert_eq!(reconstructor.pool().outstanding(), 0);

        // Both recycled temporaries still cover the frame
        assert_eq!(reconstructor.pool().idle(), 2);
        let temps: Vec<_> = (0..2)
            .map(|_| reconstructor.pool().acquire((1, 1), |_| HostImage::default()))
            .collect();
        for temp in &temps {
            assert_eq!(temp.as_ref().extent(), (1, 1));
        }
        drop(temps);

        reconstructor.set_grid(Some(red_voxel_grid()));
        let frame = reconstructor.render_frame(&gbuffer, &camera);
        assert!((frame.get(0, 0).x - (0.1 + 1.0 / 1.1)).abs() < 1e-4);
        assert_eq!(reconstructor.pool().outstanding(), 0);
    }

    #[test]
    fn test_empty_image_reads_zero() {
        let image = HostImage::default();
        assert_eq!(image.get_clamped(-1, 3), Vec4::ZERO);
        assert_eq!(image.sample_nearest(Vec2::splat(0.5)), Vec4::ZERO);
    }

    #[test]
    fn test_voxel_debug_shows_grid() {
        let camera = camera_looking_down();
        let mut reconstructor =
            SoftwareReconstructor::new(ComputationMode::Voxelization, ReconstructionParameters::default());
        reconstructor.set_grid(Some(red_voxel_grid()));
        let frame = reconstructor.render_frame(&mirror_gbuffer(&camera, 0.0), &camera);
        assert_eq!(frame.get(0, 0), Vec4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_box_blur_clamps_to_edge() {
        let input = HostImage::from_pixels(
            3,
            1,
            vec![Vec4::ZERO, Vec4::splat(3.0), Vec4::ZERO],
        )
        .unwrap();
        let mut output = HostImage::default();
        box_blur(&input, &mut output, true, 1.0);
        for x in 0..3 {
            assert!((output.get(x, 0) - Vec4::ONE).length() < 1e-6);
        }
        box_blur(&input, &mut output, false, 1.0);
        assert_eq!(output.get(1, 0), Vec4::splat(3.0));
    }

    #[test]
    fn test_mismatched_gbuffer_is_invalid_frame() {
        let camera = camera_looking_down();
        let mut gbuffer = mirror_gbuffer(&camera, 1.0);
        gbuffer.normals.clear();
        let reconstructor =
            SoftwareReconstructor::new(ComputationMode::Specular, ReconstructionParameters::default());
        let plan = FramePlan::direct_only(1, 1);
        assert!(matches!(
            reconstructor.execute(&plan, &gbuffer, &camera),
            Err(VxgiError::InvalidFrame { .. })
        ));
        // render_frame still produces an image
        let frame = reconstructor.render_frame(&gbuffer, &camera);
        assert_eq!(frame.extent(), (1, 1));
    }
}
