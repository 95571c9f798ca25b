//! Bake a small scene, load the artifact back and reconstruct one frame
//!
//! Uses the GPU bake when an adapter is available and the host bake otherwise.
//! The reconstructed frame is written to `vxgi_frame.png`.

use glam::{Mat4, Vec3};
use voxel_reflections::{
    load_runtime_grid, FrameCamera, GpuBakeBackend, GpuContext, HostGBuffer, MeshData,
    ObjectDesc, ReflectionBaker, Scene, SoftwareBakeBackend, SoftwareReconstructor, VxgiConfig,
};

fn build_scene() -> Scene {
    let mut scene = Scene::new();
    scene.add_object(
        ObjectDesc::new(
            "Floor",
            MeshData::cuboid(Vec3::new(-8.0, -1.0, -8.0), Vec3::new(8.0, -0.5, 8.0)),
        )
        .with_color(Vec3::new(0.8, 0.8, 0.8))
        .with_reflectivity(0.8)
        .static_geometry(),
    );
    scene.add_object(
        ObjectDesc::new("Red Cube", MeshData::cube(Vec3::new(-2.0, 1.0, 0.0), 1.5))
            .with_color(Vec3::new(0.9, 0.1, 0.1))
            .static_geometry(),
    );
    scene.add_object(
        ObjectDesc::new("Green Cube", MeshData::cube(Vec3::new(3.0, 0.5, -2.0), 1.0))
            .with_color(Vec3::new(0.1, 0.8, 0.2))
            .with_reflectivity(0.3)
            .static_geometry(),
    );
    scene
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = VxgiConfig {
        voxel_resolution: 32,
        artifact_dir: std::env::temp_dir().join("vxgi-demo"),
        ..Default::default()
    };
    let mut scene = build_scene();

    let report = match GpuContext::new_headless_blocking() {
        Ok(ctx) => {
            log::info!("[Demo] Baking on the GPU");
            ReflectionBaker::new(config.clone(), GpuBakeBackend::new(&ctx)?)?.bake(&mut scene)?
        }
        Err(e) => {
            log::warn!("[Demo] No GPU adapter ({}), baking on the host", e);
            ReflectionBaker::new(config.clone(), SoftwareBakeBackend::new())?.bake(&mut scene)?
        }
    };
    println!(
        "Baked {} objects into {} occupied cells in {:?} -> {}",
        report.objects_voxelized,
        report.occupied_cells,
        report.elapsed,
        report.artifact_path.display()
    );

    let grid = load_runtime_grid(&config)?;
    let mut reconstructor = SoftwareReconstructor::from_config(&config);
    reconstructor.set_grid(Some(grid));

    let (width, height) = (256, 256);
    let camera = FrameCamera::new(
        Mat4::look_at_rh(Vec3::new(0.0, 4.0, 12.0), Vec3::ZERO, Vec3::Y),
        Mat4::perspective_rh(60f32.to_radians(), width as f32 / height as f32, 0.1, 100.0),
    );
    let gbuffer = HostGBuffer::from_scene(&scene, &camera, &config.light, width, height);
    let frame = reconstructor.render_frame(&gbuffer, &camera);
    frame.save_png("vxgi_frame.png")?;
    println!("Wrote vxgi_frame.png ({}x{})", width, height);
    Ok(())
}
