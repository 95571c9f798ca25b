//! Device and queue ownership

use crate::error::{VxgiError, VxgiResult};
use std::sync::Arc;

/// Device and queue shared by every GPU component
#[derive(Clone)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GpuContext {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self { device, queue }
    }

    /// Request a headless device (no surface) suitable for offline bakes
    pub async fn new_headless() -> VxgiResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| VxgiError::gpu("request_adapter", "no compatible adapter found"))?;

        let info = adapter.get_info();
        log::info!(
            "[GpuContext] Using adapter '{}' ({:?})",
            info.name,
            info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Voxel Reflections Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| VxgiError::gpu("request_device", e))?;

        Ok(Self::new(Arc::new(device), Arc::new(queue)))
    }

    /// Blocking variant of [`GpuContext::new_headless`]
    pub fn new_headless_blocking() -> VxgiResult<Self> {
        pollster::block_on(Self::new_headless())
    }
}
