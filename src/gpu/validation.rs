//! Validation error scopes
//!
//! wgpu reports pipeline and resource validation failures asynchronously
//! through the uncaptured error handler. Wrapping creation calls in an error
//! scope turns those failures into a `VxgiError` at the call site instead.

use crate::error::{VxgiError, VxgiResult};

/// Run `operation` inside a validation error scope
pub fn validation_scope<R>(
    device: &wgpu::Device,
    label: &str,
    operation: impl FnOnce() -> R,
) -> VxgiResult<R> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let result = operation();
    match pollster::block_on(device.pop_error_scope()) {
        None => {
            log::debug!("[GpuValidation] '{}' passed validation", label);
            Ok(result)
        }
        Some(error) => {
            log::error!("[GpuValidation] '{}' failed validation: {}", label, error);
            Err(VxgiError::gpu(label, error))
        }
    }
}

/// Create a WGSL shader module under a validation scope
pub fn create_shader(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> VxgiResult<wgpu::ShaderModule> {
    log::debug!(
        "[GpuValidation] Compiling shader '{}' ({} chars)",
        label,
        source.len()
    );
    validation_scope(device, label, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(source)),
        })
    })
}
