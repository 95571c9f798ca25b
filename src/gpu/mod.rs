//! GPU plumbing shared by the bake and runtime passes
//!
//! - context.rs: device/queue creation for headless bakes and tests
//! - validation.rs: validation error scopes around pipeline creation
//! - layouts.rs: bind group layout entries and render target helpers

pub mod context;
pub mod layouts;
pub mod validation;

pub use context::GpuContext;
pub use validation::validation_scope;
