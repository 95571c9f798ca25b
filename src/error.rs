//! Error handling for the voxel reflection pipeline
//!
//! One error type covers the bake, the artifact load and the per-frame
//! reconstruction. Bake and load errors are fatal to the operation that
//! raised them; per-frame errors are logged by the reconstructor and the
//! frame degrades to direct lighting only.

use std::error::Error as StdError;
use std::fmt;

/// Main error type for the voxel reflection pipeline
#[derive(Debug)]
pub enum VxgiError {
    // Precondition Errors
    Precondition {
        component: String,
        detail: String,
    },

    // Artifact Errors
    Format {
        artifact: String,
        line: usize,
        value: String,
    },
    SizeMismatch {
        artifact: String,
        expected: usize,
        found: usize,
    },

    // Bake Errors
    BakeStep {
        object: String,
        station: String,
        error: Box<VxgiError>,
    },

    // Configuration Errors
    InvalidConfig {
        field: String,
        value: String,
        reason: String,
    },

    // System Errors
    Io {
        path: String,
        error: String,
    },
    Gpu {
        operation: String,
        error: String,
    },

    // Frame Errors
    InvalidFrame {
        reason: String,
    },
}

impl fmt::Display for VxgiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VxgiError::Precondition { component, detail } => {
                write!(f, "Precondition failed in {}: {}", component, detail)
            }

            VxgiError::Format {
                artifact,
                line,
                value,
            } => write!(
                f,
                "Artifact '{}' line {}: '{}' is not a valid integer",
                artifact, line, value
            ),
            VxgiError::SizeMismatch {
                artifact,
                expected,
                found,
            } => write!(
                f,
                "Artifact '{}' size mismatch: expected {} records, parsed {}",
                artifact, expected, found
            ),

            VxgiError::BakeStep {
                object,
                station,
                error,
            } => write!(
                f,
                "Bake failed for object '{}' at {}: {}",
                object, station, error
            ),

            VxgiError::InvalidConfig {
                field,
                value,
                reason,
            } => write!(f, "Invalid config: {} = {} ({})", field, value, reason),

            VxgiError::Io { path, error } => write!(f, "IO error for {}: {}", path, error),
            VxgiError::Gpu { operation, error } => {
                write!(f, "GPU operation '{}' failed: {}", operation, error)
            }

            VxgiError::InvalidFrame { reason } => write!(f, "Invalid frame: {}", reason),
        }
    }
}

impl StdError for VxgiError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            VxgiError::BakeStep { error, .. } => Some(error.as_ref()),
            _ => None,
        }
    }
}

/// Type alias for Results in this crate
pub type VxgiResult<T> = Result<T, VxgiError>;

impl VxgiError {
    /// Shorthand for a missing-reference failure
    pub fn precondition(component: &str, detail: impl Into<String>) -> Self {
        VxgiError::Precondition {
            component: component.to_string(),
            detail: detail.into(),
        }
    }

    /// Shorthand for a rejected configuration value
    pub fn invalid_config(field: &str, value: impl fmt::Display, reason: &str) -> Self {
        VxgiError::InvalidConfig {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a failed GPU operation
    pub fn gpu(operation: &str, error: impl fmt::Display) -> Self {
        VxgiError::Gpu {
            operation: operation.to_string(),
            error: error.to_string(),
        }
    }
}

impl From<std::io::Error> for VxgiError {
    fn from(error: std::io::Error) -> Self {
        VxgiError::Io {
            path: String::new(),
            error: error.to_string(),
        }
    }
}

impl From<crate::persistence::ArtifactError> for VxgiError {
    fn from(err: crate::persistence::ArtifactError) -> Self {
        use crate::persistence::ArtifactError;
        match err {
            ArtifactError::NotFound { artifact, path } => VxgiError::Precondition {
                component: "BakeArtifactStore".to_string(),
                detail: format!("artifact '{}' not found at {}", artifact, path.display()),
            },
            ArtifactError::Format {
                artifact,
                line,
                value,
            } => VxgiError::Format {
                artifact,
                line,
                value,
            },
            ArtifactError::SizeMismatch {
                artifact,
                expected,
                found,
            } => VxgiError::SizeMismatch {
                artifact,
                expected,
                found,
            },
            ArtifactError::InvalidName { artifact } => VxgiError::InvalidConfig {
                field: "baker_name".to_string(),
                value: artifact,
                reason: "artifact ids must be non-empty and free of path separators".to_string(),
            },
            ArtifactError::InvalidGrid {
                field,
                value,
                reason,
                ..
            } => VxgiError::InvalidConfig {
                field,
                value,
                reason,
            },
            ArtifactError::Io { path, source } => VxgiError::Io {
                path: path.display().to_string(),
                error: source.to_string(),
            },
        }
    }
}

/// Convert Option to Result with context
pub trait OptionExt<T> {
    fn ok_or_vxgi<F>(self, f: F) -> VxgiResult<T>
    where
        F: FnOnce() -> VxgiError;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_vxgi<F>(self, f: F) -> VxgiResult<T>
    where
        F: FnOnce() -> VxgiError,
    {
        self.ok_or_else(f)
    }
}
