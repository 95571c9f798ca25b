/// Persistence Module - bake artifacts on disk
///
/// - artifact_store.rs: flat-text voxel grid artifacts keyed by baker name
///
/// An artifact is `D³` newline-terminated decimal integers, one packed
/// voxel record per line in linear grid order. The file carries no header;
/// the reader is told `D` by its configuration.

pub mod artifact_store;

pub use artifact_store::BakeArtifactStore;

use std::path::PathBuf;

pub type ArtifactResult<T> = Result<T, ArtifactError>;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact '{artifact}' not found at {}", path.display())]
    NotFound { artifact: String, path: PathBuf },
    #[error("Artifact '{artifact}' line {line}: '{value}' is not a valid integer")]
    Format {
        artifact: String,
        line: usize,
        value: String,
    },
    #[error("Artifact '{artifact}' size mismatch: expected {expected} records, parsed {found}")]
    SizeMismatch {
        artifact: String,
        expected: usize,
        found: usize,
    },
    #[error("Artifact '{artifact}' cannot describe the requested grid: {field} = {value} ({reason})")]
    InvalidGrid {
        artifact: String,
        field: String,
        value: String,
        reason: String,
    },
    #[error("Invalid artifact id '{artifact}'")]
    InvalidName { artifact: String },
    #[error("IO error for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
