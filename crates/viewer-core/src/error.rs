use std::path::PathBuf;

use viewer_kernel::{KernelError, TopoKind};

/// Errors surfaced by the registry, export cache and selection resolver.
///
/// None of these leave the registry in a partially updated state.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ViewerError {
    #[error("object not found: {name}")]
    NotFound { name: String },

    #[error("{kind} index {index} out of range (object has {count} {kind}s)")]
    IndexOutOfRange {
        kind: TopoKind,
        index: i64,
        count: usize,
    },

    #[error("triangle {index} out of range (mesh has {count} triangles)")]
    TriangleOutOfRange { index: usize, count: usize },

    #[error("export of {name} failed: {reason}")]
    ExportFailure { name: String, reason: String },

    #[error("invalid show request: {reason}")]
    InvalidShow { reason: String },

    #[error("viewer has been shut down")]
    Shutdown,

    #[error("failed to write {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),
}

impl ViewerError {
    /// Short machine-readable tag used in transport error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ViewerError::NotFound { .. } => "not_found",
            ViewerError::IndexOutOfRange { .. } | ViewerError::TriangleOutOfRange { .. } => {
                "index_out_of_range"
            }
            ViewerError::ExportFailure { .. } => "export_failure",
            ViewerError::InvalidShow { .. } => "invalid_show",
            ViewerError::Shutdown => "shutdown",
            ViewerError::Io { .. } => "io",
            ViewerError::Kernel(_) => "kernel",
        }
    }
}

/// Convenience alias used throughout the crate.
pub type ViewerResult<T> = Result<T, ViewerError>;
