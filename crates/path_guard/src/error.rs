//! Path resolution error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while resolving a user-supplied path
#[derive(Error, Debug)]
pub enum PathError {
    /// Path is empty or whitespace-only
    #[error("path is empty or whitespace-only")]
    Empty,

    /// Path contains a NUL byte
    #[error("path contains null byte")]
    NullByte,

    /// Resolved path lies outside the base directory
    #[error("path escapes base directory: {0}")]
    Escape(String),

    /// Final component is a symlink whose target does not exist
    #[error("path is a dangling symlink: {}", .0.display())]
    DanglingSymlink(PathBuf),

    /// No ancestor of the path exists on disk
    #[error("no existing parent directory found for {}", .0.display())]
    NoExistingAncestor(PathBuf),

    /// Symlink resolution failed
    #[error("failed to resolve {}: {source}", path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PathError {
    pub(crate) fn resolve(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Resolve { path, source }
    }
}

/// Result type for path resolution
pub type PathResult<T> = Result<T, PathError>;
