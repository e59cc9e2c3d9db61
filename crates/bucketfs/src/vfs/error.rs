//! Filesystem error types.

use std::io;
use thiserror::Error;

/// Filesystem error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// `read` on a path that does not classify as a file.
    #[error("no such file: {0}")]
    NoSuchFile(String),

    /// Content is not UTF-8 but text was explicitly requested.
    #[error("{0} is not UTF-8 encoded")]
    Format(String),

    /// The backend reported the object missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Base64 content could not be decoded.
    #[error("invalid base64 content for {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: base64::DecodeError,
    },

    /// Startup check failed; the filesystem is unusable.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Path escapes the store root (security violation).
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Invalid path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Configuration could not be parsed or is inconsistent.
    #[error("config error: {0}")]
    Config(String),

    /// Object store failure.
    #[error("object store error: {0}")]
    Backend(#[from] object_store::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    /// Create a NoSuchFile error.
    pub fn no_such_file(path: impl Into<String>) -> Self {
        Self::NoSuchFile(path.into())
    }

    /// Create a Format error.
    pub fn format(path: impl Into<String>) -> Self {
        Self::Format(path.into())
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an InvariantViolation error.
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    /// Create a PathEscapesRoot error.
    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns true if the backend reported the object missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            VfsError::NotFound(_) => true,
            VfsError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            VfsError::Backend(object_store::Error::NotFound { .. }) => true,
            _ => false,
        }
    }
}

/// Convert VfsError to std::io::Error for callers streaming bytes over io traits.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NoSuchFile(msg) | VfsError::NotFound(msg) => {
                io::Error::new(io::ErrorKind::NotFound, msg)
            }
            VfsError::Format(msg) => io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{msg} is not UTF-8 encoded"),
            ),
            VfsError::Decode { path, source } => io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid base64 content for {path}: {source}"),
            ),
            VfsError::PathEscapesRoot(msg) => io::Error::new(io::ErrorKind::PermissionDenied, msg),
            VfsError::InvalidPath(msg) | VfsError::Config(msg) => {
                io::Error::new(io::ErrorKind::InvalidInput, msg)
            }
            VfsError::Io(e) => e,
            VfsError::Backend(e) => io::Error::other(e),
            VfsError::InvariantViolation(msg) => io::Error::other(msg),
        }
    }
}

/// Filesystem result type.
pub type VfsResult<T> = Result<T, VfsError>;
