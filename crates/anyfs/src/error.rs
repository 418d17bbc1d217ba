//! Error values shared by the facade, the composer and every adapter
//!
//! Each variant carries a stable string code (`ENOENT`, `EEXIST`, ...) that
//! callers and the composer branch on. Backend failures are propagated as-is.

use std::io;

/// Result alias used by every filesystem operation
pub type FsResult<T> = Result<T, FsError>;

/// Filesystem error with a stable code
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// The path does not resolve to a node.
    #[error("ENOENT, no such file or directory: {0}")]
    NotFound(String),

    /// A conflicting node already occupies the path.
    #[error("EEXIST, file already exists: {0}")]
    AlreadyExists(String),

    /// A file operation was attempted on a directory.
    #[error("EISDIR, illegal operation on a directory: {0}")]
    IsDirectory(String),

    /// A directory operation was attempted on a file.
    #[error("ENOTDIR, not a directory: {0}")]
    NotDirectory(String),

    /// Non-recursive removal of a directory that still has children.
    #[error("ENOTEMPTY, directory not empty: {0}")]
    NotEmpty(String),

    /// Domain invariant violation (moving or deleting the root, moving into self).
    #[error("ELOGIC, {0}")]
    Logic(String),

    /// The backend lacks the primitive and no fallback exists.
    #[error("ENOTIMPLEMENTED, operation not implemented: {0}")]
    NotImplemented(String),

    /// File contents could not be decoded as requested.
    #[error("EINVAL, invalid data: {0}")]
    InvalidData(String),

    /// Any other backend failure.
    #[error("EIO, {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    /// Stable string code of this error
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "ENOENT",
            Self::AlreadyExists(_) => "EEXIST",
            Self::IsDirectory(_) => "EISDIR",
            Self::NotDirectory(_) => "ENOTDIR",
            Self::NotEmpty(_) => "ENOTEMPTY",
            Self::Logic(_) => "ELOGIC",
            Self::NotImplemented(_) => "ENOTIMPLEMENTED",
            Self::InvalidData(_) => "EINVAL",
            Self::Io { .. } => "EIO",
        }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn not_implemented(operation: &str) -> Self {
        Self::NotImplemented(operation.to_string())
    }

    /// Translate an `io::Error` raised while touching `path`
    ///
    /// Only the kinds with a portable mapping are translated; everything else
    /// stays an `EIO` carrying the original error.
    pub fn from_io(path: &str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_string()),
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(path.to_string()),
            _ => Self::Io {
                path: path.to_string(),
                source,
            },
        }
    }
}
