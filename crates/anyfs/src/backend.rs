use std::time::SystemTime;

use async_trait::async_trait;
use serde::Serialize;

use crate::capability::Capabilities;
use crate::error::{FsError, FsResult};

/// Node metadata returned by `metadata` and `list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub name: String,
    pub is_directory: bool,
    /// File size in bytes (files only)
    pub size: Option<u64>,
    /// Last modification time (files only, if the backend tracks it)
    pub modified: Option<SystemTime>,
}

impl Metadata {
    pub fn file(name: impl Into<String>, size: u64, modified: Option<SystemTime>) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            size: Some(size),
            modified,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
            size: None,
            modified: None,
        }
    }

    pub const fn is_file(&self) -> bool {
        !self.is_directory
    }

    /// Same metadata under another name
    #[must_use]
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Chunk of data from streaming read
#[derive(Debug)]
pub struct ReadChunk {
    pub data: Vec<u8>,
    pub offset: u64,
    pub is_last: bool,
}

/// Streaming read handle
///
/// Allows reading large files in chunks without loading entire file into memory.
#[async_trait]
pub trait ReadHandle: Send + Sync {
    /// Read next chunk; once `is_last` has been seen further reads return empty final chunks
    async fn read_chunk(&mut self) -> FsResult<ReadChunk>;

    /// Get total file size (if known)
    fn size(&self) -> Option<u64>;

    /// Close the handle
    async fn close(&mut self) -> FsResult<()>;
}

/// Streaming write handle
///
/// Data is only guaranteed to be stored once `close` succeeds.
#[async_trait]
pub trait WriteHandle: Send + Sync {
    /// Write a chunk of data
    async fn write_chunk(&mut self, data: &[u8]) -> FsResult<()>;

    /// Flush and close the handle
    async fn close(&mut self) -> FsResult<()>;

    /// Get bytes written so far
    fn bytes_written(&self) -> u64;
}

/// Primitive contract every storage backend implements
///
/// Paths are always normalized and absolute. Primitives report `NotFound`,
/// `AlreadyExists`, `IsDirectory`, `NotDirectory` and `NotEmpty` the same way
/// for every backend; the composer builds its control flow on those codes.
///
/// Optional operations default to `NotImplemented`. The facade only calls
/// them when `capabilities()` declares the matching flag.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Capability set; read once by the facade
    fn capabilities(&self) -> Capabilities;

    /// Get file/directory metadata
    async fn metadata(&self, path: &str) -> FsResult<Metadata>;

    /// List direct children of a directory
    async fn list(&self, path: &str) -> FsResult<Vec<Metadata>>;

    /// Create a single directory (parent must exist)
    async fn mkdir(&self, path: &str) -> FsResult<()>;

    /// Remove a single file
    async fn delete(&self, path: &str) -> FsResult<()>;

    /// Remove a single empty directory
    async fn delete_dir(&self, path: &str) -> FsResult<()>;

    /// Move a node; the destination parent exists and the destination does not
    ///
    /// The node keeps its metadata apart from the name. `NativeMove` marks an
    /// atomic in-place rename; without it the backend may copy internally.
    async fn rename(&self, src: &str, dest: &str) -> FsResult<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Native high-level operations (gated by capabilities)
    // ─────────────────────────────────────────────────────────────────────────

    /// Remove a node and everything below it (`DeleteRecursive`)
    async fn delete_recursive(&self, _path: &str) -> FsResult<()> {
        Err(FsError::not_implemented("delete_recursive"))
    }

    /// Create a directory and all missing ancestors (`MkdirRecursive`)
    async fn mkdir_recursive(&self, _path: &str) -> FsResult<()> {
        Err(FsError::not_implemented("mkdir_recursive"))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Content I/O: buffers (`NativeBuffer`) and/or streams (`NativeStream`)
    // ─────────────────────────────────────────────────────────────────────────

    /// Read entire file contents
    async fn read_file(&self, _path: &str) -> FsResult<Vec<u8>> {
        Err(FsError::not_implemented("read_file"))
    }

    /// Write entire file contents (create or overwrite; parent must exist)
    async fn write_file(&self, _path: &str, _data: &[u8]) -> FsResult<()> {
        Err(FsError::not_implemented("write_file"))
    }

    /// Open a file for streaming read
    async fn open_read(&self, _path: &str) -> FsResult<Box<dyn ReadHandle>> {
        Err(FsError::not_implemented("open_read"))
    }

    /// Open a file for streaming write (create or overwrite; parent must exist)
    async fn open_write(&self, _path: &str) -> FsResult<Box<dyn WriteHandle>> {
        Err(FsError::not_implemented("open_write"))
    }
}
