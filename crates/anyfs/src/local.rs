use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::backend::{Adapter, Metadata, ReadChunk, ReadHandle, WriteHandle};
use crate::capability::{Capabilities, Capability};
use crate::error::{FsError, FsResult};
use crate::path;

/// Default chunk size for streaming (64KB)
const CHUNK_SIZE: usize = 64 * 1024;

/// Disk adapter - maps virtual paths onto a directory on the real filesystem
pub struct LocalAdapter {
    root: PathBuf,
}

impl LocalAdapter {
    pub const CAPABILITIES: Capabilities = Capabilities::all().without(Capability::DeleteIgnoreMissing);

    /// Create a disk adapter rooted at an existing directory
    pub fn new(root: impl Into<PathBuf>) -> FsResult<Self> {
        let root_path = root.into();
        let display = root_path.display().to_string();
        let root = root_path
            .canonicalize()
            .map_err(|e| FsError::from_io(&display, e))?;
        if !root.is_dir() {
            return Err(FsError::NotDirectory(display));
        }
        Ok(Self { root })
    }

    /// Resolve a virtual path to a location inside the root
    ///
    /// Virtual paths arrive normalized, but anything that could step
    /// outside the root is still refused.
    fn resolve(&self, path: &str) -> FsResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(FsError::Logic(format!(
                "path escapes {}: {path}",
                self.root.display()
            )));
        }
        Ok(self.root.join(relative))
    }
}

/// Run blocking std::fs work off the async executor
async fn blocking<T, F>(path: &str, work: F) -> FsResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> FsResult<T> + Send + 'static,
{
    let path = path.to_string();
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| FsError::Io {
            path,
            source: io::Error::other(e),
        })?
}

fn describe(name: &str, meta: &fs::Metadata) -> Metadata {
    if meta.is_dir() {
        Metadata::directory(name)
    } else {
        Metadata::file(name, meta.len(), meta.modified().ok())
    }
}

fn stat(vpath: &str, target: &Path) -> FsResult<fs::Metadata> {
    fs::metadata(target).map_err(|e| FsError::from_io(vpath, e))
}

#[async_trait]
impl Adapter for LocalAdapter {
    fn capabilities(&self) -> Capabilities {
        Self::CAPABILITIES
    }

    async fn metadata(&self, path: &str) -> FsResult<Metadata> {
        let target = self.resolve(path)?;
        let vpath = path.to_string();
        blocking(path, move || {
            let meta = stat(&vpath, &target)?;
            Ok(describe(path::basename(&vpath), &meta))
        })
        .await
    }

    async fn list(&self, path: &str) -> FsResult<Vec<Metadata>> {
        let target = self.resolve(path)?;
        let vpath = path.to_string();
        blocking(path, move || {
            if !stat(&vpath, &target)?.is_dir() {
                return Err(FsError::NotDirectory(vpath));
            }
            let io_err = |e| FsError::from_io(&vpath, e);
            let mut entries = Vec::new();
            for entry in fs::read_dir(&target).map_err(io_err)? {
                let entry = entry.map_err(io_err)?;
                let meta = entry.metadata().map_err(io_err)?;
                let name = entry.file_name().to_string_lossy().into_owned();
                entries.push(describe(&name, &meta));
            }
            Ok(entries)
        })
        .await
    }

    async fn mkdir(&self, path: &str) -> FsResult<()> {
        let target = self.resolve(path)?;
        let vpath = path.to_string();
        blocking(path, move || {
            fs::create_dir(&target).map_err(|e| FsError::from_io(&vpath, e))
        })
        .await
    }

    async fn delete(&self, path: &str) -> FsResult<()> {
        let target = self.resolve(path)?;
        let vpath = path.to_string();
        blocking(path, move || {
            if stat(&vpath, &target)?.is_dir() {
                return Err(FsError::IsDirectory(vpath));
            }
            fs::remove_file(&target).map_err(|e| FsError::from_io(&vpath, e))
        })
        .await
    }

    async fn delete_dir(&self, path: &str) -> FsResult<()> {
        let target = self.resolve(path)?;
        let vpath = path.to_string();
        blocking(path, move || {
            if !stat(&vpath, &target)?.is_dir() {
                return Err(FsError::NotDirectory(vpath));
            }
            let mut entries = fs::read_dir(&target).map_err(|e| FsError::from_io(&vpath, e))?;
            if entries.next().is_some() {
                return Err(FsError::NotEmpty(vpath));
            }
            fs::remove_dir(&target).map_err(|e| FsError::from_io(&vpath, e))
        })
        .await
    }

    async fn delete_recursive(&self, path: &str) -> FsResult<()> {
        let target = self.resolve(path)?;
        let vpath = path.to_string();
        blocking(path, move || {
            let result = if stat(&vpath, &target)?.is_dir() {
                fs::remove_dir_all(&target)
            } else {
                fs::remove_file(&target)
            };
            result.map_err(|e| FsError::from_io(&vpath, e))
        })
        .await
    }

    async fn mkdir_recursive(&self, path: &str) -> FsResult<()> {
        let target = self.resolve(path)?;
        let root = self.root.clone();
        let vpath = path.to_string();
        blocking(path, move || {
            // a file anywhere on the way blocks the whole chain
            let mut current = Some(vpath.as_str());
            let mut dir = target.as_path();
            while let (Some(vdir), true) = (current, dir.starts_with(&root) && dir != root) {
                if dir.is_file() {
                    return Err(FsError::AlreadyExists(vdir.to_string()));
                }
                current = path::parent(vdir);
                dir = dir.parent().unwrap_or(root.as_path());
            }
            fs::create_dir_all(&target).map_err(|e| FsError::from_io(&vpath, e))
        })
        .await
    }

    async fn rename(&self, src: &str, dest: &str) -> FsResult<()> {
        let src_resolved = self.resolve(src)?;
        let dest_resolved = self.resolve(dest)?;
        let (vsrc, vdest) = (src.to_string(), dest.to_string());
        blocking(src, move || {
            // fs::rename replaces existing files on unix; overwrites are never allowed
            if dest_resolved.symlink_metadata().is_ok() {
                return Err(FsError::AlreadyExists(vdest));
            }
            stat(&vsrc, &src_resolved)?;
            fs::rename(&src_resolved, &dest_resolved).map_err(|e| FsError::from_io(&vsrc, e))
        })
        .await
    }

    async fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        let target = self.resolve(path)?;
        let vpath = path.to_string();
        blocking(path, move || {
            if stat(&vpath, &target)?.is_dir() {
                return Err(FsError::IsDirectory(vpath));
            }
            fs::read(&target).map_err(|e| FsError::from_io(&vpath, e))
        })
        .await
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> FsResult<()> {
        let target = self.resolve(path)?;
        let vpath = path.to_string();
        let data = data.to_vec();
        blocking(path, move || {
            if target.is_dir() {
                return Err(FsError::IsDirectory(vpath));
            }
            fs::write(&target, data).map_err(|e| FsError::from_io(&vpath, e))
        })
        .await
    }

    async fn open_read(&self, path: &str) -> FsResult<Box<dyn ReadHandle>> {
        let target = self.resolve(path)?;
        let vpath = path.to_string();
        let handle = blocking(path, move || FileReadHandle::new(&vpath, &target)).await?;
        Ok(Box::new(handle))
    }

    async fn open_write(&self, path: &str) -> FsResult<Box<dyn WriteHandle>> {
        let target = self.resolve(path)?;
        let vpath = path.to_string();
        let handle = blocking(path, move || FileWriteHandle::new(&vpath, &target)).await?;
        Ok(Box::new(handle))
    }
}

/// Streaming read handle for local files
pub struct FileReadHandle {
    path: String,
    reader: Arc<Mutex<BufReader<File>>>,
    size: u64,
    offset: u64,
}

impl FileReadHandle {
    fn new(vpath: &str, target: &Path) -> FsResult<Self> {
        let meta = stat(vpath, target)?;
        if meta.is_dir() {
            return Err(FsError::IsDirectory(vpath.to_string()));
        }
        let file = File::open(target).map_err(|e| FsError::from_io(vpath, e))?;
        Ok(Self {
            path: vpath.to_string(),
            reader: Arc::new(Mutex::new(BufReader::with_capacity(CHUNK_SIZE, file))),
            size: meta.len(),
            offset: 0,
        })
    }
}

#[async_trait]
impl ReadHandle for FileReadHandle {
    async fn read_chunk(&mut self) -> FsResult<ReadChunk> {
        let reader = self.reader.clone();
        let remaining = self.size.saturating_sub(self.offset);
        let want = usize::try_from(remaining).map_or(CHUNK_SIZE, |r| r.min(CHUNK_SIZE));
        let vpath = self.path.clone();

        let chunk = blocking(&self.path, move || {
            let mut guard = reader.lock().map_err(|_| FsError::Io {
                path: vpath.clone(),
                source: io::Error::other("lock poisoned"),
            })?;
            let mut buffer = vec![0u8; want];
            let bytes_read = guard.read(&mut buffer).map_err(|e| FsError::from_io(&vpath, e))?;
            buffer.truncate(bytes_read);
            Ok(buffer)
        })
        .await?;

        let bytes_read = chunk.len() as u64;
        let chunk = ReadChunk {
            data: chunk,
            offset: self.offset,
            is_last: bytes_read == 0 || self.offset + bytes_read >= self.size,
        };
        self.offset += bytes_read;
        Ok(chunk)
    }

    fn size(&self) -> Option<u64> {
        Some(self.size)
    }

    async fn close(&mut self) -> FsResult<()> {
        // Drop happens automatically when Arc count reaches 0
        Ok(())
    }
}

/// Streaming write handle for local files
pub struct FileWriteHandle {
    path: String,
    writer: Arc<Mutex<BufWriter<File>>>,
    bytes_written: u64,
}

impl FileWriteHandle {
    fn new(vpath: &str, target: &Path) -> FsResult<Self> {
        if target.is_dir() {
            return Err(FsError::IsDirectory(vpath.to_string()));
        }
        let file = File::create(target).map_err(|e| FsError::from_io(vpath, e))?;
        Ok(Self {
            path: vpath.to_string(),
            writer: Arc::new(Mutex::new(BufWriter::with_capacity(CHUNK_SIZE, file))),
            bytes_written: 0,
        })
    }

    fn locked<T>(
        &self,
        work: impl FnOnce(&mut BufWriter<File>) -> io::Result<T> + Send + 'static,
    ) -> impl std::future::Future<Output = FsResult<T>> + Send + 'static
    where
        T: Send + 'static,
    {
        let writer = self.writer.clone();
        let path = self.path.clone();
        async move {
            let vpath = path.clone();
            blocking(&path, move || {
                let mut guard = writer.lock().map_err(|_| FsError::Io {
                    path: vpath.clone(),
                    source: io::Error::other("lock poisoned"),
                })?;
                work(&mut guard).map_err(|e| FsError::from_io(&vpath, e))
            })
            .await
        }
    }
}

#[async_trait]
impl WriteHandle for FileWriteHandle {
    async fn write_chunk(&mut self, data: &[u8]) -> FsResult<()> {
        let data = data.to_vec();
        let bytes = data.len() as u64;
        self.locked(move |w| w.write_all(&data)).await?;
        self.bytes_written += bytes;
        Ok(())
    }

    async fn close(&mut self) -> FsResult<()> {
        self.locked(Write::flush).await
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
