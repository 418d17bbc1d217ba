//! Recording adapter for composer tests
//!
//! Wraps a fully capable `MemoryAdapter`, advertises whatever capability set
//! the test asks for and logs every mutating primitive once it completes.
//! Each call yields to the scheduler first so concurrent fan-out really
//! interleaves.

use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Mutex};

use anyfs::{
    Adapter, Capabilities, FsError, FsResult, MemoryAdapter, Metadata, ReadHandle, WriteHandle,
};
use async_trait::async_trait;

pub struct TraceAdapter {
    inner: MemoryAdapter,
    capabilities: Capabilities,
    log: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    vanishing: Mutex<HashSet<String>>,
    slow: Mutex<HashSet<String>>,
}

impl TraceAdapter {
    pub fn new(capabilities: Capabilities) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryAdapter::with_capabilities(Capabilities::all()),
            capabilities,
            log: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            vanishing: Mutex::new(HashSet::new()),
            slow: Mutex::new(HashSet::new()),
        })
    }

    /// Seed files (and their parent directories) without recording anything
    pub async fn seed(&self, files: &[(&str, &str)]) {
        for (path, content) in files {
            if let Some((parent, _)) = path.rsplit_once('/') {
                if !parent.is_empty() {
                    self.inner.mkdir_recursive(parent).await.unwrap();
                }
            }
            self.inner.write_file(path, content.as_bytes()).await.unwrap();
        }
    }

    pub async fn seed_dir(&self, path: &str) {
        self.inner.mkdir_recursive(path).await.unwrap();
    }

    /// Make every mutating primitive on `path` fail with `EIO`
    pub fn fail_on(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    /// Remove the directory at `path` just before its first listing, as if
    /// another caller deleted it concurrently
    pub fn vanish_on_list(&self, path: &str) {
        self.vanishing.lock().unwrap().insert(path.to_string());
    }

    /// Delay deletes of `path` by extra scheduler round-trips
    pub fn slow_on(&self, path: &str) {
        self.slow.lock().unwrap().insert(path.to_string());
    }

    /// Recorded calls, as `op path`
    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn calls_of(&self, op: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| c.strip_prefix(&format!("{op} ")).map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    fn record(&self, op: &str, path: &str) {
        self.log.lock().unwrap().push(format!("{op} {path}"));
    }

    fn check(&self, path: &str) -> FsResult<()> {
        if self.failing.lock().unwrap().contains(path) {
            return Err(FsError::Io {
                path: path.to_string(),
                source: io::Error::other("injected failure"),
            });
        }
        Ok(())
    }

    async fn pause(&self, path: &str) {
        let rounds = if self.slow.lock().unwrap().contains(path) { 16 } else { 1 };
        for _ in 0..rounds {
            tokio::task::yield_now().await;
        }
    }

    async fn traced<T>(&self, op: &str, path: &str, result: FsResult<T>) -> FsResult<T> {
        tokio::task::yield_now().await;
        self.record(op, path);
        result
    }
}

#[async_trait]
impl Adapter for TraceAdapter {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn metadata(&self, path: &str) -> FsResult<Metadata> {
        self.inner.metadata(path).await
    }

    async fn list(&self, path: &str) -> FsResult<Vec<Metadata>> {
        tokio::task::yield_now().await;
        if self.vanishing.lock().unwrap().remove(path) {
            self.inner.delete_recursive(path).await?;
        }
        self.inner.list(path).await
    }

    async fn mkdir(&self, path: &str) -> FsResult<()> {
        let result = self.inner.mkdir(path).await;
        self.traced("mkdir", path, result).await
    }

    async fn delete(&self, path: &str) -> FsResult<()> {
        self.pause(path).await;
        let result = match self.check(path) {
            Ok(()) => self.inner.delete(path).await,
            Err(e) => Err(e),
        };
        self.traced("delete", path, result).await
    }

    async fn delete_dir(&self, path: &str) -> FsResult<()> {
        self.pause(path).await;
        let result = match self.check(path) {
            Ok(()) => self.inner.delete_dir(path).await,
            Err(e) => Err(e),
        };
        self.traced("delete_dir", path, result).await
    }

    async fn delete_recursive(&self, path: &str) -> FsResult<()> {
        let result = self.inner.delete_recursive(path).await;
        self.traced("delete_recursive", path, result).await
    }

    async fn mkdir_recursive(&self, path: &str) -> FsResult<()> {
        let result = self.inner.mkdir_recursive(path).await;
        self.traced("mkdir_recursive", path, result).await
    }

    async fn rename(&self, src: &str, dest: &str) -> FsResult<()> {
        let result = self.inner.rename(src, dest).await;
        self.traced("rename", &format!("{src} {dest}"), result).await
    }

    async fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        self.inner.read_file(path).await
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> FsResult<()> {
        let result = self.inner.write_file(path, data).await;
        self.traced("write_file", path, result).await
    }

    async fn open_read(&self, path: &str) -> FsResult<Box<dyn ReadHandle>> {
        self.inner.open_read(path).await
    }

    async fn open_write(&self, path: &str) -> FsResult<Box<dyn WriteHandle>> {
        let result = self.inner.open_write(path).await;
        self.traced("open_write", path, result).await
    }
}
