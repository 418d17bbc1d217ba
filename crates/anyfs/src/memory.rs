//! In-memory adapter
//!
//! Provides a fast, ephemeral nested tree: a directory is a `name → node`
//! map, a file is a byte buffer tagged with its modification time.
//! The capability set is chosen per instance; primitives outside that set
//! answer `NotImplemented`, so one adapter can stand in for narrower backends
//! in tests.

use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use async_trait::async_trait;

use crate::backend::{Adapter, Metadata, ReadChunk, ReadHandle, WriteHandle};
use crate::capability::{Capabilities, Capability};
use crate::error::{FsError, FsResult};
use crate::path;

/// In-memory tree node
#[derive(Clone, Debug)]
enum Node {
    Directory(BTreeMap<String, Node>),
    File { data: Vec<u8>, modified: SystemTime },
}

impl Node {
    const fn empty_dir() -> Self {
        Self::Directory(BTreeMap::new())
    }

    fn describe(&self, name: &str) -> Metadata {
        match self {
            Self::Directory(_) => Metadata::directory(name),
            Self::File { data, modified } => {
                Metadata::file(name, data.len() as u64, Some(*modified))
            }
        }
    }
}

type Tree = Arc<RwLock<Node>>;

/// In-memory filesystem adapter
///
/// All data is stored in memory and lost when the adapter is dropped.
pub struct MemoryAdapter {
    tree: Tree,
    capabilities: Capabilities,
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAdapter {
    /// Buffer I/O and in-place rename, nothing else
    pub const DEFAULT_CAPABILITIES: Capabilities = Capabilities::empty()
        .with(Capability::NativeBuffer)
        .with(Capability::NativeMove);

    /// Create a new empty in-memory filesystem
    pub fn new() -> Self {
        Self::with_capabilities(Self::DEFAULT_CAPABILITIES)
    }

    /// Create an empty filesystem exposing exactly `capabilities`
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            tree: Arc::new(RwLock::new(Node::empty_dir())),
            capabilities,
        }
    }

    /// Create with initial file contents (parents are created as needed)
    ///
    /// Fails on the first entry that conflicts with an earlier one, such as a
    /// file seeded below another file.
    pub fn with_files<P, C>(files: impl IntoIterator<Item = (P, C)>) -> FsResult<Self>
    where
        P: AsRef<str>,
        C: AsRef<[u8]>,
    {
        let fs = Self::new();
        {
            let mut tree = fs.write_tree("/")?;
            for (file, content) in files {
                let file = path::normalize(file.as_ref());
                if let Some(parent) = path::parent(&file) {
                    make_dirs(&mut tree, parent)?;
                }
                insert_file(&mut tree, &file, content.as_ref().to_vec())?;
            }
        }
        Ok(fs)
    }

    fn expose(&self, capability: Capability, operation: &str) -> FsResult<()> {
        if self.capabilities.contains(capability) {
            Ok(())
        } else {
            Err(FsError::not_implemented(operation))
        }
    }

    fn read_tree(&self, path: &str) -> FsResult<RwLockReadGuard<'_, Node>> {
        self.tree.read().map_err(|_| poisoned(path))
    }

    fn write_tree(&self, path: &str) -> FsResult<RwLockWriteGuard<'_, Node>> {
        self.tree.write().map_err(|_| poisoned(path))
    }

    fn read_data(&self, path: &str) -> FsResult<Vec<u8>> {
        let tree = self.read_tree(path)?;
        match lookup(&tree, path) {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            Some(Node::Directory(_)) => Err(FsError::IsDirectory(path.to_string())),
            None => Err(FsError::NotFound(path.to_string())),
        }
    }
}

fn poisoned(path: &str) -> FsError {
    FsError::Io {
        path: path.to_string(),
        source: io::Error::other("lock poisoned"),
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn lookup<'a>(root: &'a Node, path: &str) -> Option<&'a Node> {
    segments(path).try_fold(root, |node, name| match node {
        Node::Directory(children) => children.get(name),
        Node::File { .. } => None,
    })
}

fn child_mut<'a>(node: &'a mut Node, name: &str) -> Option<&'a mut Node> {
    match node {
        Node::Directory(children) => children.get_mut(name),
        Node::File { .. } => None,
    }
}

/// Children map of `path`'s parent plus `path`'s own name
///
/// A missing or non-directory parent means `path` cannot exist: `NotFound`.
fn parent_of<'a, 'p>(
    root: &'a mut Node,
    path: &'p str,
) -> FsResult<(&'a mut BTreeMap<String, Node>, &'p str)> {
    let missing = || FsError::NotFound(path.to_string());
    let parent = path::parent(path).ok_or_else(missing)?;
    let mut node = root;
    for name in segments(parent) {
        node = child_mut(node, name).ok_or_else(missing)?;
    }
    match node {
        Node::Directory(children) => Ok((children, path::basename(path))),
        Node::File { .. } => Err(missing()),
    }
}

fn insert_file(root: &mut Node, path: &str, data: Vec<u8>) -> FsResult<()> {
    if path == "/" {
        return Err(FsError::IsDirectory(path.to_string()));
    }
    let (children, name) = parent_of(root, path)?;
    if let Some(Node::Directory(_)) = children.get(name) {
        return Err(FsError::IsDirectory(path.to_string()));
    }
    children.insert(
        name.to_string(),
        Node::File {
            data,
            modified: SystemTime::now(),
        },
    );
    Ok(())
}

fn dir_entry<'a>(node: &'a mut Node, name: &str) -> Option<&'a mut Node> {
    match node {
        Node::Directory(children) => Some(
            children
                .entry(name.to_string())
                .or_insert_with(Node::empty_dir),
        ),
        Node::File { .. } => None,
    }
}

fn make_dirs(root: &mut Node, path: &str) -> FsResult<()> {
    let mut node = root;
    let mut current = String::new();
    for name in segments(path) {
        current.push('/');
        current.push_str(name);
        node = dir_entry(node, name).ok_or_else(|| FsError::AlreadyExists(current.clone()))?;
        if let Node::File { .. } = node {
            return Err(FsError::AlreadyExists(current));
        }
    }
    Ok(())
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn metadata(&self, path: &str) -> FsResult<Metadata> {
        let tree = self.read_tree(path)?;
        lookup(&tree, path)
            .map(|node| node.describe(path::basename(path)))
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    async fn list(&self, path: &str) -> FsResult<Vec<Metadata>> {
        let tree = self.read_tree(path)?;
        match lookup(&tree, path) {
            Some(Node::Directory(children)) => Ok(children
                .iter()
                .map(|(name, node)| node.describe(name))
                .collect()),
            Some(Node::File { .. }) => Err(FsError::NotDirectory(path.to_string())),
            None => Err(FsError::NotFound(path.to_string())),
        }
    }

    async fn mkdir(&self, path: &str) -> FsResult<()> {
        if path == "/" {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        let mut tree = self.write_tree(path)?;
        let (children, name) = parent_of(&mut tree, path)?;
        if children.contains_key(name) {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        children.insert(name.to_string(), Node::empty_dir());
        Ok(())
    }

    async fn delete(&self, path: &str) -> FsResult<()> {
        if path == "/" {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        let mut tree = self.write_tree(path)?;
        let (children, name) = parent_of(&mut tree, path)?;
        match children.get(name) {
            Some(Node::File { .. }) => {
                children.remove(name);
                Ok(())
            }
            Some(Node::Directory(_)) => Err(FsError::IsDirectory(path.to_string())),
            None => Err(FsError::NotFound(path.to_string())),
        }
    }

    async fn delete_dir(&self, path: &str) -> FsResult<()> {
        if path == "/" {
            return Err(FsError::Logic("cannot delete the root".to_string()));
        }
        let mut tree = self.write_tree(path)?;
        let (children, name) = parent_of(&mut tree, path)?;
        match children.get(name) {
            Some(Node::Directory(entries)) if !entries.is_empty() => {
                Err(FsError::NotEmpty(path.to_string()))
            }
            Some(Node::Directory(_)) => {
                children.remove(name);
                Ok(())
            }
            Some(Node::File { .. }) => Err(FsError::NotDirectory(path.to_string())),
            None => Err(FsError::NotFound(path.to_string())),
        }
    }

    async fn delete_recursive(&self, path: &str) -> FsResult<()> {
        self.expose(Capability::DeleteRecursive, "delete_recursive")?;
        if path == "/" {
            return Err(FsError::Logic("cannot delete the root".to_string()));
        }
        let mut tree = self.write_tree(path)?;
        let (children, name) = parent_of(&mut tree, path)?;
        children
            .remove(name)
            .map(drop)
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    async fn mkdir_recursive(&self, path: &str) -> FsResult<()> {
        self.expose(Capability::MkdirRecursive, "mkdir_recursive")?;
        let mut tree = self.write_tree(path)?;
        make_dirs(&mut tree, path)
    }

    async fn rename(&self, src: &str, dest: &str) -> FsResult<()> {
        if src == "/" || dest == "/" || src == dest || path::is_within(src, dest) {
            return Err(FsError::Logic(format!("cannot move {src} to {dest}")));
        }
        let mut tree = self.write_tree(src)?;
        if lookup(&tree, src).is_none() {
            return Err(FsError::NotFound(src.to_string()));
        }
        {
            let (children, name) = parent_of(&mut tree, dest)?;
            if children.contains_key(name) {
                return Err(FsError::AlreadyExists(dest.to_string()));
            }
        }
        let (children, name) = parent_of(&mut tree, src)?;
        let node = children
            .remove(name)
            .ok_or_else(|| FsError::NotFound(src.to_string()))?;
        let (children, name) = parent_of(&mut tree, dest)?;
        children.insert(name.to_string(), node);
        Ok(())
    }

    async fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        self.expose(Capability::NativeBuffer, "read_file")?;
        self.read_data(path)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> FsResult<()> {
        self.expose(Capability::NativeBuffer, "write_file")?;
        let mut tree = self.write_tree(path)?;
        insert_file(&mut tree, path, data.to_vec())
    }

    async fn open_read(&self, path: &str) -> FsResult<Box<dyn ReadHandle>> {
        self.expose(Capability::NativeStream, "open_read")?;
        let data = self.read_data(path)?;
        Ok(Box::new(MemoryReadHandle::new(data)))
    }

    async fn open_write(&self, path: &str) -> FsResult<Box<dyn WriteHandle>> {
        self.expose(Capability::NativeStream, "open_write")?;
        {
            let mut tree = self.write_tree(path)?;
            if path == "/" {
                return Err(FsError::IsDirectory(path.to_string()));
            }
            let (children, name) = parent_of(&mut tree, path)?;
            if let Some(Node::Directory(_)) = children.get(name) {
                return Err(FsError::IsDirectory(path.to_string()));
            }
        }
        Ok(Box::new(MemoryWriteHandle::new(
            path.to_string(),
            self.tree.clone(),
        )))
    }
}

/// In-memory read handle
struct MemoryReadHandle {
    data: Vec<u8>,
    offset: usize,
}

impl MemoryReadHandle {
    const fn new(data: Vec<u8>) -> Self {
        Self { data, offset: 0 }
    }
}

#[async_trait]
impl ReadHandle for MemoryReadHandle {
    async fn read_chunk(&mut self) -> FsResult<ReadChunk> {
        const CHUNK_SIZE: usize = 64 * 1024;
        let remaining = self.data.len().saturating_sub(self.offset);
        let chunk_size = remaining.min(CHUNK_SIZE);

        let chunk = ReadChunk {
            data: self.data[self.offset..self.offset + chunk_size].to_vec(),
            offset: self.offset as u64,
            is_last: self.offset + chunk_size >= self.data.len(),
        };
        self.offset += chunk_size;
        Ok(chunk)
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    async fn close(&mut self) -> FsResult<()> {
        Ok(())
    }
}

/// In-memory write handle; the file appears on close
struct MemoryWriteHandle {
    path: String,
    buffer: Vec<u8>,
    tree: Tree,
    closed: bool,
}

impl MemoryWriteHandle {
    const fn new(path: String, tree: Tree) -> Self {
        Self {
            path,
            buffer: Vec::new(),
            tree,
            closed: false,
        }
    }
}

#[async_trait]
impl WriteHandle for MemoryWriteHandle {
    async fn write_chunk(&mut self, data: &[u8]) -> FsResult<()> {
        if self.closed {
            return Err(FsError::Logic(format!("write after close: {}", self.path)));
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Commits once; later calls are no-ops
    async fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        let mut tree = self.tree.write().map_err(|_| poisoned(&self.path))?;
        insert_file(&mut tree, &self.path, self.buffer.clone())?;
        self.closed = true;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.buffer.len() as u64
    }
}
