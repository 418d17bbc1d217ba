//! Capability-negotiated operation composer
//!
//! For each high-level operation the dispatch table says whether the
//! adapter does it natively. If not, the operation is rebuilt from the
//! primitive contract:
//!
//! - `delete_recursive`: depth-ordered fan-out. Files and same-depth
//!   directories are removed concurrently; a directory's `delete_dir` is
//!   issued only after everything below it has settled. Nothing is
//!   cancelled on failure; the first error to complete is reported.
//! - `mkdir_parents`: walk up to the nearest existing ancestor, then create
//!   the missing directories top-down.
//! - `move`: guard against root/self/descendant moves, refuse to overwrite,
//!   create the destination parent, then hand over to the `rename` primitive.
//! - `write_file`: refuse directories, create missing parents, then write
//!   through whichever content shape the adapter exposes.
//!
//! All walks are loops over explicit work lists; depth never grows the stack.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};

use crate::backend::{Adapter, Metadata, ReadHandle, WriteHandle};
use crate::error::{FsError, FsResult};
use crate::path;
use crate::plugin::{ops, OperationTable, Route};
use crate::stream::{self, BufferedReadHandle, BufferedWriteHandle};

/// Directory tree discovered below a starting directory
struct Tree {
    /// Directories grouped by depth; `levels[0]` holds the starting directory
    levels: Vec<Vec<String>>,
    files: Vec<String>,
}

/// Per-call view of a facade: adapter, routes, anchor and delete policy
pub(crate) struct Composer<'a> {
    adapter: &'a Arc<dyn Adapter>,
    table: &'a OperationTable,
    root: &'a str,
    ignore_missing: bool,
}

impl<'a> Composer<'a> {
    pub(crate) const fn new(
        adapter: &'a Arc<dyn Adapter>,
        table: &'a OperationTable,
        root: &'a str,
        ignore_missing: bool,
    ) -> Self {
        Self {
            adapter,
            table,
            root,
            ignore_missing,
        }
    }

    fn route(&self, operation: &'static str) -> FsResult<Route> {
        let route = self.table.route(operation)?;
        tracing::trace!(operation, ?route, "dispatch");
        Ok(route)
    }

    /// The anchor and everything above it always exist
    fn is_root(&self, path: &str) -> bool {
        path == self.root || path == "/" || path::is_within(path, self.root)
    }

    fn tolerate_missing(&self, result: FsResult<()>) -> FsResult<()> {
        match result {
            Err(e) if self.ignore_missing && e.is_not_found() => Ok(()),
            other => other,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Direct primitives
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) async fn metadata(&self, path: &str) -> FsResult<Metadata> {
        self.route(ops::METADATA)?;
        self.adapter.metadata(path).await
    }

    /// Children sorted by name, whatever order the backend returns
    pub(crate) async fn list(&self, path: &str) -> FsResult<Vec<Metadata>> {
        self.route(ops::LIST)?;
        let mut entries = self.adapter.list(path).await?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Single-level mkdir: root and existing directories are a no-op
    pub(crate) async fn mkdir(&self, path: &str) -> FsResult<()> {
        self.route(ops::MKDIR)?;
        if self.is_root(path) {
            return Ok(());
        }
        self.create_dir(path).await
    }

    /// `mkdir` primitive that accepts a directory created meanwhile
    async fn create_dir(&self, path: &str) -> FsResult<()> {
        match self.adapter.mkdir(path).await {
            Err(e) if e.is_already_exists() => match self.adapter.metadata(path).await {
                Ok(meta) if meta.is_directory => Ok(()),
                _ => Err(e),
            },
            other => other,
        }
    }

    pub(crate) async fn delete(&self, path: &str) -> FsResult<()> {
        self.route(ops::DELETE)?;
        self.guard_delete(path)?;
        self.tolerate_missing(self.adapter.delete(path).await)
    }

    pub(crate) async fn delete_dir(&self, path: &str) -> FsResult<()> {
        self.route(ops::DELETE_DIR)?;
        self.guard_delete(path)?;
        self.tolerate_missing(self.adapter.delete_dir(path).await)
    }

    fn guard_delete(&self, path: &str) -> FsResult<()> {
        if self.is_root(path) {
            return Err(FsError::Logic("cannot delete the root".to_string()));
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Recursive delete
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) async fn delete_recursive(&self, path: &str) -> FsResult<()> {
        let route = self.route(ops::DELETE_RECURSIVE)?;
        self.guard_delete(path)?;
        match route {
            Route::Native => self.tolerate_missing(self.adapter.delete_recursive(path).await),
            Route::Composed => self.remove_tree(path).await,
        }
    }

    async fn remove_tree(&self, path: &str) -> FsResult<()> {
        let meta = match self.adapter.metadata(path).await {
            Ok(meta) => meta,
            Err(e) => return self.tolerate_missing(Err(e)),
        };
        if !meta.is_directory {
            return self.tolerate_missing(self.adapter.delete(path).await);
        }

        let tree = self.scan(path, true).await?;
        let mut failed: Vec<String> = Vec::new();
        let mut first_error: Option<FsError> = None;

        self.fan_out(
            &tree.files,
            |file| self.adapter.delete(file),
            &mut failed,
            &mut first_error,
        )
        .await;

        // Deepest level first: a directory is only removed once every
        // descendant has settled, and skipped if any of them failed.
        for level in tree.levels.iter().rev() {
            let ready: Vec<&String> = level
                .iter()
                .filter(|dir| !failed.iter().any(|f| path::is_within(dir, f)))
                .collect();
            self.fan_out(
                ready,
                |dir| self.adapter.delete_dir(dir),
                &mut failed,
                &mut first_error,
            )
            .await;
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Run `step` on every path concurrently, settling results as they complete
    async fn fan_out<'p, F, Fut>(
        &self,
        paths: impl IntoIterator<Item = &'p String>,
        step: F,
        failed: &mut Vec<String>,
        first_error: &mut Option<FsError>,
    ) where
        F: Fn(&'p str) -> Fut,
        Fut: Future<Output = FsResult<()>>,
    {
        let mut pending: FuturesUnordered<_> = paths
            .into_iter()
            .map(|path| {
                let fut = step(path.as_str());
                async move { (path, fut.await) }
            })
            .collect();
        while let Some((path, result)) = pending.next().await {
            match result {
                Ok(()) => {}
                Err(e) if self.ignore_missing && e.is_not_found() => {}
                Err(e) => {
                    tracing::debug!(path = %path, error = %e, "recursive delete step failed");
                    failed.push(path.clone());
                    first_error.get_or_insert(e);
                }
            }
        }
    }

    /// Breadth-first listing of everything below `dir`
    ///
    /// Each depth is listed concurrently. With `skip_vanished` a directory
    /// removed between discovery and listing is kept with no children;
    /// any other listing error aborts the scan.
    async fn scan(&self, dir: &str, skip_vanished: bool) -> FsResult<Tree> {
        let mut levels = vec![vec![dir.to_string()]];
        let mut files = Vec::new();
        loop {
            let frontier = &levels[levels.len() - 1];
            let listings = join_all(frontier.iter().map(|d| self.adapter.list(d))).await;
            let mut next = Vec::new();
            for (parent, listing) in frontier.iter().zip(listings) {
                let entries = match listing {
                    Ok(entries) => entries,
                    Err(e) if skip_vanished && e.is_not_found() => {
                        tracing::debug!(path = %parent, "directory vanished during scan");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                for entry in entries {
                    let child = path::join(parent, &entry.name);
                    if entry.is_directory {
                        next.push(child);
                    } else {
                        files.push(child);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            levels.push(next);
        }
        Ok(Tree { levels, files })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Recursive mkdir
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) async fn mkdir_parents(&self, path: &str) -> FsResult<()> {
        let route = self.route(ops::MKDIR_PARENTS)?;
        if self.is_root(path) {
            return Ok(());
        }
        match route {
            Route::Native => self.adapter.mkdir_recursive(path).await,
            Route::Composed => self.make_dirs(path).await,
        }
    }

    async fn make_dirs(&self, path: &str) -> FsResult<()> {
        let mut missing = Vec::new();
        let mut current = path;
        while !self.is_root(current) {
            match self.adapter.metadata(current).await {
                Ok(meta) if meta.is_directory => break,
                Ok(_) => return Err(FsError::AlreadyExists(current.to_string())),
                Err(e) if e.is_not_found() => {
                    missing.push(current);
                    match path::parent(current) {
                        Some(parent) => current = parent,
                        None => break,
                    }
                }
                Err(e) => return Err(e),
            }
        }
        for dir in missing.into_iter().rev() {
            self.create_dir(dir).await?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Move / copy
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether the backend renames atomically or copies is its own concern
    pub(crate) async fn move_path(&self, src: &str, dest: &str) -> FsResult<()> {
        self.route(ops::MOVE)?;
        self.guard_transfer(src, dest, "move")?;
        self.prepare_transfer(src, dest).await?;
        self.adapter.rename(src, dest).await
    }

    pub(crate) async fn copy(&self, src: &str, dest: &str) -> FsResult<()> {
        self.route(ops::COPY)?;
        self.guard_transfer(src, dest, "copy")?;
        let meta = self.prepare_transfer(src, dest).await?;
        self.copy_node(src, dest, &meta).await
    }

    fn guard_transfer(&self, src: &str, dest: &str, verb: &str) -> FsResult<()> {
        if src == dest {
            return Err(FsError::Logic(format!("cannot {verb} {src} onto itself")));
        }
        if self.is_root(src) || self.is_root(dest) {
            return Err(FsError::Logic(format!("cannot {verb} the root")));
        }
        if path::is_within(src, dest) {
            return Err(FsError::Logic(format!(
                "cannot {verb} {src} into its own descendant {dest}"
            )));
        }
        Ok(())
    }

    /// Source must exist, destination must not; creates the destination parent
    async fn prepare_transfer(&self, src: &str, dest: &str) -> FsResult<Metadata> {
        let meta = self.adapter.metadata(src).await?;
        match self.adapter.metadata(dest).await {
            Ok(_) => return Err(FsError::AlreadyExists(dest.to_string())),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        if let Some(parent) = path::parent(dest) {
            self.mkdir_parents(parent).await?;
        }
        Ok(meta)
    }

    /// Copy `src` to the absent `dest`, directories level by level
    async fn copy_node(&self, src: &str, dest: &str, meta: &Metadata) -> FsResult<()> {
        if !meta.is_directory {
            return self.copy_file(src, dest).await;
        }
        let tree = self.scan(src, false).await?;
        for level in &tree.levels {
            let results = join_all(
                level
                    .iter()
                    .map(|dir| path::rebase(dir, src, dest))
                    .map(|target| async move { self.create_dir(&target).await }),
            )
            .await;
            results.into_iter().collect::<FsResult<Vec<()>>>()?;
        }
        let results = join_all(
            tree.files
                .iter()
                .map(|file| async move { self.copy_file(file, &path::rebase(file, src, dest)).await }),
        )
        .await;
        results.into_iter().collect::<FsResult<Vec<()>>>()?;
        Ok(())
    }

    async fn copy_file(&self, src: &str, dest: &str) -> FsResult<()> {
        let data = self.fetch(src).await?;
        self.put(dest, &data).await
    }

    /// Pre-order listing of every node below `dir`, paired with its path
    ///
    /// Paths come back in the caller's namespace, ready to feed back in.
    pub(crate) async fn walk(&self, dir: &str) -> FsResult<Vec<(String, Metadata)>> {
        self.route(ops::WALK)?;
        let mut found = Vec::new();
        let mut stack = vec![dir.to_string()];
        while let Some(current) = stack.pop() {
            let entries = self.list(&current).await?;
            let mut subdirs = Vec::new();
            for entry in entries {
                let child = path::join(&current, &entry.name);
                if entry.is_directory {
                    subdirs.push(child.clone());
                }
                found.push((path::rebase(&child, self.root, "/"), entry));
            }
            stack.extend(subdirs.into_iter().rev());
        }
        found.sort_by(|(a, _), (b, _)| a.split('/').cmp(b.split('/')));
        Ok(found)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Content I/O
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) async fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        self.fetch(path).await
    }

    pub(crate) async fn write_file(&self, path: &str, data: &[u8]) -> FsResult<()> {
        self.prepare_write(path).await?;
        self.put(path, data).await
    }

    /// Reject directory targets and create missing parents
    async fn prepare_write(&self, path: &str) -> FsResult<()> {
        if self.is_root(path) {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        match self.adapter.metadata(path).await {
            Ok(meta) if meta.is_directory => Err(FsError::IsDirectory(path.to_string())),
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => match path::parent(path) {
                Some(parent) => self.mkdir_parents(parent).await,
                None => Ok(()),
            },
            Err(e) => Err(e),
        }
    }

    async fn fetch(&self, path: &str) -> FsResult<Vec<u8>> {
        match self.route(ops::READ_FILE)? {
            Route::Native => self.adapter.read_file(path).await,
            Route::Composed => {
                let mut reader = self.adapter.open_read(path).await?;
                stream::read_to_end(reader.as_mut()).await
            }
        }
    }

    async fn put(&self, path: &str, data: &[u8]) -> FsResult<()> {
        match self.route(ops::WRITE_FILE)? {
            Route::Native => self.adapter.write_file(path, data).await,
            Route::Composed => {
                let mut writer = self.adapter.open_write(path).await?;
                stream::write_all(writer.as_mut(), data).await
            }
        }
    }

    pub(crate) async fn open_read(&self, path: &str) -> FsResult<Box<dyn ReadHandle>> {
        match self.route(ops::READ_STREAM)? {
            Route::Native => self.adapter.open_read(path).await,
            Route::Composed => Ok(Box::new(BufferedReadHandle::new(
                Arc::clone(self.adapter),
                path,
            ))),
        }
    }

    pub(crate) async fn open_write(&self, path: &str) -> FsResult<Box<dyn WriteHandle>> {
        let route = self.route(ops::WRITE_STREAM)?;
        self.prepare_write(path).await?;
        match route {
            Route::Native => self.adapter.open_write(path).await,
            Route::Composed => Ok(Box::new(BufferedWriteHandle::new(
                Arc::clone(self.adapter),
                path,
            ))),
        }
    }
}
