//! The uniform filesystem API
//!
//! `AnyFs` binds one adapter, a path resolver and the dispatch table built
//! from the adapter's capabilities. It holds no other state; clones share
//! the same adapter.

use std::fmt;
use std::sync::Arc;

use crate::backend::{Adapter, Metadata, ReadHandle, WriteHandle};
use crate::capability::{Capabilities, Capability};
use crate::compose::Composer;
use crate::config::{ConfigError, FsOptions, MissingPolicy};
use crate::error::{FsError, FsResult};
use crate::path::PathResolver;
use crate::plugin::{OperationTable, Plugin, PluginRegistry};

struct Inner {
    adapter: Arc<dyn Adapter>,
    resolver: PathResolver,
    capabilities: Capabilities,
    table: OperationTable,
    plugins: Vec<&'static str>,
    ignore_missing: bool,
}

/// Filesystem facade over a single adapter
#[derive(Clone)]
pub struct AnyFs {
    inner: Arc<Inner>,
}

impl fmt::Debug for AnyFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyFs")
            .field("cwd", &self.inner.resolver.cwd())
            .field("root", &self.inner.resolver.root())
            .field("capabilities", &self.inner.capabilities)
            .field("plugins", &self.inner.plugins)
            .finish_non_exhaustive()
    }
}

impl AnyFs {
    /// Facade with default options and the standard plugin set
    pub fn new(adapter: Arc<dyn Adapter>) -> Result<Self, ConfigError> {
        Self::builder(adapter).build()
    }

    pub fn builder(adapter: Arc<dyn Adapter>) -> AnyFsBuilder {
        AnyFsBuilder {
            adapter,
            options: FsOptions::default(),
            plugins: PluginRegistry::standard(),
        }
    }

    fn composer(&self) -> Composer<'_> {
        Composer::new(
            &self.inner.adapter,
            &self.inner.table,
            self.inner.resolver.root(),
            self.inner.ignore_missing,
        )
    }

    /// Resolve path segments to the absolute path handed to the adapter
    pub fn resolve<I, S>(&self, segments: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.resolver.resolve(segments)
    }

    fn resolve_one(&self, path: &str) -> String {
        self.inner.resolver.resolve_one(path)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.inner.capabilities
    }

    /// Names of the plugins attached at construction
    pub fn plugins(&self) -> &[&'static str] {
        &self.inner.plugins
    }

    /// Whether some plugin provides `operation`
    pub fn supports(&self, operation: &str) -> bool {
        self.inner.table.contains(operation)
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.inner.adapter
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Metadata & directories
    // ─────────────────────────────────────────────────────────────────────────

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn metadata(&self, path: &str) -> FsResult<Metadata> {
        let path = self.resolve_one(path);
        self.composer().metadata(&path).await
    }

    /// `metadata` as a boolean; only `ENOENT` counts as absent
    pub async fn exists(&self, path: &str) -> FsResult<bool> {
        match self.metadata(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Directory children, sorted by name
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn list(&self, path: &str) -> FsResult<Vec<Metadata>> {
        let path = self.resolve_one(path);
        self.composer().list(&path).await
    }

    /// Create one directory; existing directories and the root are a no-op
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn mkdir(&self, path: &str) -> FsResult<()> {
        let path = self.resolve_one(path);
        self.composer().mkdir(&path).await
    }

    /// Create a directory and any missing ancestors
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn mkdir_parents(&self, path: &str) -> FsResult<()> {
        let path = self.resolve_one(path);
        self.composer().mkdir_parents(&path).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Removal
    // ─────────────────────────────────────────────────────────────────────────

    /// Remove a single file
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn delete(&self, path: &str) -> FsResult<()> {
        let path = self.resolve_one(path);
        self.composer().delete(&path).await
    }

    /// Remove a single empty directory
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn delete_dir(&self, path: &str) -> FsResult<()> {
        let path = self.resolve_one(path);
        self.composer().delete_dir(&path).await
    }

    /// Remove a file or a directory with everything below it
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn delete_recursive(&self, path: &str) -> FsResult<()> {
        let path = self.resolve_one(path);
        self.composer().delete_recursive(&path).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Move / copy / walk
    // ─────────────────────────────────────────────────────────────────────────

    /// Move `src` to `dest`; never overwrites, creates the destination parent
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn move_path(&self, src: &str, dest: &str) -> FsResult<()> {
        let src = self.resolve_one(src);
        let dest = self.resolve_one(dest);
        self.composer().move_path(&src, &dest).await
    }

    /// Recursively copy `src` to `dest` (requires the `tree` plugin)
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn copy(&self, src: &str, dest: &str) -> FsResult<()> {
        let src = self.resolve_one(src);
        let dest = self.resolve_one(dest);
        self.composer().copy(&src, &dest).await
    }

    /// Every node below `path` in pre-order (requires the `tree` plugin)
    ///
    /// Returned paths are absolute in the caller's namespace, so they can be
    /// passed straight back to this facade.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn walk(&self, path: &str) -> FsResult<Vec<(String, Metadata)>> {
        let path = self.resolve_one(path);
        self.composer().walk(&path).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Content
    // ─────────────────────────────────────────────────────────────────────────

    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn read_file(&self, path: &str) -> FsResult<Vec<u8>> {
        let path = self.resolve_one(path);
        self.composer().read_file(&path).await
    }

    /// Read a file as UTF-8 text
    pub async fn read_to_string(&self, path: &str) -> FsResult<String> {
        let data = self.read_file(path).await?;
        String::from_utf8(data).map_err(|e| FsError::InvalidData(format!("{path}: {e}")))
    }

    /// Write a whole file, creating missing parent directories
    #[tracing::instrument(skip(self, data), level = "debug")]
    pub async fn write_file(&self, path: &str, data: impl AsRef<[u8]> + Send + Sync) -> FsResult<()> {
        let path = self.resolve_one(path);
        self.composer().write_file(&path, data.as_ref()).await
    }

    /// Open a read stream; errors from the backend arrive through the handle
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn create_read_stream(&self, path: &str) -> FsResult<Box<dyn ReadHandle>> {
        let path = self.resolve_one(path);
        self.composer().open_read(&path).await
    }

    /// Open a write stream; prepared like `write_file`, stored on close
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn create_write_stream(&self, path: &str) -> FsResult<Box<dyn WriteHandle>> {
        let path = self.resolve_one(path);
        self.composer().open_write(&path).await
    }
}

/// Builder for [`AnyFs`]
pub struct AnyFsBuilder {
    adapter: Arc<dyn Adapter>,
    options: FsOptions,
    plugins: PluginRegistry,
}

impl AnyFsBuilder {
    #[must_use]
    pub fn options(mut self, options: FsOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<String>) -> Self {
        self.options.cwd = cwd.into();
        self
    }

    #[must_use]
    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.options.root = root.into();
        self
    }

    #[must_use]
    pub const fn missing(mut self, policy: MissingPolicy) -> Self {
        self.options.missing = policy;
        self
    }

    /// Replace the plugin set (the default is [`PluginRegistry::standard`])
    #[must_use]
    pub fn plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    /// Add one plugin to the current set
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Result<Self, ConfigError> {
        self.plugins.register(plugin)?;
        Ok(self)
    }

    /// Validate options, read capabilities and build the dispatch table
    pub fn build(self) -> Result<AnyFs, ConfigError> {
        let resolver = self.options.resolver()?;
        let capabilities = self.adapter.capabilities();
        let table = self.plugins.build_table(capabilities);
        let ignore_missing = match self.options.missing {
            MissingPolicy::Strict => false,
            MissingPolicy::Ignore => true,
            MissingPolicy::Backend => capabilities.contains(Capability::DeleteIgnoreMissing),
        };
        let plugins = self.plugins.names();

        tracing::debug!(
            ?capabilities,
            ?plugins,
            cwd = resolver.cwd(),
            root = resolver.root(),
            ignore_missing,
            "filesystem facade ready"
        );

        Ok(AnyFs {
            inner: Arc::new(Inner {
                adapter: self.adapter,
                resolver,
                capabilities,
                table,
                plugins,
                ignore_missing,
            }),
        })
    }
}
