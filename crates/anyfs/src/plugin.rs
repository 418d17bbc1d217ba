//! Operation plugins and the dispatch table
//!
//! A plugin is a named bundle of operations. When a facade is built every
//! registered plugin writes a route for each of its operations into the
//! facade's [`OperationTable`], based on the adapter's capabilities. The
//! table never changes afterwards; an operation without a route answers
//! `NotImplemented`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::capability::{Capabilities, Capability};
use crate::config::ConfigError;
use crate::error::{FsError, FsResult};

/// Operation names used as dispatch keys
pub mod ops {
    pub const METADATA: &str = "metadata";
    pub const LIST: &str = "list";
    pub const MKDIR: &str = "mkdir";
    pub const MKDIR_PARENTS: &str = "mkdir_parents";
    pub const DELETE: &str = "delete";
    pub const DELETE_DIR: &str = "delete_dir";
    pub const DELETE_RECURSIVE: &str = "delete_recursive";
    pub const MOVE: &str = "move";
    pub const READ_FILE: &str = "read_file";
    pub const WRITE_FILE: &str = "write_file";
    pub const READ_STREAM: &str = "read_stream";
    pub const WRITE_STREAM: &str = "write_stream";
    pub const COPY: &str = "copy";
    pub const WALK: &str = "walk";
}

/// How the facade carries out one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Delegate to the adapter's own implementation
    Native,
    /// Run the fallback built from primitives
    Composed,
}

/// Operation name → route, fixed at facade construction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationTable {
    routes: BTreeMap<&'static str, Route>,
}

impl OperationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, operation: &'static str, route: Route) {
        if let Some(previous) = self.routes.insert(operation, route) {
            if previous != route {
                tracing::warn!(operation, ?previous, ?route, "operation route overridden");
            }
        }
    }

    /// Route for `operation`, or `NotImplemented` when no plugin provides it
    pub fn route(&self, operation: &str) -> FsResult<Route> {
        self.routes
            .get(operation)
            .copied()
            .ok_or_else(|| FsError::not_implemented(operation))
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.routes.contains_key(operation)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Route)> + '_ {
        self.routes.iter().map(|(op, route)| (*op, *route))
    }
}

/// A named bundle of operations attached to a facade at construction
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Record a route for every operation this plugin provides
    fn register(&self, table: &mut OperationTable, capabilities: Capabilities);
}

/// Ordered set of plugins handed to the facade builder
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl PluginRegistry {
    /// Registry with no plugins at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the core operation suite
    pub fn standard() -> Self {
        Self {
            plugins: vec![Arc::new(CorePlugin)],
        }
    }

    /// Add a plugin; names must be unique
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> Result<(), ConfigError> {
        if self.plugins.iter().any(|p| p.name() == plugin.name()) {
            return Err(ConfigError::DuplicatePlugin(plugin.name().to_string()));
        }
        self.plugins.push(plugin);
        Ok(())
    }

    /// Builder-style `register`
    pub fn with(mut self, plugin: Arc<dyn Plugin>) -> Result<Self, ConfigError> {
        self.register(plugin)?;
        Ok(self)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    /// Build the dispatch table for an adapter with `capabilities`
    pub fn build_table(&self, capabilities: Capabilities) -> OperationTable {
        let mut table = OperationTable::new();
        for plugin in &self.plugins {
            plugin.register(&mut table, capabilities);
        }
        table
    }
}

fn native_if(capabilities: Capabilities, capability: Capability) -> Route {
    if capabilities.contains(capability) {
        Route::Native
    } else {
        Route::Composed
    }
}

/// Content I/O route: native when the shape is exposed, bridged when only
/// the other shape is, absent when neither is
fn io_route(capabilities: Capabilities, own: Capability, other: Capability) -> Option<Route> {
    if capabilities.contains(own) {
        Some(Route::Native)
    } else if capabilities.contains(other) {
        Some(Route::Composed)
    } else {
        None
    }
}

/// Standard operation suite
#[derive(Debug, Clone, Copy, Default)]
pub struct CorePlugin;

impl Plugin for CorePlugin {
    fn name(&self) -> &'static str {
        "core"
    }

    fn register(&self, table: &mut OperationTable, capabilities: Capabilities) {
        for op in [
            ops::METADATA,
            ops::LIST,
            ops::MKDIR,
            ops::DELETE,
            ops::DELETE_DIR,
            ops::MOVE,
        ] {
            table.insert(op, Route::Native);
        }
        table.insert(
            ops::MKDIR_PARENTS,
            native_if(capabilities, Capability::MkdirRecursive),
        );
        table.insert(
            ops::DELETE_RECURSIVE,
            native_if(capabilities, Capability::DeleteRecursive),
        );

        let buffer = (Capability::NativeBuffer, Capability::NativeStream);
        let stream = (Capability::NativeStream, Capability::NativeBuffer);
        for (op, (own, other)) in [
            (ops::READ_FILE, buffer),
            (ops::WRITE_FILE, buffer),
            (ops::READ_STREAM, stream),
            (ops::WRITE_STREAM, stream),
        ] {
            if let Some(route) = io_route(capabilities, own, other) {
                table.insert(op, route);
            }
        }
    }
}

/// Whole-tree helpers: `copy` and `walk`
#[derive(Debug, Clone, Copy, Default)]
pub struct TreePlugin;

impl Plugin for TreePlugin {
    fn name(&self) -> &'static str {
        "tree"
    }

    fn register(&self, table: &mut OperationTable, _capabilities: Capabilities) {
        table.insert(ops::COPY, Route::Composed);
        table.insert(ops::WALK, Route::Composed);
    }
}
