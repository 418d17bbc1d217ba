//! Uniform filesystem facade over pluggable storage adapters
//!
//! An [`Adapter`] implements a small set of primitives and declares which
//! higher-level operations it can do natively. [`AnyFs`] exposes the full
//! operation set and composes whatever the adapter lacks from its primitives.

pub mod backend;
pub mod callback;
pub mod capability;
mod compose;
pub mod config;
pub mod error;
pub mod facade;
pub mod local;
pub mod memory;
pub mod path;
pub mod plugin;
pub mod stream;

pub use backend::{Adapter, Metadata, ReadChunk, ReadHandle, WriteHandle};
pub use callback::Completion;
pub use capability::{Capabilities, Capability};
pub use config::{ConfigError, FsOptions, MissingPolicy};
pub use error::{FsError, FsResult};
pub use facade::{AnyFs, AnyFsBuilder};
pub use local::LocalAdapter;
pub use memory::MemoryAdapter;
pub use path::PathResolver;
pub use plugin::{ops, CorePlugin, OperationTable, Plugin, PluginRegistry, Route, TreePlugin};
pub use stream::{pipe, BufferedReadHandle, BufferedWriteHandle};
