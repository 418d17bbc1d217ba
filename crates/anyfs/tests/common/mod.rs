//! Common test utilities
#![allow(dead_code)] // Helpers may not be used in all test files

pub mod trace;

pub use trace::TraceAdapter;
