//! Shared utilities for datavault
//!
//! Small pieces used by several crates: crash-safe file writes and the
//! tracing subscriber bootstrap.

pub mod atomic_file;
pub mod tracing;

pub use atomic_file::*;
