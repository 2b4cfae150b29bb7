//! Core domain types, errors, and configuration for `datavault`.
//!
//! Every other crate in the workspace builds on the pieces defined here.
//!
//! ## Key Components
//!
//! - **`errors`**: The `Error` enum and `Result` alias shared by every storage
//!   driver, codec and cache, together with the classification helpers the
//!   fallback paths rely on.
//! - **`dataset`** / **`record`**: The unit of storage and the structured entries
//!   it carries.
//! - **`validation`**: Dataset ID and file path checks, plus the sanitizer used
//!   for anything caller-controlled that ends up in a log line.
//! - **`config`**: Backend selection and tuning knobs, with builders.
//! - **`constants`**: Shared limits and defaults.

pub mod config;
pub mod constants;
pub mod dataset;
pub mod errors;
pub mod record;
pub mod validation;

pub use self::{
    config::{
        BackendConfig, CodecConfig, MemoryThresholds, RemoteConfig, ResultCacheConfig,
        ResultCacheConfigBuilder, StorageConfig, StorageConfigBuilder,
    },
    constants::*,
    dataset::Dataset,
    errors::{Error, Result, ResultExt},
    record::{Record, RoleOverallScore},
    validation::{sanitize_for_logging, validate_and_join_path, validate_file_name, validate_id},
};
