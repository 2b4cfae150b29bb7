//! Interchangeable dataset storage drivers.
//!
//! Every medium implements the same [`Storage`] contract, so callers never
//! know which one they are talking to:
//!
//! - [`MemoryStorage`]: process memory, lost on restart.
//! - [`LocalFileStorage`]: one gzip-compressed JSON file per dataset.
//! - [`RemoteObjectStorage`]: an S3-compatible bucket with a fallback driver
//!   for when the bucket cannot be reached.
//! - [`HybridStorage`]: memory in front of local files, write-through.
//! - [`BinaryCodecStorage`]: decorates any driver with a compact binary form
//!   that degrades to the plain form on any failure.
//!
//! [`create_storage`] picks and assembles a driver from a [`StorageConfig`].

pub mod binary_codec;
pub mod deadline;
pub mod factory;
pub mod hybrid;
pub mod local;
pub mod memory;
pub mod remote;
pub mod traits;

pub use binary_codec::{is_binary_carrier, BinaryCodecStorage, FallbackReason};
pub use datavault_core::{Dataset, Error, Record, Result, StorageConfig};
pub use deadline::{DeadlineStorage, StorageExt};
pub use factory::create_storage;
pub use hybrid::HybridStorage;
pub use local::LocalFileStorage;
pub use memory::MemoryStorage;
pub use remote::{RemoteObjectStorage, RemoteStorageBuilder};
pub use traits::Storage;
