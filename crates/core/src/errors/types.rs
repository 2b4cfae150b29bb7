//! Core error type definitions

use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for datavault operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed source error carried by codec and backend failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error taxonomy shared by every driver, codec and cache in the workspace
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No dataset is stored under this ID
    NotFound { id: String },

    /// The dataset ID failed validation before any path or key was built
    InvalidId { id: String, reason: String },

    /// Turning a dataset into bytes failed
    EncodingFailure {
        stage: &'static str,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Turning bytes back into a dataset failed
    DecodingFailure {
        stage: &'static str,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Decompressed output exceeded the hard cap
    DecompressionBomb { limit: u64 },

    /// A storage medium could not be reached or rejected the request
    BackendUnavailable {
        backend: &'static str,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The caller's deadline elapsed
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// File system operations
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    Configuration { message: String },
}
