//! Builder methods for creating errors with context

use super::types::{BoxError, Error};
use std::path::PathBuf;
use std::time::Duration;

impl Error {
    /// Create a not-found error
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Error::NotFound { id: id.into() }
    }

    /// Create an invalid ID error
    #[must_use]
    pub fn invalid_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create an encoding failure for the given stage
    #[must_use]
    pub fn encoding(stage: &'static str, source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Error::EncodingFailure {
            stage,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create an encoding failure without an underlying source
    #[must_use]
    pub fn encoding_message(stage: &'static str, message: impl Into<String>) -> Self {
        Error::EncodingFailure {
            stage,
            message: message.into(),
            source: None,
        }
    }

    /// Create a decoding failure for the given stage
    #[must_use]
    pub fn decoding(stage: &'static str, source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Error::DecodingFailure {
            stage,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a decoding failure without an underlying source
    #[must_use]
    pub fn decoding_message(stage: &'static str, message: impl Into<String>) -> Self {
        Error::DecodingFailure {
            stage,
            message: message.into(),
            source: None,
        }
    }

    /// Create a decompression bomb error
    #[must_use]
    pub fn decompression_bomb(limit: u64) -> Self {
        Error::DecompressionBomb { limit }
    }

    /// Create a backend unavailable error
    #[must_use]
    pub fn backend_unavailable(backend: &'static str, message: impl Into<String>) -> Self {
        Error::BackendUnavailable {
            backend,
            message: message.into(),
            source: None,
        }
    }

    /// Create a backend unavailable error with a source error
    #[must_use]
    pub fn backend_unavailable_with_source(
        backend: &'static str,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::BackendUnavailable {
            backend,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a file system error
    #[must_use]
    pub fn io(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::Io {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }
}
