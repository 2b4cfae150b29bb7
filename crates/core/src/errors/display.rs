//! Display implementations for error types

use super::types::Error;
use crate::validation::sanitize_for_logging;
use std::fmt;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound { id } => {
                write!(f, "dataset '{}' not found", sanitize_for_logging(id))
            }
            Error::InvalidId { id, reason } => {
                write!(
                    f,
                    "invalid dataset ID '{}': {reason}",
                    sanitize_for_logging(id)
                )
            }
            Error::EncodingFailure { stage, message, .. } => {
                write!(f, "encoding failed during {stage}: {message}")
            }
            Error::DecodingFailure { stage, message, .. } => {
                write!(f, "decoding failed during {stage}: {message}")
            }
            Error::DecompressionBomb { limit } => {
                write!(
                    f,
                    "decompressed data exceeds the {limit} byte limit, refusing to continue"
                )
            }
            Error::BackendUnavailable {
                backend, message, ..
            } => {
                write!(f, "{backend} backend unavailable: {message}")
            }
            Error::Timeout {
                operation,
                duration,
            } => {
                write!(f, "operation '{operation}' timed out after {duration:?}")
            }
            Error::Io {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "file system {} operation failed for '{}': {}",
                    operation,
                    path.display(),
                    source
                )
            }
            Error::Configuration { message } => {
                write!(f, "configuration error: {message}")
            }
        }
    }
}
