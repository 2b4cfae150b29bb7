//! Classification helpers used by the fallback paths

use super::types::Error;

impl Error {
    /// Whether a caller may recover by falling back to another path.
    ///
    /// Encoding and decoding failures always recover through the plain
    /// textual path. Unavailable backends recover when a fallback driver is
    /// configured. A decompression bomb never does.
    #[must_use]
    pub const fn is_fallback_recoverable(&self) -> bool {
        matches!(
            self,
            Self::EncodingFailure { .. }
                | Self::DecodingFailure { .. }
                | Self::BackendUnavailable { .. }
        )
    }

    /// Check if this error must be surfaced without any fallback attempt
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::DecompressionBomb { .. })
    }

    /// Check if this error is a missing dataset
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is transient and the operation could succeed later
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. } | Self::Timeout { .. })
    }
}
