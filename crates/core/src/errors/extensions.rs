//! Extension traits for error handling

use super::types::{Error, Result};

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a lazy message
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| prefix(e, message.into()))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| prefix(e, f()))
    }
}

// Only free-form messages are rewritten; structured variants keep their shape
// so callers can still match on them.
fn prefix(error: Error, context: String) -> Error {
    match error {
        Error::Configuration { message } => Error::Configuration {
            message: format!("{context}: {message}"),
        },
        Error::BackendUnavailable {
            backend,
            message,
            source,
        } => Error::BackendUnavailable {
            backend,
            message: format!("{context}: {message}"),
            source,
        },
        other => other,
    }
}
