//! Conversion implementations for error types

use super::types::Error;
use std::path::PathBuf;

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        if error.is_data() || error.is_syntax() || error.is_eof() {
            Error::decoding("json", error)
        } else {
            Error::encoding("json", error)
        }
    }
}
