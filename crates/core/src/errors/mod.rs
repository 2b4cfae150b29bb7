//! Error types and result extensions for datavault operations

mod builders;
mod conversions;
mod display;
mod extensions;
mod recovery;
mod types;

pub use extensions::*;
pub use types::{BoxError, Error, Result};
