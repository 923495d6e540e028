//! Error types for file handlers.
//!
//! Uses [`exn`] for automatic location tracking and error tree construction.

use derive_more::{Display, Error};

/// A handler error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for handler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a handler failure.
///
/// Either way the source file is left where it was.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// An external converter could not be run or exited unsuccessfully.
    #[display("conversion failed")]
    Conversion,
    /// Copying, persisting or removing a file failed.
    #[display("storage operation failed")]
    Storage,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
