//! Converter Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::time::Duration;

/// A converter error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for converter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The executable could not be found on `PATH`. Install it or point the
    /// configuration at it.
    #[display("converter not found: {_0}")]
    ToolNotFound(#[error(not(source))] String),
    /// The process ran and exited with a non-zero status.
    #[display("{program} exited with code {code}")]
    Failed { program: String, code: i32 },
    /// The process was terminated by a signal.
    #[display("{_0} was killed by a signal")]
    Killed(#[error(not(source))] String),
    #[display("{program} did not finish within {:?}", after)]
    Timeout { program: String, after: Duration },
    /// Spawning or talking to the process failed.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// The converter is shutting down and no longer accepts work.
    Shutdown,
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Killed(_) | Self::Io(_))
    }
}
