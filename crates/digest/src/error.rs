//! Digest Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A digest error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for digest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The file disappeared before (or while) it could be read.
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// The file exists but cannot be opened for reading.
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Reading the stream failed part-way through.
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// The string is not a digest produced by any supported algorithm.
    #[display("invalid digest: {_0}")]
    InvalidDigest(#[error(not(source))] String),
    #[display("unknown hash algorithm: {_0}")]
    UnknownAlgorithm(#[error(not(source))] String),
    /// The blocking hashing task panicked or was cancelled.
    #[display("hashing task failed")]
    Join,
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    pub(crate) fn from_io(err: IoError, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.into()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.into()),
            _ => Self::Io(err),
        }
    }

    /// Returns `true` if the file vanished between discovery and hashing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Join)
    }
}
