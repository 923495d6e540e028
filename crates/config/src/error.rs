//! Config Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every variant means the operator has to fix their configuration; none of
/// them are retryable.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// An explicitly requested configuration file does not exist.
    #[display("config file not found: {}", _0.display())]
    FileNotFound(#[error(not(source))] PathBuf),
    /// The merged configuration could not be deserialized.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    #[display("no watched root configured (set `root`, FOLDERSORT_ROOT or FOLDER_PATH)")]
    MissingRoot,
    #[display("watched root must be an absolute path: {}", _0.display())]
    RootNotAbsolute(#[error(not(source))] PathBuf),
    #[display("watched root is not an existing directory: {}", _0.display())]
    RootNotDirectory(#[error(not(source))] PathBuf),
    /// A target directory name is empty, nested, or escapes the root.
    #[display("invalid target directory name: {_0}")]
    InvalidDirectory(#[error(not(source))] String),
    /// Two handlers (or a handler and the duplicates folder) share a directory.
    #[display("target directory used more than once: {_0}")]
    DuplicateDirectory(#[error(not(source))] String),
    #[display("invalid value for `{field}`: {reason}")]
    OutOfRange { field: &'static str, reason: &'static str },
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
