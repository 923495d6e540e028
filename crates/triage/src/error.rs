//! Triage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A triage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for triage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a failure. All of them are scoped to a single
/// file except [`ErrorKind::Listing`] and [`ErrorKind::Watch`].
///
/// ### Per-file Errors
/// - [`ErrorKind::Stat`]
/// - [`ErrorKind::Digest`]
/// - [`ErrorKind::Duplicate`]
/// - [`ErrorKind::Handler`]
///
/// ### Setup Errors
/// - [`ErrorKind::Listing`]
/// - [`ErrorKind::Watch`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The file could not be inspected.
    #[display("could not stat {}", _0.display())]
    Stat(#[error(not(source))] PathBuf),
    /// Reading the file for its digest failed.
    #[display("could not digest {}", _0.display())]
    Digest(#[error(not(source))] PathBuf),
    /// Deleting or quarantining a duplicate failed.
    #[display("could not resolve duplicate {}", _0.display())]
    Duplicate(#[error(not(source))] PathBuf),
    /// The handler for the file failed; the source is left in place.
    #[display("{handler} handler failed on {}", path.display())]
    Handler { handler: &'static str, path: PathBuf },
    /// The root could not be listed.
    #[display("could not list {}", _0.display())]
    Listing(#[error(not(source))] PathBuf),
    /// The filesystem watcher could not be installed.
    #[display("could not watch {}", _0.display())]
    Watch(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
