//! File records and the handful of filesystem operations foldersort needs:
//! stat, shallow listing, copy-if-absent, move, and staged artifact writes.

pub mod error;
mod file;
mod local;
mod target;

pub use crate::file::{DigestState, Digested, Discovered, FileMeta, FileRecord, extension_of};
pub use crate::local::{Entry, Placement, copy_if_absent, exists, list, move_file, remove, stat};
pub use crate::target::{TargetDir, persist};
pub use tempfile::TempPath;
