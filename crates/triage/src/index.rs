//! In-memory record of content already seen this run.

use foldersort_digest::ContentDigest;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
    /// First time this content has been seen; it is now recorded.
    New,
    /// The content was already recorded for `first`. `filed` is set once a
    /// handler has successfully filed that content away.
    Duplicate { first: PathBuf, filed: bool },
}

#[derive(Debug)]
struct Seen {
    first: PathBuf,
    filed: bool,
}

/// Digest → first path it was seen at. Grows for the life of the process and
/// is never persisted.
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    seen: Mutex<HashMap<ContentDigest, Seen>>,
}

impl DuplicateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `digest` for `path` unless it is already known.
    ///
    /// Check and insert happen under one lock, so of any number of concurrent
    /// callers with the same digest exactly one gets [`Admission::New`].
    pub fn check_and_record(&self, digest: &ContentDigest, path: &Path) -> Admission {
        // Nothing panics while holding the lock; recover rather than cascade.
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        match seen.entry(digest.clone()) {
            Entry::Occupied(entry) => {
                let seen = entry.get();
                Admission::Duplicate { first: seen.first.clone(), filed: seen.filed }
            },
            Entry::Vacant(entry) => {
                entry.insert(Seen { first: path.to_path_buf(), filed: false });
                Admission::New
            },
        }
    }

    /// Note that a handler has filed `digest` away. Unknown digests are
    /// ignored.
    pub fn mark_filed(&self, digest: &ContentDigest) {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(seen) = seen.get_mut(digest) {
            seen.filed = true;
        }
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
