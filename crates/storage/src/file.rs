//! File records handed through the pipeline.
//!
//! A record starts life as [`FileRecord<Discovered>`] (path + stat) and
//! becomes a [`FileRecord<Digested>`] once its content has been hashed.
//! Records are rebuilt for every pipeline run and never cached.

use foldersort_digest::ContentDigest;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Stat-level metadata of a regular file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Lowercase text after the last `.` of the file name; empty if none.
    pub extension: String,
    /// File size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}

mod sealed {
    pub trait Sealed {}
}
pub trait DigestState: sealed::Sealed {
    type Digest;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discovered;
impl sealed::Sealed for Discovered {}
impl DigestState for Discovered {
    type Digest = ();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Digested;
impl sealed::Sealed for Digested {}
impl DigestState for Digested {
    type Digest = ContentDigest;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord<S: DigestState = Discovered> {
    meta: FileMeta,
    pub digest: S::Digest,
}
impl<S: DigestState> Deref for FileRecord<S> {
    type Target = FileMeta;
    fn deref(&self) -> &FileMeta {
        &self.meta
    }
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: OffsetDateTime) -> Self {
        let path = path.into();
        let extension = extension_of(&path);
        FileMeta { path, extension, size, modified }.into()
    }

    pub fn with_digest(self, digest: ContentDigest) -> FileRecord<Digested> {
        FileRecord { meta: self.meta, digest }
    }
}
impl From<FileMeta> for FileRecord<Discovered> {
    fn from(meta: FileMeta) -> Self {
        Self { meta, digest: () }
    }
}

/// Normalized extension of `path`: the text after the last `.` in the file
/// name, lowercased. Empty when the name has no `.` or ends with one.
///
/// Unlike [`Path::extension`], a leading dot counts (`.heic` → `heic`);
/// dropped downloads occasionally lose their stem.
pub fn extension_of(path: &Path) -> String {
    let Some(name) = path.file_name() else {
        return String::new();
    };
    match name.to_string_lossy().rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foldersort_digest::{HashAlgorithm, digest_bytes};
    use rstest::rstest;

    #[rstest]
    #[case("/inbox/photo.PNG", "png")]
    #[case("/inbox/photo.Jpg", "jpg")]
    #[case("/inbox/archive.tar.BZ2", "bz2")]
    #[case("/inbox/README", "")]
    #[case("/inbox/trailing.", "")]
    #[case("/inbox/.heic", "heic")]
    #[case("/inbox/dir.d/noext", "")]
    #[case("/", "")]
    fn test_extension_of(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(extension_of(Path::new(path)), expected);
    }

    #[test]
    fn test_typestate_transition() {
        let record = FileRecord::new("/inbox/clip.MOV", 42, OffsetDateTime::UNIX_EPOCH);
        assert_eq!(record.extension, "mov");
        assert_eq!(record.size, 42);
        let digest = digest_bytes(b"clip", HashAlgorithm::Blake3);
        let record = record.with_digest(digest.clone());
        assert_eq!(record.digest, digest);
        assert_eq!(record.path, PathBuf::from("/inbox/clip.MOV"));
    }
}
