//! Local filesystem operations.
//!
//! Everything here goes through `tokio::fs`. Writes that produce artifacts are
//! staged next to their destination and renamed into place, so a reader never
//! observes a half-copied artifact under its final name.

use crate::error::{ErrorKind, Result};
use crate::file::FileRecord;
use async_stream::stream;
use futures::Stream;
use std::ffi::OsString;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tokio::fs;

/// A directory entry found directly under a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    File(PathBuf),
    Directory(PathBuf),
    /// Sockets, FIFOs, broken symlinks.
    Other(PathBuf),
}
impl Entry {
    pub fn path(&self) -> &Path {
        match self {
            Self::File(p) | Self::Directory(p) | Self::Other(p) => p,
        }
    }
}

/// Where a relocated file ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The destination was written by this call.
    Copied,
    /// Something already occupied the destination; nothing was written.
    AlreadyPresent,
}

fn record_from(path: &Path, metadata: &Metadata) -> Result<FileRecord> {
    let modified = metadata.modified().map_err(ErrorKind::Io)?.into();
    Ok(FileRecord::new(path, metadata.len(), modified))
}

/// Stat a regular file, following symlinks.
///
/// # Errors
/// - [`ErrorKind::NotFound`] if nothing exists at `path`.
/// - [`ErrorKind::NotAFile`] for directories and other non-regular entries.
pub async fn stat(path: &Path) -> Result<FileRecord> {
    let metadata = fs::metadata(path).await.map_err(|e| ErrorKind::map_io(e, path))?;
    if !metadata.is_file() {
        exn::bail!(ErrorKind::NotAFile(path.to_path_buf()));
    }
    record_from(path, &metadata)
}

/// Stream the entries directly inside `dir` (no recursion), ordered by name.
///
/// Names are collected up front and sorted so a scan processes files in a
/// stable order; metadata is only fetched as each entry is yielded, which
/// keeps the listing cheap even when processing each file is not.
pub fn list(dir: &Path) -> impl Stream<Item = Result<Entry>> + '_ {
    stream! {
        let mut names: Vec<OsString> = Vec::new();
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                yield Err(exn::Exn::from(ErrorKind::map_io(e, dir)));
                return;
            },
        };
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => names.push(entry.file_name()),
                Ok(None) => break,
                Err(e) => {
                    yield Err(exn::Exn::from(ErrorKind::map_io(e, dir)));
                    return;
                },
            }
        }
        names.sort();
        for name in names {
            let path = dir.join(name);
            match fs::metadata(&path).await {
                Ok(m) if m.is_dir() => yield Ok(Entry::Directory(path)),
                Ok(m) if m.is_file() => yield Ok(Entry::File(path)),
                Ok(_) => yield Ok(Entry::Other(path)),
                // Removed between listing and stat; the broken-symlink case
                // also lands here.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    match fs::symlink_metadata(&path).await {
                        Ok(_) => yield Ok(Entry::Other(path)),
                        Err(_) => tracing::trace!(path = %path.display(), "Entry vanished during listing"),
                    }
                },
                Err(e) => yield Err(exn::Exn::from(ErrorKind::map_io(e, &path))),
            }
        }
    }
}

/// Copy `source` to `destination` unless the destination already exists.
///
/// Destinations are content-addressed, so an existing file is assumed to
/// hold the same bytes and is left alone. The copy is staged under a hidden
/// name in the destination directory and renamed into place.
pub async fn copy_if_absent(source: &Path, destination: &Path) -> Result<Placement> {
    if exists(destination).await? {
        tracing::debug!(destination = %destination.display(), "Destination already present; not copying");
        return Ok(Placement::AlreadyPresent);
    }
    let staging = staging_path(destination)?;
    if let Err(e) = fs::copy(source, &staging).await {
        // Best effort: a partial staging file is harmless but untidy.
        _ = fs::remove_file(&staging).await;
        exn::bail!(ErrorKind::map_io(e, source));
    }
    fs::rename(&staging, destination).await.map_err(|e| ErrorKind::map_io(e, destination))?;
    Ok(Placement::Copied)
}

/// Move a file, falling back to copy-and-delete across filesystems.
pub async fn move_file(source: &Path, destination: &Path) -> Result<()> {
    match fs::rename(source, destination).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            tracing::debug!(source = %source.display(), "Rename crosses devices; copying instead");
            copy_if_absent(source, destination).await?;
            remove(source).await
        },
        Err(e) => Err(ErrorKind::map_io(e, source).into()),
    }
}

pub async fn remove(path: &Path) -> Result<()> {
    Ok(fs::remove_file(path).await.map_err(|e| ErrorKind::map_io(e, path))?)
}

pub async fn exists(path: &Path) -> Result<bool> {
    Ok(fs::try_exists(path).await.map_err(|e| ErrorKind::map_io(e, path))?)
}

fn staging_path(destination: &Path) -> Result<PathBuf> {
    let name = destination.file_name().ok_or_else(|| exn::Exn::from(ErrorKind::InvalidPath(destination.to_path_buf())))?;
    let mut staged = OsString::from(".");
    staged.push(name);
    staged.push(".partial");
    Ok(destination.with_file_name(staged))
}
