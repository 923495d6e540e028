use crate::error::{ErrorKind, Result};
use crate::pipeline::{Outcome, Pipeline};
use async_stream::stream;
use exn::ResultExt;
use foldersort_storage::Entry;
use futures::Stream;
use std::path::{Path, PathBuf};

/// Progress events emitted by [`scan`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. [`Directory`](Self::Directory) or [`Processed`](Self::Processed), once
///    per entry of the root, in name order.
/// 3. [`Complete`](Self::Complete), exactly once.
#[derive(Debug)]
pub enum ScanEvent {
    Started,
    /// A folder directly inside the root. Scans don't descend.
    Directory(PathBuf),
    /// A non-directory entry went through the pipeline.
    Processed { path: PathBuf, outcome: Outcome },
    Complete,
}

/// Feed every entry directly inside `root` through `pipeline`, one at a time.
///
/// A failing file is surfaced as an `Err` item and the scan moves on to the
/// next entry.
pub fn scan<'a>(pipeline: &'a Pipeline, root: &'a Path) -> impl Stream<Item = Result<ScanEvent>> + 'a {
    stream!({
        tracing::info!(root = %root.display(), "Scanning existing files");
        yield Ok(ScanEvent::Started);

        for await entry in foldersort_storage::list(root) {
            match entry {
                Ok(Entry::Directory(path)) => {
                    tracing::debug!(path = %path.display(), "Not descending into directory");
                    yield Ok(ScanEvent::Directory(path));
                },
                Ok(entry) => {
                    let path = entry.path().to_path_buf();
                    yield pipeline.process(&path).await.map(|outcome| ScanEvent::Processed { path, outcome });
                },
                Err(e) => yield Err(e).or_raise(|| ErrorKind::Listing(root.to_path_buf())),
            }
        }

        tracing::info!(root = %root.display(), "Scan complete");
        yield Ok(ScanEvent::Complete);
    })
}
