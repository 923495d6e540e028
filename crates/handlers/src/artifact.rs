//! Writing artifacts into a handler's target folder.

use crate::error::{ErrorKind, Result};
use crate::{HandleOutcome, Notification};
use exn::ResultExt;
use foldersort_config::HandlerKind;
use foldersort_storage::{Digested, FileRecord, Placement, TargetDir, TempPath};
use std::path::PathBuf;

/// A converter output waiting in the target folder under a scratch name.
pub(crate) struct Staged {
    pub(crate) file: TempPath,
    pub(crate) destination: PathBuf,
}

/// Give every staged file its final name. Only called once all conversions
/// for a record have succeeded; if it isn't called, dropping `staged`
/// deletes the scratch files.
pub(crate) fn persist_all(staged: Vec<Staged>, outcome: &mut HandleOutcome) -> Result<()> {
    for Staged { file, destination } in staged {
        foldersort_storage::persist(file, &destination).or_raise(|| ErrorKind::Storage)?;
        tracing::debug!(artifact = %destination.display(), "Artifact written");
        outcome.artifacts.push(destination);
    }
    Ok(())
}

/// Copy the source to `<digest>.<ext>` in `target`, then remove the source.
///
/// An artifact already at the destination has the same content by
/// construction, so the copy is skipped and only the source is removed.
pub(crate) async fn relocate(
    kind: HandlerKind,
    target: &TargetDir,
    record: &FileRecord<Digested>,
    outcome: &mut HandleOutcome,
) -> Result<()> {
    target.ensure().await.or_raise(|| ErrorKind::Storage)?;
    let destination = target.artifact_path(&record.digest.file_name(&record.extension));
    let placement =
        foldersort_storage::copy_if_absent(&record.path, &destination).await.or_raise(|| ErrorKind::Storage)?;
    if placement == Placement::AlreadyPresent {
        tracing::info!(
            handler = %kind,
            path = %record.path.display(),
            destination = %destination.display(),
            "Identical file already relocated; removing source only"
        );
    }
    foldersort_storage::remove(&record.path).await.or_raise(|| ErrorKind::Storage)?;
    tracing::info!(handler = %kind, path = %record.path.display(), destination = %destination.display(), "File relocated");
    outcome.artifacts.push(destination);
    outcome.notifications.push(Notification::Handled(kind));
    Ok(())
}
