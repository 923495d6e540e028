//! Per-file processing: stat, digest, dedup, dispatch.

use crate::error::{ErrorKind, Result};
use crate::index::{Admission, DuplicateIndex};
use crate::registry::HandlerRegistry;
use exn::ResultExt;
use foldersort_config::{Config, DuplicatePolicy, HandlerKind};
use foldersort_convert::ConverterHandle;
use foldersort_digest::{HashAlgorithm, digest_file};
use foldersort_handlers::{Handler, Notification};
use foldersort_storage::error::ErrorKind as StorageErrorKind;
use foldersort_storage::{Digested, FileRecord, TargetDir};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use time::OffsetDateTime;
use tokio::sync::mpsc::UnboundedSender;
use tracing::instrument;

/// What became of a duplicate file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Kept,
    Deleted,
    Quarantined(PathBuf),
}

/// The result of one [`Pipeline::process`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A handler filed the file away.
    Handled { handler: HandlerKind, artifacts: Vec<PathBuf> },
    /// The same content was already seen at `first` this run. No handler ran.
    Duplicate { first: PathBuf, resolution: Resolution },
    /// No handler claims the extension; the file was left untouched.
    Unhandled { extension: String },
    /// The file disappeared before it could be read.
    Vanished,
    /// Not a regular file (directory, socket, ...).
    Skipped,
    /// Another run is already processing this path.
    Busy,
}

/// Shared by the bulk scan and the watcher.
pub struct Pipeline {
    registry: Arc<HandlerRegistry>,
    index: DuplicateIndex,
    algorithm: HashAlgorithm,
    policy: DuplicatePolicy,
    quarantine: TargetDir,
    in_flight: Mutex<HashSet<PathBuf>>,
    telemetry: Option<UnboundedSender<Notification>>,
}

impl Pipeline {
    pub fn new(config: &Config, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            registry,
            index: DuplicateIndex::new(),
            algorithm: config.hash,
            policy: config.duplicates,
            quarantine: TargetDir::new(config.duplicates_path()),
            in_flight: Mutex::new(HashSet::new()),
            telemetry: None,
        }
    }

    /// Build every configured handler, register them, and wrap the result.
    pub async fn from_config(config: &Config, converter: &ConverterHandle) -> Self {
        let registry = HandlerRegistry::register(Handler::all_from_config(config, converter)).await;
        Self::new(config, Arc::new(registry))
    }

    /// Forward handler notifications to `sender`.
    pub fn with_telemetry(mut self, sender: UnboundedSender<Notification>) -> Self {
        self.telemetry = Some(sender);
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn index(&self) -> &DuplicateIndex {
        &self.index
    }

    /// Folders the pipeline writes into. Nothing inside them is ever fed
    /// back into the pipeline.
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = self.registry.target_dirs();
        dirs.push(self.quarantine.path().to_path_buf());
        dirs
    }

    /// Run one file through the pipeline.
    ///
    /// Only handler, digest, stat (other than "not found") and duplicate
    /// resolution failures are errors. Either way the failure is confined to
    /// this file.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn process(&self, path: &Path) -> Result<Outcome> {
        let Some(_claim) = self.claim(path) else {
            tracing::debug!("Already being processed");
            return Ok(Outcome::Busy);
        };

        let record = match foldersort_storage::stat(path).await {
            Ok(record) => record,
            Err(e) if matches!(&*e, StorageErrorKind::NotFound(_)) => {
                tracing::debug!("File vanished before processing");
                return Ok(Outcome::Vanished);
            },
            Err(e) if matches!(&*e, StorageErrorKind::NotAFile(_)) => {
                tracing::debug!("Not a regular file; ignoring");
                return Ok(Outcome::Skipped);
            },
            Err(e) => return Err(e).or_raise(|| ErrorKind::Stat(path.to_path_buf())),
        };
        let digest = match digest_file(path, self.algorithm).await {
            Ok(digest) => digest,
            Err(e) if e.is_not_found() => {
                tracing::debug!("File vanished while being digested");
                return Ok(Outcome::Vanished);
            },
            Err(e) => return Err(e).or_raise(|| ErrorKind::Digest(path.to_path_buf())),
        };
        let record = record.with_digest(digest);
        tracing::trace!(digest = %record.digest, extension = %record.extension, size = record.size, "File digested");

        if let Admission::Duplicate { first, filed } = self.index.check_and_record(&record.digest, &record.path) {
            let resolution = self.resolve_duplicate(&record, &first, filed).await?;
            return Ok(Outcome::Duplicate { first, resolution });
        }

        let Some(handler) = self.registry.lookup(&record.extension) else {
            tracing::info!(extension = %record.extension, "No handler for extension; leaving file in place");
            return Ok(Outcome::Unhandled { extension: record.extension.clone() });
        };
        let outcome = handler
            .handle(&record)
            .await
            .or_raise(|| ErrorKind::Handler { handler: handler.name(), path: path.to_path_buf() })?;
        self.index.mark_filed(&record.digest);
        self.forward(&outcome.notifications);
        tracing::info!(handler = handler.name(), artifacts = outcome.artifacts.len(), "File handled");
        Ok(Outcome::Handled { handler: handler.kind(), artifacts: outcome.artifacts })
    }

    async fn resolve_duplicate(&self, record: &FileRecord<Digested>, first: &Path, filed: bool) -> Result<Resolution> {
        if first == record.path && !filed {
            // The first copy is still here (unhandled or failed earlier this
            // run) and is the only one. Never delete it.
            tracing::debug!("Path already processed this run; leaving in place");
            return Ok(Resolution::Kept);
        }
        let raise = || ErrorKind::Duplicate(record.path.clone());
        match self.policy {
            DuplicatePolicy::Keep => {
                tracing::info!(first = %first.display(), digest = %record.digest, "Duplicate content; keeping file");
                Ok(Resolution::Kept)
            },
            DuplicatePolicy::Delete => {
                foldersort_storage::remove(&record.path).await.or_raise(raise)?;
                tracing::info!(first = %first.display(), digest = %record.digest, "Duplicate content; file deleted");
                Ok(Resolution::Deleted)
            },
            DuplicatePolicy::Quarantine => {
                let dir = self.quarantine.ensure().await.or_raise(raise)?;
                let stamp = format!("-{}", OffsetDateTime::now_utc().unix_timestamp());
                let destination = dir.join(record.digest.suffixed_file_name(&stamp, &record.extension));
                foldersort_storage::move_file(&record.path, &destination).await.or_raise(raise)?;
                tracing::info!(
                    first = %first.display(),
                    destination = %destination.display(),
                    "Duplicate content; file quarantined"
                );
                Ok(Resolution::Quarantined(destination))
            },
        }
    }

    fn forward(&self, notifications: &[Notification]) {
        let Some(sender) = &self.telemetry else {
            return;
        };
        for notification in notifications {
            if sender.send(*notification).is_err() {
                tracing::trace!("Telemetry receiver dropped");
                return;
            }
        }
    }

    pub(crate) fn claim(&self, path: &Path) -> Option<Claim<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight
            .insert(path.to_path_buf())
            .then(|| Claim { in_flight: &self.in_flight, path: path.to_path_buf() })
    }
}

/// Marks a path as in progress until dropped.
pub(crate) struct Claim<'a> {
    in_flight: &'a Mutex<HashSet<PathBuf>>,
    path: PathBuf,
}
impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.path);
    }
}
