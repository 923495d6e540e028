//! Live folder watching.
//!
//! A `notify` watcher feeds raw events into a channel. The dispatch task
//! turns add-events into debounced pipeline runs: every add-event for a path
//! (re)arms a timer for that path, and only the most recently armed timer
//! actually runs the pipeline. Runs execute concurrently on a [`JoinSet`].

use crate::error::{ErrorKind, Result};
use crate::pipeline::{Outcome, Pipeline};
use exn::ResultExt;
use foldersort_storage::Entry;
use futures::StreamExt;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

type RawEvent = std::result::Result<Event, notify::Error>;

/// How an event affects pending work for its paths.
#[derive(Debug, PartialEq, Eq)]
enum Trigger {
    /// Something new appeared: arm (or re-arm) the timer.
    Add,
    /// Content is still being written: push back a timer that is already
    /// pending, but don't start one.
    Write,
    Ignore,
}

fn classify(kind: &EventKind) -> Trigger {
    match kind {
        EventKind::Create(_) => Trigger::Add,
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both | RenameMode::Any)) => Trigger::Add,
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => Trigger::Write,
        _ => Trigger::Ignore,
    }
}

/// Keyed debounce state: the generation of the latest timer armed per path.
#[derive(Debug, Default)]
pub(crate) struct Debouncer {
    inner: Mutex<DebounceState>,
}

#[derive(Debug, Default)]
struct DebounceState {
    next: u64,
    pending: HashMap<PathBuf, u64>,
}

impl Debouncer {
    /// Arm a timer for `path`, superseding any pending one.
    pub(crate) fn arm(&self, path: &Path) -> u64 {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.next += 1;
        let generation = state.next;
        state.pending.insert(path.to_path_buf(), generation);
        generation
    }

    /// Re-arm only if a timer for `path` is pending.
    pub(crate) fn rearm(&self, path: &Path) -> Option<u64> {
        let pending = {
            let state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            state.pending.contains_key(path)
        };
        pending.then(|| self.arm(path))
    }

    /// Called when a timer expires. `true` if it is still the latest one for
    /// `path`, in which case the path is no longer pending.
    pub(crate) fn fire(&self, path: &Path, generation: u64) -> bool {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match state.pending.get(path) {
            Some(current) if *current == generation => {
                state.pending.remove(path);
                true
            },
            _ => false,
        }
    }
}

/// Watches the root and feeds new files to a [`Pipeline`].
pub struct WatchAdapter {
    pipeline: Arc<Pipeline>,
    root: PathBuf,
    debounce: Duration,
    ignored: Vec<PathBuf>,
}

/// A running watcher. Cancel its token, then await [`Watching::stopped`].
pub struct Watching {
    task: JoinHandle<()>,
}

impl Watching {
    /// Wait for the dispatch task and any pipeline runs already under way.
    pub async fn stopped(self) {
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Watcher task ended abnormally");
        }
    }
}

impl WatchAdapter {
    pub fn new(pipeline: Arc<Pipeline>, root: impl Into<PathBuf>, debounce: Duration) -> Self {
        let ignored = pipeline.output_dirs();
        Self { pipeline, root: root.into(), debounce, ignored }
    }

    /// Install the filesystem watcher and start dispatching.
    ///
    /// Events are captured from the moment this returns, so starting the
    /// watcher before a bulk scan means nothing dropped during the scan is
    /// missed.
    ///
    /// The root is watched, plus every folder directly inside it that isn't
    /// one of the pipeline's output folders. Neither is recursive.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub async fn start(self, cancel: CancellationToken) -> Result<Watching> {
        let (sender, receiver) = unbounded_channel::<RawEvent>();
        let mut watcher = RecommendedWatcher::new(
            move |event: RawEvent| {
                // The receiver only goes away during shutdown.
                _ = sender.send(event);
            },
            notify::Config::default(),
        )
        .or_raise(|| ErrorKind::Watch(self.root.clone()))?;
        watcher
            .watch(&self.root, RecursiveMode::NonRecursive)
            .or_raise(|| ErrorKind::Watch(self.root.clone()))?;
        tracing::info!("Watching folder");

        {
            let mut entries = std::pin::pin!(foldersort_storage::list(&self.root));
            while let Some(entry) = entries.next().await {
                let dir = match entry {
                    Ok(Entry::Directory(dir)) if !self.is_ignored(&dir) => dir,
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::warn!(error = ?e, "Could not list subfolders to watch");
                        continue;
                    },
                };
                match watcher.watch(&dir, RecursiveMode::NonRecursive) {
                    Ok(()) => tracing::debug!(path = %dir.display(), "Watching subfolder"),
                    Err(e) => tracing::warn!(path = %dir.display(), error = %e, "Could not watch subfolder"),
                }
            }
        }

        let task = tokio::spawn(self.dispatch(watcher, receiver, cancel));
        Ok(Watching { task })
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignored.iter().any(|dir| path.starts_with(dir))
    }

    async fn dispatch(
        self,
        watcher: RecommendedWatcher,
        mut receiver: UnboundedReceiver<RawEvent>,
        cancel: CancellationToken,
    ) {
        let this = Arc::new(self);
        let debouncer = Arc::new(Debouncer::default());
        let mut runs = JoinSet::new();
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                Some(joined) = runs.join_next(), if !runs.is_empty() => log_join(joined),
                event = receiver.recv() => match event {
                    Some(Ok(event)) => this.on_event(event, &debouncer, &mut runs, &cancel),
                    Some(Err(e)) => tracing::warn!(error = %e, "Filesystem watcher error"),
                    None => break,
                },
            }
        }
        // Ends the subscription.
        drop(watcher);
        tracing::info!(pending = runs.len(), "Watcher stopping");
        // Pending timers see the cancellation and return immediately; runs
        // already under way finish.
        while let Some(joined) = runs.join_next().await {
            log_join(joined);
        }
    }

    fn on_event(
        self: &Arc<Self>,
        event: Event,
        debouncer: &Arc<Debouncer>,
        runs: &mut JoinSet<Option<Outcome>>,
        cancel: &CancellationToken,
    ) {
        let trigger = classify(&event.kind);
        if trigger == Trigger::Ignore {
            return;
        }
        // A rename carrying both ends lists the destination last.
        let paths = match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => &event.paths[event.paths.len().saturating_sub(1)..],
            _ => &event.paths[..],
        };
        for path in paths {
            if self.is_ignored(path) {
                tracing::trace!(path = %path.display(), "Ignoring event inside an output folder");
                continue;
            }
            let generation = match trigger {
                Trigger::Add => debouncer.arm(path),
                Trigger::Write => match debouncer.rearm(path) {
                    Some(generation) => generation,
                    None => continue,
                },
                Trigger::Ignore => continue,
            };
            tracing::trace!(path = %path.display(), generation, "Debounce timer armed");
            runs.spawn(self.clone().run_after_quiet_period(
                path.clone(),
                generation,
                debouncer.clone(),
                cancel.clone(),
            ));
        }
    }

    /// Wait out the quiet period, then run the pipeline unless a later event
    /// superseded this timer. `None` if the pipeline never ran or failed.
    ///
    /// A path still held by an earlier run is waited out again, so content
    /// written during a long conversion is picked up afterwards.
    async fn run_after_quiet_period(
        self: Arc<Self>,
        path: PathBuf,
        mut generation: u64,
        debouncer: Arc<Debouncer>,
        cancel: CancellationToken,
    ) -> Option<Outcome> {
        loop {
            tokio::select! {
                () = cancel.cancelled() => return None,
                () = tokio::time::sleep(self.debounce) => {},
            }
            if !debouncer.fire(&path, generation) {
                tracing::trace!(path = %path.display(), generation, "Superseded by a later event");
                return None;
            }
            match self.pipeline.process(&path).await {
                Ok(Outcome::Busy) => {
                    generation = debouncer.arm(&path);
                    tracing::debug!(path = %path.display(), generation, "Path busy; waiting again");
                },
                Ok(Outcome::Skipped) => {
                    tracing::info!(path = %path.display(), "Not a regular file; folders are not watched recursively");
                    return Some(Outcome::Skipped);
                },
                Ok(outcome) => {
                    tracing::debug!(path = %path.display(), ?outcome, "Watch run finished");
                    return Some(outcome);
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = ?e, "Failed to process file");
                    return None;
                },
            }
        }
    }
}

fn log_join(joined: std::result::Result<Option<Outcome>, JoinError>) {
    match joined {
        Ok(_) => {},
        Err(e) if e.is_panic() => tracing::error!(error = %e, "Watch run panicked"),
        Err(e) => tracing::trace!(error = %e, "Watch run cancelled"),
    }
}
