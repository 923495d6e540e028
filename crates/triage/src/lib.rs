//! Classification and dispatch.
//!
//! Two producers find files: the one-off [`scan`] of the root and the
//! long-running [`WatchAdapter`]. Both hand paths to a shared [`Pipeline`],
//! which digests each file, checks the [`DuplicateIndex`], looks up a handler
//! in the [`HandlerRegistry`] and lets it do the work.

pub mod error;
mod index;
mod pipeline;
mod registry;
mod scan;
mod telemetry;
mod watch;

pub use crate::index::{Admission, DuplicateIndex};
pub use crate::pipeline::{Outcome, Pipeline, Resolution};
pub use crate::registry::{Conflict, HandlerRegistry};
pub use crate::scan::{ScanEvent, scan};
pub use crate::telemetry::{HandlerStats, Stats, StatsCollector};
pub use crate::watch::{WatchAdapter, Watching};
pub use tokio_util::sync::CancellationToken;
