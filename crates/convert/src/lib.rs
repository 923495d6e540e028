//! External converter processes.
//!
//! Image and video conversion is delegated to ImageMagick and FFmpeg. Every
//! call goes through a [`Converter`], which lets the handlers be tested
//! against [`MockConverter`] (behind the `mock` feature) instead of real
//! binaries.

pub mod error;
mod invocation;
#[cfg(feature = "mock")]
mod mock;

use crate::error::{ErrorKind, Result};
pub use crate::invocation::{Invocation, Output};
#[cfg(feature = "mock")]
pub use crate::mock::MockConverter;
use async_trait::async_trait;
use exn::ResultExt;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::instrument;

pub type ConverterHandle = Arc<dyn Converter>;

/// Runs an [`Invocation`] to completion.
///
/// A non-zero exit is an error; the returned [`Output`] always belongs to a
/// successful run.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<Output>;
}

/// Spawns real processes, at most `max_concurrent` at a time.
///
/// Dropping the future returned by [`Converter::run`] kills the child, which
/// is how both timeouts and shutdown cancel a conversion in progress.
pub struct CommandConverter {
    permits: Semaphore,
    timeout: Option<Duration>,
    resolved: Mutex<HashMap<OsString, PathBuf>>,
}

impl CommandConverter {
    /// `max_concurrent == 0` removes the limit.
    pub fn new(max_concurrent: usize, timeout: Option<Duration>) -> Self {
        let permits = match max_concurrent {
            0 => Semaphore::MAX_PERMITS,
            n => n,
        };
        Self {
            permits: Semaphore::new(permits),
            timeout,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Locate `program` on `PATH` (or accept it as-is when it's a path).
    pub fn resolve(&self, program: &OsStr) -> Result<PathBuf> {
        if let Some(path) = self.resolved.lock().ok().and_then(|cache| cache.get(program).cloned()) {
            return Ok(path);
        }
        let Ok(path) = which::which(program) else {
            tracing::info!(program = %program.to_string_lossy(), "Converter executable not found in PATH");
            exn::bail!(ErrorKind::ToolNotFound(program.to_string_lossy().into_owned()));
        };
        tracing::trace!(program = %program.to_string_lossy(), path = %path.display(), "Resolved converter executable");
        if let Ok(mut cache) = self.resolved.lock() {
            cache.insert(program.to_os_string(), path.clone());
        }
        Ok(path)
    }

    /// Refuse new work. Runs already holding a slot are unaffected.
    pub fn close(&self) {
        self.permits.close();
    }
}

#[async_trait]
impl Converter for CommandConverter {
    #[instrument(skip_all, fields(program = %invocation.program().to_string_lossy()))]
    async fn run(&self, invocation: &Invocation) -> Result<Output> {
        let program = invocation.program_name();
        let executable = self.resolve(invocation.program())?;
        let _permit = self.permits.acquire().await.or_raise(|| ErrorKind::Shutdown)?;
        tracing::debug!(command = %invocation, "Running converter");
        let child = Command::new(&executable)
            .args(invocation.get_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ErrorKind::Io)?;
        let output = match self.timeout {
            Some(after) => tokio::time::timeout(after, child.wait_with_output())
                .await
                .map_err(|_| ErrorKind::Timeout { program: program.clone(), after })?,
            None => child.wait_with_output().await,
        }
        .map_err(ErrorKind::Io)?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if output.status.success() {
            return Ok(Output { stdout, stderr });
        }
        let tail = stderr.lines().rev().take(5).collect::<Vec<_>>();
        match output.status.code() {
            Some(code) => {
                tracing::warn!(command = %invocation, code, stderr = ?tail, "Converter failed");
                exn::bail!(ErrorKind::Failed { program, code });
            },
            None => {
                tracing::warn!(command = %invocation, stderr = ?tail, "Converter terminated by signal");
                exn::bail!(ErrorKind::Killed(program));
            },
        }
    }
}
