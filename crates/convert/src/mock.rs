//! Scripted converter for tests.

use crate::error::{ErrorKind, Result};
use crate::{Converter, Invocation, Output};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::sync::Mutex;

/// Records every invocation instead of spawning anything.
///
/// By default each call succeeds and, when the invocation names an output
/// file, writes a small placeholder to it so the caller sees an artifact.
/// Individual programs can be made to fail or to print canned stdout.
#[derive(Default)]
pub struct MockConverter {
    calls: Mutex<Vec<Invocation>>,
    failing: HashSet<OsString>,
    stdout: HashMap<OsString, String>,
}

impl MockConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call to `program` exits with code 1.
    pub fn failing(mut self, program: impl Into<OsString>) -> Self {
        self.failing.insert(program.into());
        self
    }

    pub fn with_stdout(mut self, program: impl Into<OsString>, stdout: impl Into<String>) -> Self {
        self.stdout.insert(program.into(), stdout.into());
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Invocations whose program is `program`.
    pub fn invocations_of(&self, program: &str) -> Vec<Invocation> {
        self.invocations().into_iter().filter(|i| i.program() == program).collect()
    }
}

#[async_trait]
impl Converter for MockConverter {
    async fn run(&self, invocation: &Invocation) -> Result<Output> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }
        if self.failing.contains(invocation.program()) {
            exn::bail!(ErrorKind::Failed { program: invocation.program_name(), code: 1 });
        }
        if let Some(path) = invocation.output_path() {
            tokio::fs::write(path, format!("converted by {}", invocation.program_name()))
                .await
                .map_err(ErrorKind::Io)?;
        }
        let stdout = self.stdout.get(invocation.program()).cloned().unwrap_or_default();
        Ok(Output { stdout, stderr: String::new() })
    }
}
