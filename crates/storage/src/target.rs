//! Handler target folders inside the watched root.

use crate::error::{ErrorKind, Result};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::sync::OnceCell;

/// A folder that a handler writes artifacts into.
///
/// The folder is created lazily the first time something is written to it,
/// so an idle handler never leaves an empty folder behind.
#[derive(Debug)]
pub struct TargetDir {
    path: PathBuf,
    created: OnceCell<()>,
}

impl TargetDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), created: OnceCell::new() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the folder (and parents) if it doesn't exist yet.
    pub async fn ensure(&self) -> Result<&Path> {
        self.created
            .get_or_try_init(|| async {
                tokio::fs::create_dir_all(&self.path)
                    .await
                    .map_err(|e| ErrorKind::map_io(e, &self.path))?;
                tracing::debug!(path = %self.path.display(), "Target directory ready");
                Ok::<_, crate::error::Error>(())
            })
            .await?;
        Ok(&self.path)
    }

    /// Final location of an artifact named `name` in this folder.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Reserve a hidden scratch file in this folder for a converter to write
    /// into. The file ends in `.{extension}` because converters pick the
    /// output format from it. Dropping the returned path deletes the file.
    pub async fn staging_file(&self, extension: &str) -> Result<TempPath> {
        let dir = self.ensure().await?;
        let suffix = if extension.is_empty() { String::new() } else { format!(".{extension}") };
        let file = tempfile::Builder::new()
            .prefix(".foldersort-")
            .suffix(&suffix)
            .tempfile_in(dir)
            .map_err(|e| ErrorKind::map_io(e, dir))?;
        Ok(file.into_temp_path())
    }
}

/// Move a finished scratch file to its final name.
pub fn persist(staged: TempPath, destination: &Path) -> Result<()> {
    staged
        .persist(destination)
        .map_err(|e| ErrorKind::map_io(e.error, destination))?;
    Ok(())
}
