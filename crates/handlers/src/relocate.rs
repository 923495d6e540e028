use crate::HandleOutcome;
use crate::artifact::relocate;
use crate::error::Result;
use foldersort_config::{HandlerKind, RelocateSettings};
use foldersort_storage::{Digested, FileRecord, TargetDir};
use std::path::Path;

/// Handler for file types that are filed away unchanged.
pub struct RelocateHandler {
    kind: HandlerKind,
    extensions: Vec<String>,
    target: TargetDir,
}

impl RelocateHandler {
    pub fn new(kind: HandlerKind, root: &Path, settings: RelocateSettings) -> Self {
        let target = TargetDir::new(root.join(&settings.directory));
        Self { kind, extensions: settings.extensions, target }
    }

    pub(crate) fn target(&self) -> &TargetDir {
        &self.target
    }

    pub(crate) fn supported_extensions(&self) -> Vec<String> {
        self.extensions.clone()
    }

    pub(crate) async fn handle(&self, record: &FileRecord<Digested>) -> Result<HandleOutcome> {
        let mut outcome = HandleOutcome::default();
        relocate(self.kind, &self.target, record, &mut outcome).await?;
        Ok(outcome)
    }
}
