//! Videos: transcode to the target container, keep the original.

use crate::artifact::{Staged, persist_all, relocate};
use crate::error::{ErrorKind, Result};
use crate::{HandleOutcome, Notification};
use exn::ResultExt;
use foldersort_config::{HandlerKind, VideoSettings};
use foldersort_convert::{ConverterHandle, Invocation};
use foldersort_storage::{Digested, FileRecord, TargetDir};
use std::path::Path;

pub struct VideoHandler {
    settings: VideoSettings,
    program: String,
    target: TargetDir,
    converter: ConverterHandle,
}

impl VideoHandler {
    pub fn new(root: &Path, settings: VideoSettings, program: String, converter: ConverterHandle) -> Self {
        let target = TargetDir::new(root.join(&settings.directory));
        Self { settings, program, target, converter }
    }

    pub(crate) fn target(&self) -> &TargetDir {
        &self.target
    }

    pub(crate) fn supported_extensions(&self) -> Vec<String> {
        self.settings.extensions.clone()
    }

    pub(crate) async fn handle(&self, record: &FileRecord<Digested>) -> Result<HandleOutcome> {
        let target_ext = self.settings.target_extension.as_str();
        let mut outcome = HandleOutcome::default();
        let destination = self.target.artifact_path(&record.digest.file_name(target_ext));

        if record.extension != target_ext {
            if foldersort_storage::exists(&destination).await.or_raise(|| ErrorKind::Storage)? {
                tracing::debug!(destination = %destination.display(), "Transcoded video already present");
            } else {
                let file = self.target.staging_file(target_ext).await.or_raise(|| ErrorKind::Storage)?;
                let invocation = self.transcode(&record.path, &file);
                self.converter.run(&invocation).await.or_raise(|| ErrorKind::Conversion)?;
                persist_all(vec![Staged { file, destination }], &mut outcome)?;
                outcome.notifications.push(Notification::Converted(HandlerKind::Video));
            }
        }

        relocate(HandlerKind::Video, &self.target, record, &mut outcome).await?;
        Ok(outcome)
    }

    fn transcode(&self, source: &Path, output: &Path) -> Invocation {
        // `-y`: the scratch output file already exists.
        Invocation::new(&self.program)
            .args(["-y", "-i"])
            .arg(source)
            .args([
                "-c:v",
                self.settings.video_codec.as_str(),
                "-preset",
                self.settings.preset.as_str(),
                "-c:a",
                self.settings.audio_codec.as_str(),
                "-b:a",
                self.settings.audio_bitrate.as_str(),
            ])
            .output(output)
    }
}
