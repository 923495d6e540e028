//! File handlers.
//!
//! A [`Handler`] owns one file type: it knows which extensions it accepts,
//! which folder inside the root its artifacts go to, and how to turn a
//! digested source file into those artifacts. The set of handlers is closed;
//! dispatch is a `match`.
//!
//! Every handler ends by copying the source to `<digest>.<ext>` in its
//! folder and deleting the source. Any conversion it performs beforehand is
//! written to a scratch file and only given its final name once all
//! conversions for that file have succeeded, so a failure leaves the source
//! in place and no half-made artifacts behind.

mod artifact;
pub mod error;
mod image;
mod relocate;
mod video;

use crate::error::Result;
pub use crate::image::ImageHandler;
pub use crate::relocate::RelocateHandler;
pub use crate::video::VideoHandler;
use foldersort_config::{Config, HandlerKind};
use foldersort_convert::ConverterHandle;
use foldersort_storage::{Digested, FileRecord};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Something worth counting, reported by a handler as it works.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Notification {
    /// The source file was filed into the handler's folder.
    Handled(HandlerKind),
    /// A format conversion produced a new artifact.
    Converted(HandlerKind),
    /// A thumbnail was produced.
    Thumbnail(HandlerKind),
}

/// What a successful [`Handler::handle`] produced.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HandleOutcome {
    /// Artifact paths, in the order they were written.
    pub artifacts: Vec<PathBuf>,
    pub notifications: Vec<Notification>,
}

pub enum Handler {
    Image(ImageHandler),
    Video(VideoHandler),
    Archive(RelocateHandler),
    Executable(RelocateHandler),
    Document(RelocateHandler),
}

impl Handler {
    /// Build the handler of type `kind` from its configuration block.
    pub fn from_config(kind: HandlerKind, config: &Config, converter: &ConverterHandle) -> Self {
        let root = config.root.as_path();
        match kind {
            HandlerKind::Image => Self::Image(ImageHandler::new(
                root,
                config.image.clone(),
                config.converter.imagemagick.clone(),
                converter.clone(),
            )),
            HandlerKind::Video => Self::Video(VideoHandler::new(
                root,
                config.video.clone(),
                config.converter.ffmpeg.clone(),
                converter.clone(),
            )),
            HandlerKind::Archive => Self::Archive(RelocateHandler::new(kind, root, config.archive.clone())),
            HandlerKind::Executable => Self::Executable(RelocateHandler::new(kind, root, config.executable.clone())),
            HandlerKind::Document => Self::Document(RelocateHandler::new(kind, root, config.document.clone())),
        }
    }

    /// Every handler listed in `config.handlers`, in registration order.
    pub fn all_from_config(config: &Config, converter: &ConverterHandle) -> Vec<Self> {
        config.handlers.iter().map(|kind| Self::from_config(*kind, config, converter)).collect()
    }

    pub fn kind(&self) -> HandlerKind {
        match self {
            Self::Image(_) => HandlerKind::Image,
            Self::Video(_) => HandlerKind::Video,
            Self::Archive(_) => HandlerKind::Archive,
            Self::Executable(_) => HandlerKind::Executable,
            Self::Document(_) => HandlerKind::Document,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Folder (inside the root) this handler writes to. It may not exist yet.
    pub fn target_dir(&self) -> &Path {
        match self {
            Self::Image(h) => h.target().path(),
            Self::Video(h) => h.target().path(),
            Self::Archive(h) | Self::Executable(h) | Self::Document(h) => h.target().path(),
        }
    }

    /// Extensions this handler accepts, as configured. The image handler may
    /// shell out to ImageMagick to narrow the list, so call this once and
    /// keep the result.
    pub async fn supported_extensions(&self) -> Vec<String> {
        match self {
            Self::Image(h) => h.supported_extensions().await,
            Self::Video(h) => h.supported_extensions(),
            Self::Archive(h) | Self::Executable(h) | Self::Document(h) => h.supported_extensions(),
        }
    }

    /// Produce this handler's artifacts for `record` and remove the source.
    ///
    /// # Errors
    /// - [`ErrorKind::Conversion`](error::ErrorKind::Conversion) if a converter failed.
    /// - [`ErrorKind::Storage`](error::ErrorKind::Storage) if copying or removing failed.
    ///
    /// In both cases the source file is still in place.
    #[instrument(skip_all, fields(handler = self.name(), path = %record.path.display()))]
    pub async fn handle(&self, record: &FileRecord<Digested>) -> Result<HandleOutcome> {
        match self {
            Self::Image(h) => h.handle(record).await,
            Self::Video(h) => h.handle(record).await,
            Self::Archive(h) | Self::Executable(h) | Self::Document(h) => h.handle(record).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foldersort_convert::MockConverter;
    use foldersort_digest::{HashAlgorithm, digest_bytes};
    use rstest::rstest;
    use std::sync::Arc;
    use time::OffsetDateTime;

    fn converter() -> ConverterHandle {
        Arc::new(MockConverter::new())
    }

    #[rstest]
    #[case(HandlerKind::Image, "Images")]
    #[case(HandlerKind::Video, "Videos")]
    #[case(HandlerKind::Archive, "Archives")]
    #[case(HandlerKind::Executable, "Executables")]
    #[case(HandlerKind::Document, "Documents")]
    fn test_target_dirs(#[case] kind: HandlerKind, #[case] directory: &str) {
        let config = Config::for_root("/inbox");
        let handler = Handler::from_config(kind, &config, &converter());
        assert_eq!(handler.kind(), kind);
        assert_eq!(handler.target_dir(), Path::new("/inbox").join(directory));
    }

    #[tokio::test]
    async fn test_all_from_config_follows_registration_order() {
        let mut config = Config::for_root("/inbox");
        config.handlers = vec![HandlerKind::Document, HandlerKind::Image];
        let handlers = Handler::all_from_config(&config, &converter());
        let names: Vec<&str> = handlers.iter().map(Handler::name).collect();
        assert_eq!(names, ["document", "image"]);
        assert_eq!(handlers[0].supported_extensions().await, ["pdf"]);
    }

    #[rstest]
    #[case("setup.exe", HandlerKind::Executable, "Executables")]
    #[case("backup.7z", HandlerKind::Archive, "Archives")]
    #[case("paper.pdf", HandlerKind::Document, "Documents")]
    #[tokio::test]
    async fn test_relocate_only(#[case] name: &str, #[case] kind: HandlerKind, #[case] directory: &str) {
        let root = tempfile::tempdir().unwrap();
        let config = Config::for_root(root.path());
        let handler = Handler::from_config(kind, &config, &converter());
        let source = root.path().join(name);
        std::fs::write(&source, name).unwrap();
        let record = FileRecord::new(&source, name.len() as u64, OffsetDateTime::UNIX_EPOCH)
            .with_digest(digest_bytes(name.as_bytes(), HashAlgorithm::Blake3));

        let outcome = handler.handle(&record).await.unwrap();
        let expected = root.path().join(directory).join(record.digest.file_name(&record.extension));
        assert_eq!(outcome.artifacts, vec![expected.clone()]);
        assert_eq!(outcome.notifications, vec![Notification::Handled(kind)]);
        assert_eq!(std::fs::read(&expected).unwrap(), name.as_bytes());
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn test_relocate_when_artifact_exists_removes_source() {
        let root = tempfile::tempdir().unwrap();
        let config = Config::for_root(root.path());
        let handler = Handler::from_config(HandlerKind::Document, &config, &converter());
        let source = root.path().join("again.pdf");
        std::fs::write(&source, b"pdf").unwrap();
        let record = FileRecord::new(&source, 3, OffsetDateTime::UNIX_EPOCH)
            .with_digest(digest_bytes(b"pdf", HashAlgorithm::Blake3));
        let documents = root.path().join("Documents");
        std::fs::create_dir(&documents).unwrap();
        std::fs::write(documents.join(record.digest.file_name("pdf")), b"pdf").unwrap();

        handler.handle(&record).await.unwrap();
        assert!(!source.exists());
        assert_eq!(std::fs::read_dir(&documents).unwrap().count(), 1);
    }
}
