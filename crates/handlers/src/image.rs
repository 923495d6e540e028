//! Images: thumbnail, normalize to the target format, keep the original.

use crate::artifact::{Staged, persist_all, relocate};
use crate::error::{ErrorKind, Result};
use crate::{HandleOutcome, Notification};
use exn::ResultExt;
use foldersort_config::{HandlerKind, ImageSettings};
use foldersort_convert::{ConverterHandle, Invocation};
use foldersort_storage::{Digested, FileRecord, TargetDir};
use std::collections::HashSet;
use std::path::Path;

const THUMBNAIL_SUFFIX: &str = "_thumbnail";

pub struct ImageHandler {
    settings: ImageSettings,
    program: String,
    target: TargetDir,
    converter: ConverterHandle,
}

impl ImageHandler {
    pub fn new(root: &Path, settings: ImageSettings, program: String, converter: ConverterHandle) -> Self {
        let target = TargetDir::new(root.join(&settings.directory));
        Self { settings, program, target, converter }
    }

    pub(crate) fn target(&self) -> &TargetDir {
        &self.target
    }

    /// Configured extensions, narrowed to what ImageMagick can actually read
    /// when probing is enabled. A failed probe keeps the configured list.
    pub(crate) async fn supported_extensions(&self) -> Vec<String> {
        if !self.settings.probe {
            return self.settings.extensions.clone();
        }
        let probe = Invocation::new(&self.program).args(["-list", "format"]);
        let output = match self.converter.run(&probe).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(error = ?e, "ImageMagick format probe failed; using configured extensions");
                return self.settings.extensions.clone();
            },
        };
        let readable = readable_formats(&output.stdout);
        let (kept, dropped): (Vec<String>, Vec<String>) =
            self.settings.extensions.iter().cloned().partition(|ext| readable.contains(&ext.to_lowercase()));
        if !dropped.is_empty() {
            tracing::info!(dropped = ?dropped, "ImageMagick cannot read some configured image formats");
        }
        kept
    }

    pub(crate) async fn handle(&self, record: &FileRecord<Digested>) -> Result<HandleOutcome> {
        let target_ext = self.settings.target_extension.as_str();
        let needs_conversion = record.extension != target_ext;
        let needs_thumbnail = needs_conversion || record.size > self.settings.max_size_bytes();
        let mut outcome = HandleOutcome::default();
        let mut staged = Vec::new();

        if needs_thumbnail {
            let file = self.target.staging_file(target_ext).await.or_raise(|| ErrorKind::Storage)?;
            let invocation = self.thumbnail(&record.path, &file);
            self.converter.run(&invocation).await.or_raise(|| ErrorKind::Conversion)?;
            let name = record.digest.suffixed_file_name(THUMBNAIL_SUFFIX, target_ext);
            staged.push(Staged { file, destination: self.target.artifact_path(&name) });
            outcome.notifications.push(Notification::Thumbnail(HandlerKind::Image));
        }
        if needs_conversion {
            let file = self.target.staging_file(target_ext).await.or_raise(|| ErrorKind::Storage)?;
            let invocation = Invocation::new(&self.program).arg(&record.path).arg("-flatten").output(&*file);
            self.converter.run(&invocation).await.or_raise(|| ErrorKind::Conversion)?;
            let name = record.digest.file_name(target_ext);
            staged.push(Staged { file, destination: self.target.artifact_path(&name) });
            outcome.notifications.push(Notification::Converted(HandlerKind::Image));
        }

        persist_all(staged, &mut outcome)?;
        relocate(HandlerKind::Image, &self.target, record, &mut outcome).await?;
        Ok(outcome)
    }

    fn thumbnail(&self, source: &Path, output: &Path) -> Invocation {
        let size = self.settings.thumbnail_size;
        let invocation = Invocation::new(&self.program).arg(source).args([
            "-flatten".to_string(),
            "-resize".to_string(),
            format!("{size}x{size}>"),
            "-quality".to_string(),
            self.settings.quality.to_string(),
        ]);
        let invocation = match &self.settings.watermark {
            // A light stroke under a white fill keeps the text legible on
            // both dark and light images.
            Some(text) => invocation.args([
                "-pointsize", "10", "-fill", "#cccb", "-stroke", "#cccb", "-strokewidth", "4", "-annotate", "+2+12",
                text.as_str(), "-fill", "#fffb", "-stroke", "none", "-annotate", "+2+12", text.as_str(),
            ]),
            None => invocation,
        };
        invocation.output(output)
    }
}

/// Parse `magick -list format` into the set of lowercase format names that
/// ImageMagick can read.
///
/// Rows look like `     PNG* PNG       rw-   Portable Network Graphics`:
/// the name (a trailing `*` marks a native blob), the module, then the
/// mode flags, whose first character is `r` for readable formats.
fn readable_formats(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let name = columns.next()?;
            let _module = columns.next()?;
            let mode = columns.next()?;
            mode.starts_with('r').then(|| name.trim_end_matches('*').to_lowercase())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use foldersort_convert::MockConverter;
    use foldersort_digest::{HashAlgorithm, digest_bytes};
    use std::sync::Arc;
    use time::OffsetDateTime;

    const LISTING: &str = "   Format  Mode  Description
--------------------------------------------------------------------------------
      3FR  DNG       r--   Hasselblad CFV/H3D39II Raw Format (0.21.2-Release)
      BMP* BMP       rw-   Microsoft Windows bitmap image
     HEIC  HEIC      ---   High Efficiency Image Format
      PNG* PNG       rw+   Portable Network Graphics (libpng 1.6.43)
     JPEG* JPEG      rw-   Joint Photographic Experts Group JFIF format
      XCF  XCF       r--   GIMP image
  MPEG     VIDEO     -w+   MPEG Video Stream
";

    #[test]
    fn test_readable_formats() {
        let formats = readable_formats(LISTING);
        for format in ["3fr", "bmp", "png", "jpeg", "xcf"] {
            assert!(formats.contains(format), "{format} should be readable");
        }
        assert!(!formats.contains("heic"));
        assert!(!formats.contains("mpeg"));
        assert!(!formats.contains("format"));
    }

    fn record(path: &Path, contents: &[u8]) -> FileRecord<Digested> {
        std::fs::write(path, contents).unwrap();
        FileRecord::new(path, contents.len() as u64, OffsetDateTime::UNIX_EPOCH)
            .with_digest(digest_bytes(contents, HashAlgorithm::Blake3))
    }

    fn handler(root: &Path, settings: ImageSettings, converter: &Arc<MockConverter>) -> ImageHandler {
        ImageHandler::new(root, settings, "magick".to_string(), converter.clone())
    }

    #[tokio::test]
    async fn test_small_png_is_only_relocated() {
        let root = tempfile::tempdir().unwrap();
        let converter = Arc::new(MockConverter::new());
        let handler = handler(root.path(), ImageSettings::default(), &converter);
        let record = record(&root.path().join("photo.png"), b"small png");

        let outcome = handler.handle(&record).await.unwrap();
        let expected = root.path().join("Images").join(record.digest.file_name("png"));
        assert_eq!(outcome.artifacts, vec![expected.clone()]);
        assert_eq!(outcome.notifications, vec![Notification::Handled(HandlerKind::Image)]);
        assert!(expected.exists());
        assert!(!record.path.exists());
        assert!(converter.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_large_png_gets_thumbnail() {
        let root = tempfile::tempdir().unwrap();
        let converter = Arc::new(MockConverter::new());
        let settings = ImageSettings { max_size_mb: 0, ..Default::default() };
        let handler = handler(root.path(), settings, &converter);
        let record = record(&root.path().join("big.png"), b"pretend this is large");

        let outcome = handler.handle(&record).await.unwrap();
        let images = root.path().join("Images");
        assert_eq!(
            outcome.artifacts,
            vec![
                images.join(record.digest.suffixed_file_name("_thumbnail", "png")),
                images.join(record.digest.file_name("png")),
            ]
        );
        assert_eq!(
            outcome.notifications,
            vec![Notification::Thumbnail(HandlerKind::Image), Notification::Handled(HandlerKind::Image)]
        );
        let calls = converter.invocations();
        assert_eq!(calls.len(), 1);
        let args: Vec<String> = calls[0].get_args().iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(&args[1..6], ["-flatten", "-resize", "720x720>", "-quality", "95"]);
    }

    #[tokio::test]
    async fn test_jpeg_is_converted_and_original_kept() {
        let root = tempfile::tempdir().unwrap();
        let converter = Arc::new(MockConverter::new());
        let settings = ImageSettings { watermark: Some("inbox".to_string()), ..Default::default() };
        let handler = handler(root.path(), settings, &converter);
        let record = record(&root.path().join("Holiday.JPG"), b"jpeg");

        let outcome = handler.handle(&record).await.unwrap();
        let images = root.path().join("Images");
        for name in [
            record.digest.suffixed_file_name("_thumbnail", "png"),
            record.digest.file_name("png"),
            record.digest.file_name("jpg"),
        ] {
            assert!(images.join(&name).exists(), "{name} missing");
        }
        assert_eq!(std::fs::read_dir(&images).unwrap().count(), 3, "no scratch files left behind");
        assert!(!record.path.exists());
        assert_eq!(
            outcome.notifications,
            vec![
                Notification::Thumbnail(HandlerKind::Image),
                Notification::Converted(HandlerKind::Image),
                Notification::Handled(HandlerKind::Image),
            ]
        );
        let thumbnail = &converter.invocations()[0];
        assert!(thumbnail.get_args().iter().filter(|a| *a == "inbox").count() == 2);
    }

    #[tokio::test]
    async fn test_failed_conversion_keeps_source() {
        let root = tempfile::tempdir().unwrap();
        let converter = Arc::new(MockConverter::new().failing("magick"));
        let handler = handler(root.path(), ImageSettings::default(), &converter);
        let record = record(&root.path().join("photo.heic"), b"heic");

        let err = handler.handle(&record).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Conversion));
        assert!(record.path.exists());
        let images = root.path().join("Images");
        assert!(!images.join(record.digest.file_name("png")).exists());
        assert_eq!(std::fs::read_dir(&images).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_probe_filters_extensions() {
        let root = tempfile::tempdir().unwrap();
        let converter = Arc::new(MockConverter::new().with_stdout("magick", LISTING));
        let settings = ImageSettings {
            extensions: vec!["png".into(), "bmp".into(), "heic".into()],
            probe: true,
            ..Default::default()
        };
        let handler = handler(root.path(), settings, &converter);
        assert_eq!(handler.supported_extensions().await, vec!["png".to_string(), "bmp".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_probe_keeps_configured_extensions() {
        let root = tempfile::tempdir().unwrap();
        let converter = Arc::new(MockConverter::new().failing("magick"));
        let settings = ImageSettings { probe: true, ..Default::default() };
        let handler = handler(root.path(), settings, &converter);
        assert_eq!(handler.supported_extensions().await, ImageSettings::default().extensions);
    }
}
