//! Per-component settings blocks.
//!
//! Each block is a plain data struct with its own defaults. The defaults are
//! fed into figment as the lowest layer, so a config file only has to mention
//! the keys it changes, even inside nested tables.

use serde::{Deserialize, Serialize};
use std::fmt;

fn extensions(list: &[&str]) -> Vec<String> {
    list.iter().map(|e| (*e).to_string()).collect()
}

/// The closed set of handler types, in the order they can be registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    Image,
    Video,
    Archive,
    Executable,
    Document,
}

impl HandlerKind {
    /// Registration order used when the configuration doesn't specify one.
    ///
    /// Later entries win extension conflicts, so order matters.
    pub const DEFAULT_ORDER: [HandlerKind; 5] = [
        HandlerKind::Image,
        HandlerKind::Archive,
        HandlerKind::Executable,
        HandlerKind::Video,
        HandlerKind::Document,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Archive => "archive",
            Self::Executable => "executable",
            Self::Document => "document",
        }
    }
}
impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a file whose content has already been seen this run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Log the relationship and leave the duplicate where it is.
    #[default]
    Keep,
    /// Remove the duplicate file.
    Delete,
    /// Move the duplicate into the duplicates directory under a
    /// digest-and-timestamp name.
    Quarantine,
}

/// External converter process settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConverterSettings {
    /// Upper bound on converter processes running at once. `0` disables the
    /// limit entirely.
    pub max_concurrent: usize,
    /// Kill a converter that runs longer than this. Unset means wait forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// ImageMagick executable, resolved via `PATH` unless absolute.
    pub imagemagick: String,
    /// FFmpeg executable, resolved via `PATH` unless absolute.
    pub ffmpeg: String,
}
impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            timeout_secs: None,
            imagemagick: "magick".to_string(),
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSettings {
    pub directory: String,
    pub extensions: Vec<String>,
    /// Format every image is normalized to.
    pub target_extension: String,
    /// Sources larger than this (in MiB) always get a thumbnail.
    pub max_size_mb: u64,
    /// Bounding box (in pixels) for the long edge of a thumbnail.
    pub thumbnail_size: u32,
    pub quality: u8,
    /// Text stamped into the corner of thumbnails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark: Option<String>,
    /// Ask ImageMagick which formats it can read and drop the rest.
    pub probe: bool,
}
impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            directory: "Images".to_string(),
            extensions: extensions(&["png", "jpg", "jpeg", "bmp", "svg", "eps", "psd", "ai", "heic"]),
            target_extension: "png".to_string(),
            max_size_mb: 8,
            thumbnail_size: 720,
            quality: 95,
            watermark: None,
            probe: false,
        }
    }
}
impl ImageSettings {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSettings {
    pub directory: String,
    pub extensions: Vec<String>,
    /// Container every video is transcoded to.
    pub target_extension: String,
    pub video_codec: String,
    pub preset: String,
    pub audio_codec: String,
    pub audio_bitrate: String,
}
impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            directory: "Videos".to_string(),
            extensions: extensions(&["mov", "webm", "webp", "gif", "hevc", "flv", "mkv", "3gpp", "mp4"]),
            target_extension: "mp4".to_string(),
            video_codec: "libx265".to_string(),
            preset: "faster".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "96k".to_string(),
        }
    }
}

/// Settings for handlers that only relocate files (no conversion).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocateSettings {
    pub directory: String,
    pub extensions: Vec<String>,
}
impl RelocateSettings {
    pub fn archive() -> Self {
        Self {
            directory: "Archives".to_string(),
            extensions: extensions(&["7z", "zip", "rar", "tar", "bz2", "bzip2"]),
        }
    }

    pub fn executable() -> Self {
        Self {
            directory: "Executables".to_string(),
            extensions: extensions(&["exe", "msi"]),
        }
    }

    pub fn document() -> Self {
        Self {
            directory: "Documents".to_string(),
            extensions: extensions(&["pdf"]),
        }
    }
}
