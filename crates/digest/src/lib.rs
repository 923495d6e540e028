//! Content identity for files.
//!
//! A [`ContentDigest`] is computed by streaming every byte of a file through a
//! cryptographic hash ([`HashAlgorithm`]). It serves two purposes downstream:
//!
//! - the **deduplication key**: two files with the same digest are treated as
//!   the same content, and
//! - the **artifact name stem**: outputs are written as `<digest>.<ext>`, so
//!   reprocessing identical content always lands on the same file name.
//!
//! Digest collisions are treated as impossible. That is an accepted
//! approximation for best-effort deduplication of a downloads folder, not a
//! guarantee; don't build anything that needs one on top of it.

mod algorithm;
pub mod error;

pub use crate::algorithm::HashAlgorithm;
use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs::File;
use std::io::{ErrorKind as IoErrorKind, Read};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::instrument;

/// Files are read in 64 KiB chunks; large videos never sit in memory.
const BUFFER_CAPACITY: usize = 64 * 1024;

/// Hex-encoded digest of a file's full contents.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest(String);

impl ContentDigest {
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name for an artifact of this content: `<digest>.<extension>`.
    ///
    /// An empty extension yields the bare digest.
    #[must_use]
    pub fn file_name(&self, extension: &str) -> String {
        match extension {
            "" => self.0.clone(),
            ext => format!("{}.{ext}", self.0),
        }
    }

    /// File name for a derived artifact: `<digest><suffix>.<extension>`.
    #[must_use]
    pub fn suffixed_file_name(&self, suffix: &str, extension: &str) -> String {
        match extension {
            "" => format!("{}{suffix}", self.0),
            ext => format!("{}{suffix}.{ext}", self.0),
        }
    }
}

impl Display for ContentDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentDigest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContentDigest {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.len() != HashAlgorithm::HEX_LEN || !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            exn::bail!(ErrorKind::InvalidDigest(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

/// Digest everything `reader` yields until end-of-stream.
///
/// The stream is always drained completely; a read error part-way through
/// aborts with [`ErrorKind::Io`] rather than returning a digest of a prefix.
pub fn digest_reader<R: Read>(mut reader: R, algorithm: HashAlgorithm) -> Result<ContentDigest> {
    let mut hasher = algorithm.hasher();
    let mut buffer = vec![0; BUFFER_CAPACITY];
    loop {
        let bytes = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(bytes) => bytes,
            Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
            Err(e) => return Err(ErrorKind::Io(e).into()),
        };
        hasher.update(&buffer[..bytes]);
    }
    Ok(ContentDigest(hasher.finalize_hex()))
}

/// Digest an in-memory byte slice. Handy for tests and small payloads.
#[must_use]
pub fn digest_bytes(bytes: &[u8], algorithm: HashAlgorithm) -> ContentDigest {
    let mut hasher = algorithm.hasher();
    hasher.update(bytes);
    ContentDigest(hasher.finalize_hex())
}

/// Digest the file at `path` on the blocking thread pool.
///
/// # Errors
/// - [`ErrorKind::NotFound`] if the file vanished; callers racing the
///   filesystem usually want to treat this as "nothing to do".
/// - [`ErrorKind::PermissionDenied`] / [`ErrorKind::Io`] otherwise.
#[instrument(skip_all, fields(path = %path.as_ref().display(), %algorithm))]
pub async fn digest_file(path: impl AsRef<std::path::Path>, algorithm: HashAlgorithm) -> Result<ContentDigest> {
    let path: PathBuf = path.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<ContentDigest> {
        let file = File::open(&path).map_err(|e| ErrorKind::from_io(e, &path))?;
        let digest = digest_reader(file, algorithm).map_err(|e| {
            tracing::debug!(path = %path.display(), error = ?e, "Failed reading file for digest");
            e
        })?;
        tracing::trace!(path = %path.display(), digest = %digest, "Digest computed");
        Ok(digest)
    })
    .await
    .or_raise(|| ErrorKind::Join)?
}
