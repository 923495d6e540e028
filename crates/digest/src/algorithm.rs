use crate::error::{Error, ErrorKind};
use sha2::Digest;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// A supported content hashing algorithm.
///
/// Both produce 256-bit digests rendered as 64 lowercase hex characters, so a
/// digest string alone does not tell you which algorithm made it. Never mix
/// algorithms within one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

impl HashAlgorithm {
    /// Length of the hex-encoded digest.
    pub const HEX_LEN: usize = 64;

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blake3 => "blake3",
            Self::Sha256 => "sha256",
        }
    }

    pub(crate) fn hasher(&self) -> Hasher {
        match self {
            Self::Blake3 => Hasher::Blake3(Box::new(blake3::Hasher::new())),
            Self::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
        }
    }
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blake3" | "b3" => Ok(Self::Blake3),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => exn::bail!(ErrorKind::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Incremental hashing state for one of the supported algorithms.
pub(crate) enum Hasher {
    // Boxed; the BLAKE3 state is nearly 2 KiB.
    Blake3(Box<blake3::Hasher>),
    Sha256(sha2::Sha256),
}

impl Hasher {
    pub(crate) fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Blake3(h) => {
                h.update(bytes);
            },
            Self::Sha256(h) => h.update(bytes),
        }
    }

    pub(crate) fn finalize_hex(self) -> String {
        match self {
            Self::Blake3(h) => h.finalize().to_hex().to_string(),
            Self::Sha256(h) => format!("{:x}", h.finalize()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("blake3", HashAlgorithm::Blake3)]
    #[case("B3", HashAlgorithm::Blake3)]
    #[case("sha256", HashAlgorithm::Sha256)]
    #[case(" SHA-256 ", HashAlgorithm::Sha256)]
    fn test_from_str(#[case] input: &str, #[case] expected: HashAlgorithm) {
        assert_eq!(input.parse::<HashAlgorithm>().unwrap(), expected);
    }

    #[test]
    fn test_from_str_unknown() {
        let err = "md5".parse::<HashAlgorithm>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnknownAlgorithm(name) if name == "md5"));
    }

    #[test]
    fn test_default_is_blake3() {
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::Blake3);
    }
}
