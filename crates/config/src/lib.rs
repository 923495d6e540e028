//! Configuration loading and validation.
//!
//! Configuration is assembled by [`figment`] from several layers, lowest
//! priority first:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. A config file: either the one passed explicitly, or
//!    `foldersort.{toml,yaml,yml,json}` in the platform config directory.
//! 3. The legacy `FOLDER_PATH` environment variable (maps to `root`).
//! 4. `FOLDERSORT_*` environment variables, with `__` separating nested keys
//!    (`FOLDERSORT_CONVERTER__MAX_CONCURRENT=4`).
//! 5. Command-line [`Overrides`].
//!
//! The result is validated once and then passed around explicitly; nothing in
//! the workspace reads the environment on its own.

pub mod error;
mod settings;

pub use crate::settings::{
    ConverterSettings, DuplicatePolicy, HandlerKind, ImageSettings, RelocateSettings, VideoSettings,
};
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use foldersort_digest::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

const APPLICATION: &str = "foldersort";
const ENV_PREFIX: &str = "FOLDERSORT_";
const LEGACY_ROOT_VAR: &str = "FOLDER_PATH";

/// Fully merged configuration for one run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The single watched directory. Handler folders are created inside it.
    pub root: PathBuf,
    /// Keep watching after the initial scan.
    pub watch: bool,
    /// Quiet period after an add-event before the file is touched, so slow
    /// writers (downloads) can finish.
    pub debounce_ms: u64,
    pub hash: HashAlgorithm,
    pub duplicates: DuplicatePolicy,
    /// Folder (inside the root) used by [`DuplicatePolicy::Quarantine`].
    pub duplicates_dir: String,
    /// Handler registration order; later entries win extension conflicts.
    pub handlers: Vec<HandlerKind>,
    pub converter: ConverterSettings,
    pub image: ImageSettings,
    pub video: VideoSettings,
    pub archive: RelocateSettings,
    pub executable: RelocateSettings,
    pub document: RelocateSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            watch: true,
            debounce_ms: 5_000,
            hash: HashAlgorithm::default(),
            duplicates: DuplicatePolicy::default(),
            duplicates_dir: "Duplicates".to_string(),
            handlers: HandlerKind::DEFAULT_ORDER.to_vec(),
            converter: ConverterSettings::default(),
            image: ImageSettings::default(),
            video: VideoSettings::default(),
            archive: RelocateSettings::archive(),
            executable: RelocateSettings::executable(),
            document: RelocateSettings::document(),
        }
    }
}

/// Values supplied on the command line. `None` means "not specified".
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub watch: Option<bool>,
    pub debounce_ms: Option<u64>,
    pub duplicates: Option<DuplicatePolicy>,
}

impl Config {
    /// Defaults rooted at `root`, skipping every external source.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), ..Self::default() }
    }

    /// Load, merge and validate configuration from all layers.
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let config = Self::figment(overrides)?
            .extract::<Self>()
            .map_err(|e| ErrorKind::Invalid(e.to_string()))?;
        config.validate()?;
        tracing::debug!(root = %config.root.display(), handlers = ?config.handlers, "Configuration loaded");
        Ok(config)
    }

    /// Build the layered [`Figment`] without extracting it.
    pub fn figment(overrides: &Overrides) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        match &overrides.config_file {
            Some(file) => {
                if !file.is_file() {
                    exn::bail!(ErrorKind::FileNotFound(file.clone()));
                }
                figment = match file.extension().and_then(|e| e.to_str()) {
                    Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
                    Some("json") => figment.merge(Json::file(file)),
                    _ => figment.merge(Toml::file(file)),
                };
            },
            None => {
                if let Some(dir) = default_config_dir() {
                    tracing::trace!(dir = %dir.display(), "Looking for configuration files");
                    figment = figment
                        .merge(Toml::file(dir.join("foldersort.toml")))
                        .merge(Yaml::file(dir.join("foldersort.yaml")))
                        .merge(Yaml::file(dir.join("foldersort.yml")))
                        .merge(Json::file(dir.join("foldersort.json")));
                }
            },
        }
        figment = figment
            .merge(Env::raw().only(&[LEGACY_ROOT_VAR]).map(|_| "root".into()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        if let Some(root) = &overrides.root {
            figment = figment.merge(Serialized::default("root", root));
        }
        if let Some(watch) = overrides.watch {
            figment = figment.merge(Serialized::default("watch", watch));
        }
        if let Some(debounce_ms) = overrides.debounce_ms {
            figment = figment.merge(Serialized::default("debounce_ms", debounce_ms));
        }
        if let Some(duplicates) = overrides.duplicates {
            figment = figment.merge(Serialized::default("duplicates", duplicates));
        }
        Ok(figment)
    }

    /// Check everything that deserialization alone can't.
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            exn::bail!(ErrorKind::MissingRoot);
        }
        if !self.root.is_absolute() {
            exn::bail!(ErrorKind::RootNotAbsolute(self.root.clone()));
        }
        if !self.root.is_dir() {
            exn::bail!(ErrorKind::RootNotDirectory(self.root.clone()));
        }
        let mut seen = HashSet::new();
        let directories = [
            &self.image.directory,
            &self.video.directory,
            &self.archive.directory,
            &self.executable.directory,
            &self.document.directory,
            &self.duplicates_dir,
        ];
        for name in directories {
            if !is_single_component(name) {
                exn::bail!(ErrorKind::InvalidDirectory(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                exn::bail!(ErrorKind::DuplicateDirectory(name.clone()));
            }
        }
        if self.image.quality > 100 {
            exn::bail!(ErrorKind::OutOfRange { field: "image.quality", reason: "must be between 0 and 100" });
        }
        if self.image.thumbnail_size == 0 {
            exn::bail!(ErrorKind::OutOfRange { field: "image.thumbnail_size", reason: "must be greater than 0" });
        }
        if self.converter.timeout_secs == Some(0) {
            exn::bail!(ErrorKind::OutOfRange { field: "converter.timeout_secs", reason: "must be greater than 0" });
        }
        if self.handlers.is_empty() {
            tracing::warn!("No handlers configured; every file will be left in place");
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn converter_timeout(&self) -> Option<Duration> {
        self.converter.timeout_secs.map(Duration::from_secs)
    }

    /// Absolute path of the quarantine folder.
    pub fn duplicates_path(&self) -> PathBuf {
        self.root.join(&self.duplicates_dir)
    }
}

/// Platform configuration directory (`~/.config/foldersort` on Linux).
pub fn default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", APPLICATION).map(|dirs| dirs.config_dir().to_path_buf())
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;

    fn write_config(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[rstest]
    #[case("Images", true)]
    #[case("My Videos", true)]
    #[case("", false)]
    #[case(".", false)]
    #[case("..", false)]
    #[case("a/b", false)]
    #[case("/abs", false)]
    fn test_single_component(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_single_component(name), expected);
    }

    #[test]
    fn test_defaults_validate_with_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_root(dir.path());
        config.validate().unwrap();
        assert_eq!(config.debounce(), Duration::from_secs(5));
        assert_eq!(config.converter_timeout(), None);
        assert_eq!(config.duplicates_path(), dir.path().join("Duplicates"));
    }

    #[test]
    fn test_missing_root() {
        let err = Config::default().validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::MissingRoot));
    }

    #[test]
    fn test_relative_root() {
        let err = Config::for_root("relative/inbox").validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::RootNotAbsolute(_)));
    }

    #[test]
    fn test_root_must_be_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = Config::for_root(file.path()).validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::RootNotDirectory(_)));
    }

    #[test]
    fn test_shared_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::for_root(dir.path());
        config.document.directory = "Images".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::DuplicateDirectory(name) if name == "Images"));
    }

    #[test]
    fn test_nested_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::for_root(dir.path());
        config.archive.directory = "../Archives".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidDirectory(_)));
    }

    #[test]
    fn test_toml_file_merges_nested_tables() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_config(
            dir.path(),
            "foldersort.toml",
            &format!(
                "root = {:?}\nhash = \"sha256\"\nduplicates = \"quarantine\"\n\n[image]\nmax_size_mb = 2\n",
                dir.path().display().to_string()
            ),
        );
        let overrides = Overrides { config_file: Some(file), ..Default::default() };
        let config = Config::figment(&overrides).unwrap().extract::<Config>().unwrap();
        assert_eq!(config.root, dir.path());
        assert_eq!(config.hash, HashAlgorithm::Sha256);
        assert_eq!(config.duplicates, DuplicatePolicy::Quarantine);
        assert_eq!(config.image.max_size_mb, 2);
        // Untouched keys in the same table keep their defaults.
        assert_eq!(config.image.target_extension, "png");
        assert_eq!(config.archive, RelocateSettings::archive());
    }

    #[test]
    fn test_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_config(dir.path(), "foldersort.yaml", "handlers: [video, image]\nvideo:\n  preset: slow\n");
        let overrides = Overrides { config_file: Some(file), ..Default::default() };
        let config = Config::figment(&overrides).unwrap().extract::<Config>().unwrap();
        assert_eq!(config.handlers, vec![HandlerKind::Video, HandlerKind::Image]);
        assert_eq!(config.video.preset, "slow");
        assert_eq!(config.video.video_codec, "libx265");
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = Overrides { config_file: Some(dir.path().join("missing.toml")), ..Default::default() };
        let err = Config::figment(&overrides).unwrap_err();
        assert!(matches!(&*err, ErrorKind::FileNotFound(_)));
    }

    #[test]
    fn test_environment_and_overrides() {
        figment::Jail::expect_with(|jail| {
            let root = jail.directory().to_path_buf();
            jail.create_file("foldersort.toml", "debounce_ms = 100")?;
            jail.set_env("FOLDER_PATH", "/legacy/root");
            jail.set_env("FOLDERSORT_DEBOUNCE_MS", "250");
            jail.set_env("FOLDERSORT_CONVERTER__MAX_CONCURRENT", "7");
            let mut overrides = Overrides {
                config_file: Some(root.join("foldersort.toml")),
                ..Default::default()
            };
            let config = Config::figment(&overrides).unwrap().extract::<Config>()?;
            assert_eq!(config.root, PathBuf::from("/legacy/root"));
            assert_eq!(config.debounce_ms, 250);
            assert_eq!(config.converter.max_concurrent, 7);

            overrides.root = Some(root.clone());
            overrides.debounce_ms = Some(10);
            overrides.duplicates = Some(DuplicatePolicy::Delete);
            let config = Config::load(&overrides).unwrap();
            assert_eq!(config.root, root);
            assert_eq!(config.debounce_ms, 10);
            assert_eq!(config.duplicates, DuplicatePolicy::Delete);
            Ok(())
        });
    }
}
