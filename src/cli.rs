use clap::{ArgAction, Parser, ValueEnum};
use foldersort_config::{DuplicatePolicy, Overrides};
use std::path::PathBuf;

/// Sort files dropped into a folder into per-type subfolders, named by
/// content digest.
#[derive(Debug, Parser)]
#[command(name = "foldersort", version, about)]
pub struct Cli {
    /// Folder to triage. Falls back to `root` in the configuration file,
    /// then the `FOLDER_PATH` environment variable.
    pub root: Option<PathBuf>,
    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Process what is already in the folder, then exit.
    #[arg(long)]
    pub once: bool,
    /// Quiet period after a file appears before it is touched.
    #[arg(long, value_name = "MS")]
    pub debounce_ms: Option<u64>,
    /// What to do with files whose content was already seen.
    #[arg(long, value_enum, value_name = "POLICY")]
    pub duplicates: Option<DuplicatesArg>,
    /// More output; repeat for more (`-vv`). `RUST_LOG` wins if set.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DuplicatesArg {
    /// Leave duplicates where they are
    Keep,
    /// Delete duplicates
    Delete,
    /// Move duplicates into the duplicates folder
    Quarantine,
}
impl From<DuplicatesArg> for DuplicatePolicy {
    fn from(arg: DuplicatesArg) -> Self {
        match arg {
            DuplicatesArg::Keep => Self::Keep,
            DuplicatesArg::Delete => Self::Delete,
            DuplicatesArg::Quarantine => Self::Quarantine,
        }
    }
}

impl Cli {
    /// Command-line values layered on top of every other configuration
    /// source. A relative root is resolved against the working directory.
    pub fn overrides(&self) -> std::io::Result<Overrides> {
        let root = self.root.as_deref().map(std::path::absolute).transpose()?;
        Ok(Overrides {
            config_file: self.config.clone(),
            root,
            watch: self.once.then_some(false),
            debounce_ms: self.debounce_ms,
            duplicates: self.duplicates.map(Into::into),
        })
    }

    /// Default `tracing` directives for the verbosity level.
    pub fn log_directives(&self) -> String {
        let level = match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        let crates = [
            "foldersort",
            "foldersort_config",
            "foldersort_convert",
            "foldersort_digest",
            "foldersort_handlers",
            "foldersort_storage",
            "foldersort_triage",
        ];
        let mut directives = String::from("warn");
        for name in crates {
            directives.push_str(&format!(",{name}={level}"));
        }
        directives
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults_override_nothing() {
        let cli = Cli::try_parse_from(["foldersort"]).unwrap();
        let overrides = cli.overrides().unwrap();
        assert!(overrides.root.is_none());
        assert!(overrides.watch.is_none());
        assert!(overrides.debounce_ms.is_none());
        assert!(overrides.duplicates.is_none());
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "foldersort",
            "/home/me/Downloads",
            "--config",
            "sort.yaml",
            "--once",
            "--debounce-ms",
            "250",
            "--duplicates",
            "quarantine",
            "-vv",
        ])
        .unwrap();
        let overrides = cli.overrides().unwrap();
        assert_eq!(overrides.root, Some(PathBuf::from("/home/me/Downloads")));
        assert_eq!(overrides.config_file, Some(PathBuf::from("sort.yaml")));
        assert_eq!(overrides.watch, Some(false));
        assert_eq!(overrides.debounce_ms, Some(250));
        assert_eq!(overrides.duplicates, Some(DuplicatePolicy::Quarantine));
        assert!(cli.log_directives().contains("foldersort_triage=trace"));
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let cli = Cli::try_parse_from(["foldersort", "inbox"]).unwrap();
        let root = cli.overrides().unwrap().root.unwrap();
        assert!(root.is_absolute());
        assert!(root.ends_with("inbox"));
    }

    #[rstest]
    #[case(0, "foldersort=info")]
    #[case(1, "foldersort=debug")]
    #[case(5, "foldersort=trace")]
    fn test_log_directives(#[case] verbose: u8, #[case] expected: &str) {
        let cli = Cli { verbose, ..Cli::try_parse_from(["foldersort"]).unwrap() };
        let directives = cli.log_directives();
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains(expected), "{directives}");
    }
}
