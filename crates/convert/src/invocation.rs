use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

/// One external program call: executable name plus arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
    output: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self { program: program.into(), args: Vec::new(), output: None }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append the file the program writes to. Recorded separately so callers
    /// (and test doubles) know which argument is the produced artifact.
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.args.push(path.clone().into_os_string());
        self.output = Some(path);
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    pub(crate) fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Captured output of a successful run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_display() {
        let invocation = Invocation::new("magick")
            .arg("in.heic")
            .args(["-resize", "720x720>"])
            .output("/tmp/out.png");
        assert_eq!(invocation.program(), "magick");
        assert_eq!(invocation.get_args().len(), 4);
        assert_eq!(invocation.output_path(), Some(Path::new("/tmp/out.png")));
        assert_eq!(invocation.to_string(), "magick in.heic -resize 720x720> /tmp/out.png");
    }

    #[test]
    fn test_no_output() {
        let invocation = Invocation::new("magick").args(["-list", "format"]);
        assert_eq!(invocation.output_path(), None);
    }
}
