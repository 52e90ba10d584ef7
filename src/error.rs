use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;

/// Errors the interpreter reports to the user. None of them end the session.
#[derive(Debug)]
pub enum ShellError {
    /// `fork` (or the pipe feeding it) failed; the stage is abandoned.
    ProcessCreationFailed(nix::Error),
    /// The program of a stage could not be launched.
    ExecutionFailed(String),
    /// `cd` target does not exist or is not accessible.
    DirectoryNotFound(PathBuf),
    /// The file named by a redirection could not be opened.
    RedirectionFailed(PathBuf),
}

impl ShellError {
    /// Numeric code shown in the report banner.
    pub fn code(&self) -> u8 {
        match self {
            ShellError::ProcessCreationFailed(_) => 0,
            ShellError::ExecutionFailed(_) => 1,
            ShellError::DirectoryNotFound(_) => 2,
            ShellError::RedirectionFailed(_) => 3,
        }
    }

    /// The colorized, newline-terminated report line.
    pub fn render(&self) -> String {
        format!("\x1b[0;31mError ({}):\x1b[0m {}\n", self.code(), self)
    }

    /// Write the report to `out`.
    pub fn report_to(&self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(self.render().as_bytes())?;
        out.flush()
    }

    /// Write the report to standard error.
    pub fn report(&self) {
        log::debug!("reporting {:?}", self);
        let _ = self.report_to(&mut io::stderr().lock());
    }
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellError::ProcessCreationFailed(e) => {
                write!(f, "child process could not be created ({e}).")
            }
            ShellError::ExecutionFailed(what) if what.is_empty() => {
                write!(f, "unexpected error during process execution.")
            }
            ShellError::ExecutionFailed(what) => {
                write!(f, "unexpected error during process execution: {what}")
            }
            ShellError::DirectoryNotFound(dir) => write!(f, "no such directory: {}", dir.display()),
            ShellError::RedirectionFailed(path) => {
                write!(f, "could not open {} for redirection", path.display())
            }
        }
    }
}

impl std::error::Error for ShellError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShellError::ProcessCreationFailed(e) => Some(e),
            _ => None,
        }
    }
}
