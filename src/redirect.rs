//! Trailing `>`, `>>` and `<` redirection of a single stage.

use nix::unistd::dup2;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

/// Where a stage's standard input or output is redirected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirection {
    /// `> file`: create or truncate, replace standard output.
    Truncate(PathBuf),
    /// `>> file`: create or append, replace standard output.
    Append(PathBuf),
    /// `< file`: open read-only, replace standard input.
    Input(PathBuf),
}

impl Redirection {
    pub fn path(&self) -> &Path {
        match self {
            Redirection::Truncate(p) | Redirection::Append(p) | Redirection::Input(p) => p,
        }
    }

    /// The descriptor this redirection replaces.
    pub fn target_fd(&self) -> RawFd {
        match self {
            Redirection::Input(_) => libc::STDIN_FILENO,
            _ => libc::STDOUT_FILENO,
        }
    }

    /// Opens the file and duplicates it over the target descriptor.
    ///
    /// Output files are created with mode 0666 (minus umask). The opened file is
    /// closed again once duplicated.
    pub fn apply(&self) -> io::Result<()> {
        let file = self.open()?;
        dup2(file.as_raw_fd(), self.target_fd()).map_err(io::Error::from)?;
        Ok(())
    }

    fn open(&self) -> io::Result<File> {
        let mut options = OpenOptions::new();
        match self {
            Redirection::Truncate(_) => options.write(true).create(true).truncate(true),
            Redirection::Append(_) => options.append(true).create(true),
            Redirection::Input(_) => options.read(true),
        };
        options.open(self.path())
    }
}

/// Detects a trailing redirection and strips the operator and filename.
///
/// Only the second-to-last token is inspected, so at most one redirection per
/// stage is recognized: `>>` appends, any token starting with `>` truncates and
/// `<` reads.
pub fn resolve(mut tokens: Vec<String>) -> (Vec<String>, Option<Redirection>) {
    if tokens.len() < 2 {
        return (tokens, None);
    }

    let operator = tokens[tokens.len() - 2].as_str();
    let make: fn(PathBuf) -> Redirection = if operator == ">>" {
        Redirection::Append
    } else if operator.starts_with('>') {
        Redirection::Truncate
    } else if operator == "<" {
        Redirection::Input
    } else {
        return (tokens, None);
    };

    let target = tokens.pop().map(PathBuf::from).unwrap_or_default();
    tokens.pop();
    (tokens, Some(make(target)))
}
