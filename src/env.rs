use std::env as stdenv;
use std::path::PathBuf;

/// Interpreter state visible to built-in commands.
///
/// - `home`: `$HOME` at start-up, the target of a bare `cd`.
/// - `current_dir`: the working directory, kept in sync with the process by `cd`.
/// - `should_exit`: set by `exit`; the interactive loop stops when it sees it.
#[derive(Debug, Clone)]
pub struct Environment {
    pub home: Option<PathBuf>,
    pub current_dir: PathBuf,
    pub should_exit: bool,
}

impl Environment {
    /// Capture the current process state.
    pub fn new() -> Self {
        let home = stdenv::var_os("HOME")
            .filter(|h| !h.is_empty())
            .map(PathBuf::from);
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            home,
            current_dir,
            should_exit: false,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
