use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::error::ShellError;
use crate::interpreter::Factory;
use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use regex::Regex;
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Names the command answers to, e.g. `["clear", "cls"]`.
    fn names() -> &'static [&'static str];

    /// Whether a line like `name something` still selects this command.
    fn takes_argument() -> bool {
        true
    }

    /// Executes the command. 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self, stdout, env) {
            Ok(x) => Ok(x),
            Err(e) => {
                match e.downcast_ref::<ShellError>() {
                    Some(err) => err.report_to(stdout)?,
                    None => writeln!(stdout, "{}", e)?,
                }
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", self.output)?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if !T::names().contains(&name) || (!args.is_empty() && !T::takes_argument()) {
            return None;
        }

        // Everything after the name is taken literally, dashes included.
        let mut argv = Vec::with_capacity(args.len() + 1);
        if !args.is_empty() {
            argv.push("--");
            argv.extend_from_slice(args);
        }

        Some(match T::from_args(&[name], &argv) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        })
    }
}

static BUILTIN_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>exit|clear|cls|cd|pwd|color)(?: (?P<arg>.*))?$")
        .expect("builtin pattern is valid")
});

/// Splits a raw input line into a built-in name and its (verbatim) argument.
///
/// Returns `None` when the line does not start with a built-in name followed by
/// either the end of the line or a single space.
pub fn recognize(line: &str) -> Option<(&str, Option<&str>)> {
    let caps = BUILTIN_LINE.captures(line)?;
    let name = caps.name("name")?.as_str();
    let arg = caps.name("arg").map(|m| m.as_str());
    Some((name, arg))
}

/// ANSI sequences selectable with `color`.
pub const COLORS: &[(&str, &str)] = &[
    ("red", "\x1b[0;31m"),
    ("bred", "\x1b[1;31m"),
    ("green", "\x1b[0;32m"),
    ("bgreen", "\x1b[1;32m"),
    ("yellow", "\x1b[0;33m"),
    ("byellow", "\x1b[01;33m"),
    ("blue", "\x1b[0;34m"),
    ("bblue", "\x1b[1;34m"),
    ("magenta", "\x1b[0;35m"),
    ("bmagenta", "\x1b[1;35m"),
    ("cyan", "\x1b[0;36m"),
    ("bcyan", "\x1b[1;36m"),
    ("reset", "\x1b[0m"),
];

pub fn color_sequence(name: &str) -> Option<&'static str> {
    COLORS.iter().find(|(n, _)| *n == name).map(|(_, seq)| *seq)
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {
    #[argh(positional, greedy)]
    /// ignored, like most shells do.
    pub _ignored: Vec<String>,
}

impl BuiltinCommand for Pwd {
    fn names() -> &'static [&'static str] {
        &["pwd"]
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory.
    /// Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn names() -> &'static [&'static str] {
        &["cd"]
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match &env.home {
                Some(home) => home.clone(),
                None => return Err(anyhow::anyhow!("cd: no target and HOME not set")),
            },
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical =
            fs::canonicalize(&new_dir).map_err(|_| ShellError::DirectoryNotFound(new_dir.clone()))?;
        env::set_current_dir(&canonical).map_err(|_| ShellError::DirectoryNotFound(new_dir))?;

        log::debug!("cd {}", canonical.display());
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Leave the shell with status 0.
pub struct Exit {}

impl BuiltinCommand for Exit {
    fn names() -> &'static [&'static str] {
        &["exit"]
    }

    fn takes_argument() -> bool {
        false
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Clear the terminal.
pub struct Clear {}

impl BuiltinCommand for Clear {
    fn names() -> &'static [&'static str] {
        &["clear", "cls"]
    }

    fn takes_argument() -> bool {
        false
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        write!(stdout, "\x1b[2J\x1b[1;1H")?;
        stdout.flush()?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Switch the text color of the terminal.
pub struct Color {
    #[argh(positional)]
    /// one of red, green, yellow, blue, magenta, cyan (each also with a `b`
    /// prefix for bold) or reset.
    pub name: Option<String>,
}

impl BuiltinCommand for Color {
    fn names() -> &'static [&'static str] {
        &["color"]
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        let seq = self
            .name
            .as_deref()
            .and_then(color_sequence)
            .ok_or_else(|| anyhow::anyhow!("[color] error: no such color found."))?;
        write!(stdout, "{}", seq)?;
        stdout.flush()?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env as stdenv;
    use std::io;
    use std::sync::{Mutex, MutexGuard};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: Mutex<()> = Mutex::new(());
        MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn test_env() -> Environment {
        Environment {
            home: None,
            current_dir: stdenv::current_dir().unwrap(),
            should_exit: false,
        }
    }

    fn make_unique_temp_dir() -> io::Result<PathBuf> {
        let mut p = stdenv::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        p.push(format!("builtin_test_cd_{}_{}", std::process::id(), nanos));
        fs::create_dir_all(&p)?;
        Ok(p)
    }

    fn create(name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        let env = test_env();
        let factories: Vec<Box<dyn CommandFactory>> = vec![
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<Clear>::default()),
            Box::new(Factory::<Color>::default()),
        ];
        factories.iter().find_map(|f| f.try_create(&env, name, args))
    }

    #[test]
    fn test_recognize() {
        assert_eq!(recognize("exit"), Some(("exit", None)));
        assert_eq!(recognize("cd /tmp"), Some(("cd", Some("/tmp"))));
        assert_eq!(recognize("cd "), Some(("cd", Some(""))));
        assert_eq!(recognize("pwd -L extra"), Some(("pwd", Some("-L extra"))));
        assert_eq!(recognize("color reset"), Some(("color", Some("reset"))));
        assert_eq!(recognize("cls"), Some(("cls", None)));
        assert_eq!(recognize("cdx"), None);
        assert_eq!(recognize("colorful"), None);
        assert_eq!(recognize("ls | cd"), None);
    }

    #[test]
    fn test_exit_and_clear_refuse_arguments() {
        assert!(create("exit", &[]).is_some());
        assert!(create("exit", &["now"]).is_none());
        assert!(create("clear", &["x"]).is_none());
        assert!(create("cls", &[]).is_some());
    }

    #[test]
    fn test_pwd_prints_current_dir() {
        let _lock = lock_current_dir();
        let mut env = test_env();
        let expected = format!("{}\n", env.current_dir.to_string_lossy());

        let mut out = Vec::new();
        let res = Pwd { _ignored: vec!["whatever".to_string()] }.execute(&mut out, &mut env);

        assert_eq!(res.unwrap(), 0);
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn test_pwd_ignores_dash_arguments() {
        let _lock = lock_current_dir();
        let mut env = test_env();
        let mut out = Vec::new();
        let code = create("pwd", &["-P"]).unwrap().execute(&mut out, &mut env).unwrap();
        assert_eq!(code, 0);
        assert!(String::from_utf8(out).unwrap().ends_with('\n'));
    }

    #[test]
    fn test_cd_to_absolute_path() {
        let _lock = lock_current_dir();
        let temp = make_unique_temp_dir().expect("failed to create temp dir");
        let canonical_temp = fs::canonicalize(&temp).expect("canonicalize failed");
        let orig = stdenv::current_dir().unwrap();
        let mut env = test_env();

        let cmd = Cd { target: Some(canonical_temp.to_string_lossy().to_string()) };
        let res = cmd.execute(&mut io::sink(), &mut env);

        assert!(res.is_ok());
        assert_eq!(fs::canonicalize(stdenv::current_dir().unwrap()).unwrap(), canonical_temp);
        assert_eq!(env.current_dir, canonical_temp);

        stdenv::set_current_dir(orig).expect("failed to restore cwd");
        let _ = fs::remove_dir_all(&temp);
    }

    #[test]
    fn test_cd_to_home_when_none() {
        let _lock = lock_current_dir();
        let temp = make_unique_temp_dir().expect("failed to create temp dir");
        let canonical_temp = fs::canonicalize(&temp).expect("canonicalize failed");
        let orig = stdenv::current_dir().unwrap();

        let mut env = test_env();
        env.home = Some(canonical_temp.clone());

        let res = Cd { target: None }.execute(&mut io::sink(), &mut env);

        assert!(res.is_ok());
        assert_eq!(fs::canonicalize(stdenv::current_dir().unwrap()).unwrap(), canonical_temp);
        assert_eq!(env.current_dir, canonical_temp);

        stdenv::set_current_dir(orig).expect("failed to restore cwd");
        let _ = fs::remove_dir_all(&temp);
    }

    #[test]
    fn test_cd_without_home_fails_and_stays() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let mut env = test_env();

        let res = Cd { target: None }.execute(&mut io::sink(), &mut env);

        assert!(res.unwrap_err().to_string().contains("HOME not set"));
        assert_eq!(stdenv::current_dir().unwrap(), orig);
        assert_eq!(env.current_dir, orig);
    }

    #[test]
    fn test_cd_nonexistent_path_reports_directory_not_found() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let mut env = test_env();

        let name = format!("/nonexistent_dir_for_builtin_test_{}", std::process::id());
        let res = Cd { target: Some(name) }.execute(&mut io::sink(), &mut env);

        let err = res.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ShellError>(),
            Some(ShellError::DirectoryNotFound(_))
        ));
        assert_eq!(stdenv::current_dir().unwrap(), orig);
        assert_eq!(env.current_dir, orig);
    }

    #[test]
    fn test_cd_failure_is_reported_through_factory() {
        let _lock = lock_current_dir();
        let mut env = test_env();
        let target = format!("/nonexistent_dir_for_builtin_test_{}", std::process::id());

        let mut out = Vec::new();
        let code = create("cd", &[target.as_str()]).unwrap().execute(&mut out, &mut env).unwrap();

        assert_eq!(code, 1);
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains("Error (2):"));
        assert!(s.contains("no such directory"));
    }

    #[test]
    fn test_exit_sets_flag() {
        let mut env = test_env();
        assert_eq!(Exit {}.execute(&mut io::sink(), &mut env).unwrap(), 0);
        assert!(env.should_exit);
    }

    #[test]
    fn test_clear_emits_escape() {
        let mut out = Vec::new();
        Clear {}.execute(&mut out, &mut test_env()).unwrap();
        assert_eq!(out, b"\x1b[2J\x1b[1;1H");
    }

    #[test]
    fn test_color_reset_is_idempotent() {
        let mut env = test_env();
        let mut first = Vec::new();
        let mut second = Vec::new();

        let a = create("color", &["reset"]).unwrap().execute(&mut first, &mut env).unwrap();
        let b = create("color", &["reset"]).unwrap().execute(&mut second, &mut env).unwrap();

        assert_eq!((a, b), (0, 0));
        assert_eq!(first, b"\x1b[0m");
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_color_emits_no_sequence() {
        let mut out = Vec::new();
        let code = create("color", &["mauve"])
            .unwrap()
            .execute(&mut out, &mut test_env())
            .unwrap();

        assert_eq!(code, 1);
        let s = String::from_utf8(out).unwrap();
        assert_eq!(s, "[color] error: no such color found.\n");
        assert!(!s.contains('\x1b'));
    }

    #[test]
    fn test_color_without_name_is_an_error() {
        let mut out = Vec::new();
        let code = create("color", &[]).unwrap().execute(&mut out, &mut test_env()).unwrap();
        assert_eq!(code, 1);
    }

    #[test]
    fn test_palette_lookup() {
        assert_eq!(color_sequence("bcyan"), Some("\x1b[1;36m"));
        assert_eq!(color_sequence("byellow"), Some("\x1b[01;33m"));
        assert_eq!(color_sequence("purple"), None);
        assert_eq!(COLORS.len(), 13);
    }
}
