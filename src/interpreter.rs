use crate::builtin;
use crate::command::{CommandFactory, ExitCode};
use crate::env::Environment;
use crate::executor::{Completion, EXEC_FAILURE_STATUS, Pipeline, Reaper};
use crate::parser::StageList;
use crate::signal;
use nix::unistd::dup2;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::io::{self, IsTerminal, Write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd};

/// Prompt used when none is configured.
pub const DEFAULT_PROMPT: &str = "shell >> ";

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports the built-in commands defined in this crate.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Duplicate of the interpreter's standard input taken at start-up.
///
/// Restoring it before every prompt keeps a redirection made while running one
/// line from leaking into the next read.
#[derive(Debug)]
pub struct StdinGuard {
    saved: OwnedFd,
}

impl StdinGuard {
    pub fn capture() -> io::Result<Self> {
        let saved = io::stdin().as_fd().try_clone_to_owned()?;
        Ok(Self { saved })
    }

    pub fn restore(&self) -> nix::Result<()> {
        dup2(self.saved.as_raw_fd(), libc::STDIN_FILENO).map(drop)
    }
}

/// The interactive command interpreter.
///
/// Each line is first offered to the built-ins; anything else is split into
/// stages and handed to the pipeline executor.
///
/// Example
/// ```no_run
/// use myshell::Interpreter;
/// let mut sh = Interpreter::new("$ ").unwrap();
/// let code = sh.execute_line("printf hi | cat");
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    builtins: Vec<Box<dyn CommandFactory>>,
    reaper: Reaper,
    stdin: StdinGuard,
    prompt: String,
    last_status: ExitCode,
}

impl Interpreter {
    /// Create an interpreter with the default built-ins.
    pub fn new(prompt: &str) -> io::Result<Self> {
        Ok(Self::with_environment(prompt, Environment::new(), StdinGuard::capture()?))
    }

    pub fn with_environment(prompt: &str, env: Environment, stdin: StdinGuard) -> Self {
        use crate::builtin::*;
        Self {
            env,
            builtins: vec![
                Box::new(Factory::<Exit>::default()),
                Box::new(Factory::<Clear>::default()),
                Box::new(Factory::<Cd>::default()),
                Box::new(Factory::<Pwd>::default()),
                Box::new(Factory::<Color>::default()),
            ],
            reaper: Reaper::new(),
            stdin,
            prompt: prompt.to_string(),
            last_status: 0,
        }
    }

    pub fn should_exit(&self) -> bool {
        self.env.should_exit
    }

    pub fn last_status(&self) -> ExitCode {
        self.last_status
    }

    /// Children started by earlier lines that have not been collected yet.
    pub fn reaper(&mut self) -> &mut Reaper {
        &mut self.reaper
    }

    /// Executes one line and returns its exit status.
    ///
    /// Blank lines are ignored and leave the last status untouched.
    pub fn execute_line(&mut self, line: &str) -> ExitCode {
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            return self.last_status;
        }

        let status = match self.run_builtin(line) {
            Some(status) => status,
            None => self.run_pipeline(line),
        };
        self.last_status = status;
        status
    }

    fn run_builtin(&mut self, line: &str) -> Option<ExitCode> {
        let (name, arg) = builtin::recognize(line)?;
        let args: Vec<&str> = arg.into_iter().collect();
        let cmd = self
            .builtins
            .iter()
            .find_map(|factory| factory.try_create(&self.env, name, &args))?;

        log::debug!("builtin {} {:?}", name, arg);
        let mut stdout = io::stdout().lock();
        let status = cmd.execute(&mut stdout, &mut self.env).unwrap_or_else(|e| {
            log::warn!("builtin {} failed: {}", name, e);
            1
        });
        let _ = stdout.flush();
        Some(status)
    }

    fn run_pipeline(&mut self, line: &str) -> ExitCode {
        let Some(stages) = StageList::parse(line) else {
            return self.last_status;
        };
        log::debug!(
            "{} stage(s), background: {}",
            stages.len(),
            stages.is_background()
        );

        let _ = io::stdout().flush();
        match Pipeline::spawn(&stages).finish(&mut self.reaper) {
            Completion::Exited(code) => code,
            Completion::Detached(_) => 0,
            Completion::NothingSpawned => EXEC_FAILURE_STATUS,
        }
    }

    /// Prepares for the next read: collects finished children and puts the
    /// original standard input back.
    pub fn between_lines(&mut self) {
        self.reaper.reap();
        if let Err(e) = self.stdin.restore() {
            log::warn!("could not restore standard input: {}", e);
        }
    }

    /// Runs a single line outside the interactive loop.
    pub fn run_once(&mut self, line: &str) -> ExitCode {
        self.between_lines();
        self.execute_line(line)
    }

    /// Read-Eval-Print Loop. Returns the exit status for the whole interpreter.
    pub fn repl(&mut self) -> rustyline::Result<ExitCode> {
        if !io::stdin().is_terminal() {
            return Ok(self.read_piped()?);
        }
        let mut rl = DefaultEditor::new()?;

        loop {
            self.between_lines();

            match rl.readline(&self.prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    self.execute_line(&line);
                    if self.env.should_exit {
                        return Ok(0);
                    }
                }
                Err(ReadlineError::Interrupted) => signal::farewell(signal::SIGINT),
                Err(ReadlineError::Eof) => return Ok(self.last_status),
                Err(err) => return Err(err),
            }
        }
    }

    /// Loop for a non-terminal standard input: no line editing, but the prompt is
    /// still written before every read.
    fn read_piped(&mut self) -> io::Result<ExitCode> {
        let mut line = String::new();
        loop {
            self.between_lines();

            let mut stdout = io::stdout().lock();
            stdout.write_all(self.prompt.as_bytes())?;
            stdout.flush()?;
            drop(stdout);

            line.clear();
            if io::stdin().read_line(&mut line)? == 0 {
                return Ok(self.last_status);
            }
            self.execute_line(&line);
            if self.env.should_exit {
                return Ok(0);
            }
        }
    }
}
