//! Process-chaining executor.
//!
//! Every stage of a [`StageList`] runs in its own child process. Consecutive
//! stages are connected by anonymous pipes whose ends are [`OwnedFd`]s, so each
//! descriptor has exactly one owner on each side of `fork` and is closed when that
//! owner goes out of scope. The parent drops its copy of a write end as soon as
//! the child that uses it exists; otherwise the reader would never see
//! end-of-stream.

use crate::command::ExitCode;
use crate::error::ShellError;
use crate::lexer::tokenize;
use crate::parser::{StageList, strip_background_marker};
use crate::redirect::{self, Redirection};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{self, ForkResult, Pid, dup2, execvp, fork, pipe2, setpgid};
use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};

/// Exit status of a child whose program could not be launched.
pub const EXEC_FAILURE_STATUS: i32 = 255;

/// A stage ready to be launched: everything the child needs is built before `fork`.
#[derive(Debug)]
pub struct PreparedStage {
    argv: Vec<CString>,
    redirection: Option<Redirection>,
    exec_failure: Vec<u8>,
    redirect_failure: Vec<u8>,
}

impl PreparedStage {
    /// Tokenizes `command`, strips the background marker and resolves redirection.
    pub fn prepare(command: &str, background: bool) -> Result<Self, ShellError> {
        let command = if background {
            strip_background_marker(command)
        } else {
            command.to_string()
        };
        let (tokens, redirection) = redirect::resolve(tokenize(command.trim_matches(' ')));

        let program = match tokens.first() {
            Some(program) if !program.is_empty() => program.clone(),
            _ => return Err(ShellError::ExecutionFailed(command.trim().to_string())),
        };
        let argv = tokens
            .into_iter()
            .map(CString::new)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ShellError::ExecutionFailed(program.clone()))?;

        let redirect_failure = match &redirection {
            Some(r) => ShellError::RedirectionFailed(r.path().to_owned()).render(),
            None => String::new(),
        };

        Ok(Self {
            argv,
            redirection,
            exec_failure: ShellError::ExecutionFailed(program).render().into_bytes(),
            redirect_failure: redirect_failure.into_bytes(),
        })
    }

    pub fn program(&self) -> &CString {
        &self.argv[0]
    }

    pub fn argv(&self) -> &[CString] {
        &self.argv
    }

    pub fn redirection(&self) -> Option<&Redirection> {
        self.redirection.as_ref()
    }

    /// Runs in the child after `fork`: wires descriptors and replaces the process image.
    ///
    /// Never returns. Nothing here logs.
    fn exec(&self, stdin: Option<&OwnedFd>, stdout: Option<&OwnedFd>, group: Option<Pid>) -> ! {
        if let Some(pgid) = group {
            let _ = setpgid(Pid::from_raw(0), pgid);
        }

        let wired = stdin
            .map_or(Ok(0), |fd| dup2(fd.as_raw_fd(), libc::STDIN_FILENO))
            .and_then(|_| stdout.map_or(Ok(0), |fd| dup2(fd.as_raw_fd(), libc::STDOUT_FILENO)));
        if wired.is_err() {
            fail(&self.exec_failure);
        }

        if let Some(redirection) = &self.redirection {
            if redirection.apply().is_err() {
                fail(&self.redirect_failure);
            }
        }

        let _ = execvp(self.program(), &self.argv);
        fail(&self.exec_failure)
    }
}

fn fail(report: &[u8]) -> ! {
    let _ = unistd::write(io::stderr(), report);
    unsafe { libc::_exit(EXEC_FAILURE_STATUS) }
}

/// How a pipeline ended from the interpreter's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Foreground pipeline; the last child exited with this status.
    Exited(ExitCode),
    /// Background pipeline of this many processes; nobody waits for it.
    Detached(usize),
    /// Not a single stage could be started.
    NothingSpawned,
}

/// Processes spawned for one stage list.
#[derive(Debug)]
pub struct Pipeline {
    children: Vec<Pid>,
    background: bool,
    group: Option<Pid>,
}

impl Pipeline {
    /// Forks one child per stage, connected left to right by pipes.
    ///
    /// Failures are reported and abandon only the stage they happen in; the stage
    /// after an abandoned one reads end-of-stream.
    pub fn spawn(stages: &StageList) -> Self {
        let background = stages.is_background();
        let mut pipeline = Pipeline {
            children: Vec::with_capacity(stages.len()),
            background,
            group: None,
        };

        let last = stages.len().saturating_sub(1);
        let mut upstream: Option<OwnedFd> = None;

        for (i, command) in stages.stages().iter().enumerate() {
            let pipe = if i < last {
                match pipe2(OFlag::O_CLOEXEC) {
                    Ok(pipe) => Some(pipe),
                    Err(e) => {
                        ShellError::ProcessCreationFailed(e).report();
                        break;
                    }
                }
            } else {
                None
            };

            match PreparedStage::prepare(command, background) {
                Ok(stage) => {
                    let downstream = pipe.as_ref().map(|(_, write)| write);
                    pipeline.fork_stage(&stage, upstream.as_ref(), downstream)
                }
                Err(e) => e.report(),
            }

            // Parent keeps only the read end, for the next stage; the write end
            // and the previous read end are closed here.
            upstream = pipe.map(|(read, _write)| read);
        }

        pipeline
    }

    fn fork_stage(
        &mut self,
        stage: &PreparedStage,
        stdin: Option<&OwnedFd>,
        stdout: Option<&OwnedFd>,
    ) {
        let group = if self.background {
            Some(self.group.unwrap_or(Pid::from_raw(0)))
        } else {
            None
        };

        match unsafe { fork() } {
            Ok(ForkResult::Child) => stage.exec(stdin, stdout, group),
            Ok(ForkResult::Parent { child }) => {
                if self.background {
                    let pgid = *self.group.get_or_insert(child);
                    let _ = setpgid(child, pgid);
                }
                log::debug!("spawned {:?} as pid {}", stage.program(), child);
                self.children.push(child);
            }
            Err(e) => ShellError::ProcessCreationFailed(e).report(),
        }
    }

    pub fn pids(&self) -> &[Pid] {
        &self.children
    }

    pub fn is_background(&self) -> bool {
        self.background
    }

    /// Process group of a background pipeline.
    pub fn group(&self) -> Option<Pid> {
        self.group
    }

    /// Waits for the last child of a foreground pipeline, or detaches a background one.
    ///
    /// Children that are not waited for here are handed to `reaper`.
    pub fn finish(mut self, reaper: &mut Reaper) -> Completion {
        if self.background {
            let count = self.children.len();
            if count == 0 {
                return Completion::NothingSpawned;
            }
            log::info!("detached {} process(es) in group {:?}", count, self.group);
            reaper.adopt(self.children);
            return Completion::Detached(count);
        }

        match self.children.pop() {
            Some(last) => {
                reaper.adopt(self.children);
                Completion::Exited(wait_for(last))
            }
            None => Completion::NothingSpawned,
        }
    }
}

/// Blocks until `pid` terminates and converts its status the way shells do.
pub fn wait_for(pid: Pid) -> ExitCode {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return code,
            Ok(WaitStatus::Signaled(_, signal, _)) => return terminated_by_signal(signal),
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(e) => {
                log::warn!("waiting for {} failed: {}", pid, e);
                return 1;
            }
        }
    }
}

fn terminated_by_signal(signal: nix::sys::signal::Signal) -> ExitCode {
    128 + signal as i32
}

/// Children nobody is blocked on: background pipelines and the upstream stages
/// of foreground ones. They are collected without blocking between prompts.
#[derive(Debug, Default)]
pub struct Reaper {
    pending: Vec<Pid>,
}

impl Reaper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adopt(&mut self, pids: impl IntoIterator<Item = Pid>) {
        self.pending.extend(pids);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Collects every finished child without blocking; returns how many were reaped.
    pub fn reap(&mut self) -> usize {
        let before = self.pending.len();
        self.pending.retain(|&pid| match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(Errno::EINTR) => true,
            Ok(status) => {
                log::info!("reaped {}: {:?}", pid, status);
                false
            }
            Err(e) => {
                log::warn!("lost track of {}: {}", pid, e);
                false
            }
        });
        before - self.pending.len()
    }

    /// Blocks until every adopted child has terminated.
    pub fn wait_all(&mut self) {
        for pid in self.pending.drain(..) {
            wait_for(pid);
        }
    }
}
