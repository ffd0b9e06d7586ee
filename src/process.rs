// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Subprocess execution.
//!
//! Every interaction with a working copy goes through the Git executable as an
//! external process. This module owns that boundary: build an argument vector
//! with [`GitCommand`], hand it to a [`ProcessRunner`], and get back whatever
//! the executable wrote to stdout.
//!
//! # No Shell Involved
//!
//! Commands are never rendered into a shell string. Branch names, commit
//! messages, and file paths are passed as discrete arguments, so there is
//! nothing to quote or escape on the caller's side.
//!
//! # Blocking Semantics
//!
//! A call to [`ProcessRunner::run`] blocks until the child exits. There is no
//! retry at this layer. Callers that must stay responsive should dispatch
//! calls onto a background thread themselves. [`SystemRunner`] can be given a
//! deadline and a [`CancelToken`], in which case the child is killed once
//! either one fires.

use std::{
    ffi::{OsStr, OsString},
    fmt::{Display, Formatter, Result as FmtResult},
    io::Read,
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tracing::{debug, instrument, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Argument vector for one invocation of the Git executable.
///
/// Configuration overrides added through [`GitCommand::config`] are always
/// placed before the subcommand as `-c key=value` pairs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GitCommand {
    config: Vec<(String, String)>,
    args: Vec<OsString>,
}

impl GitCommand {
    /// Construct new command starting with target subcommand.
    pub fn new(subcommand: impl Into<OsString>) -> Self {
        Self {
            config: Vec::new(),
            args: vec![subcommand.into()],
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a listing of arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add one-shot configuration override for this invocation only.
    pub fn config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.push((key.into(), value.into()));
        self
    }

    /// Name of the Git subcommand being invoked.
    pub fn subcommand(&self) -> Option<&OsStr> {
        self.args.first().map(OsString::as_os_str)
    }

    /// Arguments after configuration overrides, subcommand first.
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Configuration overrides of this invocation.
    pub fn overrides(&self) -> &[(String, String)] {
        &self.config
    }

    /// Full argument vector handed to the executable.
    pub fn to_argv(&self) -> Vec<OsString> {
        let mut argv = Vec::with_capacity(self.config.len() * 2 + self.args.len());
        for (key, value) in &self.config {
            argv.push("-c".into());
            argv.push(format!("{key}={value}").into());
        }
        argv.extend(self.args.iter().cloned());

        argv
    }
}

impl Display for GitCommand {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str("git")?;
        for arg in self.to_argv() {
            write!(fmt, " {}", arg.to_string_lossy())?;
        }

        Ok(())
    }
}

/// Execute Git commands in a working directory.
///
/// Implementors return standard output verbatim, trailing newline included.
/// Trimming is left to the caller.
pub trait ProcessRunner: Send + Sync {
    /// Run command inside working directory, and capture its stdout.
    ///
    /// # Errors
    ///
    /// - Return [`ProcessError::MissingDirectory`] if `cwd` does not exist.
    /// - Return [`ProcessError::Spawn`] if the executable cannot be started.
    /// - Return [`ProcessError::Io`] if waiting on the child fails.
    /// - Return [`ProcessError::Exit`] if the executable exits unsuccessfully.
    /// - Return [`ProcessError::Timeout`] or [`ProcessError::Cancelled`] if the
    ///   runner supports deadlines or cancellation and one of them fires.
    fn run(&self, command: &GitCommand, cwd: &Path) -> Result<String>;
}

impl<R> ProcessRunner for &R
where
    R: ProcessRunner + ?Sized,
{
    fn run(&self, command: &GitCommand, cwd: &Path) -> Result<String> {
        (**self).run(command, cwd)
    }
}

impl<R> ProcessRunner for Arc<R>
where
    R: ProcessRunner + ?Sized,
{
    fn run(&self, command: &GitCommand, cwd: &Path) -> Result<String> {
        (**self).run(command, cwd)
    }
}

/// Shared flag to abandon running subprocesses.
///
/// Cloning the token shares the flag. Cancelling it kills whatever child a
/// [`SystemRunner`] holding the token is currently waiting on.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Construct new uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runner that spawns the real Git executable.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    program: PathBuf,
    timeout: Option<Duration>,
    cancel: Option<CancelToken>,
}

impl SystemRunner {
    /// Construct new runner for target executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
            cancel: None,
        }
    }

    /// Kill any child that outlives the deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Kill any running child once token is cancelled.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Path or name of the executable being spawned.
    pub fn program(&self) -> &Path {
        self.program.as_path()
    }

    fn wait(&self, child: &mut Child, command: &GitCommand) -> Result<ExitStatus> {
        if self.timeout.is_none() && self.cancel.is_none() {
            return child.wait().map_err(|source| ProcessError::Io {
                command: command.to_string(),
                source,
            });
        }

        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        loop {
            let status = child.try_wait().map_err(|source| ProcessError::Io {
                command: command.to_string(),
                source,
            })?;
            if let Some(status) = status {
                return Ok(status);
            }

            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                kill(child);
                return Err(ProcessError::Cancelled {
                    command: command.to_string(),
                });
            }

            if let (Some(deadline), Some(timeout)) = (deadline, self.timeout) {
                if Instant::now() >= deadline {
                    kill(child);
                    return Err(ProcessError::Timeout {
                        command: command.to_string(),
                        timeout,
                    });
                }
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new("git")
    }
}

impl ProcessRunner for SystemRunner {
    #[instrument(skip(self, command, cwd), level = "debug")]
    fn run(&self, command: &GitCommand, cwd: &Path) -> Result<String> {
        if !cwd.is_dir() {
            return Err(ProcessError::MissingDirectory {
                path: cwd.to_path_buf(),
            });
        }

        debug!("run {command} in {:?}", cwd.display());
        let mut child = Command::new(&self.program)
            .args(command.to_argv())
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // INVARIANT: Drain both pipes while waiting so a chatty child never
        // blocks on a full pipe buffer.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let status = self.wait(&mut child, command)?;
        let stdout = String::from_utf8_lossy(&stdout.join().unwrap_or_default()).into_owned();
        let stderr = String::from_utf8_lossy(&stderr.join().unwrap_or_default()).into_owned();

        if !status.success() {
            return Err(ProcessError::exit(command, status.code(), &stderr));
        }

        Ok(stdout)
    }
}

fn drain<P>(pipe: Option<P>) -> JoinHandle<Vec<u8>>
where
    P: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(error) = pipe.read_to_end(&mut buffer) {
                warn!("failed to read child output: {error}");
            }
        }
        buffer
    })
}

fn kill(child: &mut Child) {
    if let Err(error) = child.kill() {
        warn!("failed to kill child process {}: {error}", child.id());
    }
    let _ = child.wait();
}

/// Subprocess error types.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// Working directory does not exist.
    #[error("working directory {:?} does not exist", path.display())]
    MissingDirectory { path: PathBuf },

    /// Executable could not be started.
    #[error("failed to start {:?}: {source}", program.display())]
    Spawn {
        #[source]
        source: std::io::Error,
        program: PathBuf,
    },

    /// Waiting on the child failed.
    #[error("failed to wait on {command}")]
    Io {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// Executable exited unsuccessfully.
    #[error("{command} failed: {message}")]
    Exit {
        command: String,
        code: Option<i32>,
        message: String,
    },

    /// Deadline expired before the executable exited.
    #[error("{command} timed out after {}s", timeout.as_secs_f32())]
    Timeout { command: String, timeout: Duration },

    /// Caller cancelled the executable.
    #[error("{command} was cancelled")]
    Cancelled { command: String },
}

impl ProcessError {
    /// Build exit failure from captured stderr.
    ///
    /// Falls back to a generic description when stderr is empty.
    pub fn exit(command: &GitCommand, code: Option<i32>, stderr: &str) -> Self {
        let stderr = stderr.trim();
        let message = if stderr.is_empty() {
            match code {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by signal".to_string(),
            }
        } else {
            stderr.to_string()
        };

        Self::Exit {
            command: command.to_string(),
            code,
            message,
        }
    }

    /// Exit code of the executable, if it exited on its own.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exit { code, .. } => *code,
            _ => None,
        }
    }

    /// Most actionable text available for display.
    ///
    /// This is the raw stderr of the executable for exit failures.
    pub fn message(&self) -> String {
        match self {
            Self::Exit { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = ProcessError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn config_overrides_precede_subcommand() {
        let command = GitCommand::new("commit")
            .arg("-m")
            .arg("fix: it's \"quoted\"; rm -rf /")
            .config("user.name", "John Doe");

        let result = command.to_argv();
        let expect: Vec<OsString> = vec![
            "-c".into(),
            "user.name=John Doe".into(),
            "commit".into(),
            "-m".into(),
            "fix: it's \"quoted\"; rm -rf /".into(),
        ];
        assert_eq!(result, expect);
        assert_eq!(command.subcommand(), Some(OsStr::new("commit")));
    }

    #[test]
    fn exit_error_falls_back_to_generic_description() {
        let command = GitCommand::new("config").args(["--get", "credential.helper"]);

        let error = ProcessError::exit(&command, Some(1), "  \n");
        assert_eq!(error.message(), "exited with status 1");
        assert_eq!(error.exit_code(), Some(1));

        let error = ProcessError::exit(&command, Some(128), "fatal: not a git repository\n");
        assert_eq!(error.message(), "fatal: not a git repository");
    }

    #[test]
    fn missing_working_directory_is_reported() {
        let runner = SystemRunner::default();
        let result = runner.run(
            &GitCommand::new("status"),
            Path::new("/this/path/should/not/exist/at/all"),
        );
        assert!(matches!(result, Err(ProcessError::MissingDirectory { .. })));
    }

    #[test]
    fn unresolvable_executable_is_reported() {
        let runner = SystemRunner::new("definitely-not-a-real-git-binary");
        let cwd = std::env::temp_dir();
        let result = runner.run(&GitCommand::new("status"), &cwd);
        assert!(matches!(result, Err(ProcessError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn deadline_kills_hung_process() {
        // Any executable works, so borrow sleep(1) as a stand-in for a hung git.
        let runner = SystemRunner::new("sleep").with_timeout(Duration::from_millis(100));
        let started = Instant::now();
        let result = runner.run(&GitCommand::new("5"), &std::env::temp_dir());
        assert!(matches!(result, Err(ProcessError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn cancelled_token_kills_process() {
        let token = CancelToken::new();
        token.cancel();
        let runner = SystemRunner::new("sleep").with_cancel(token);
        let result = runner.run(&GitCommand::new("5"), &std::env::temp_dir());
        assert!(matches!(result, Err(ProcessError::Cancelled { .. })));
    }

    #[test]
    fn unreadable_output_drains_to_empty() {
        struct Broken;

        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("pipe closed"))
            }
        }

        let result = drain(Some(Broken)).join().unwrap_or_else(|_| vec![1]);
        assert_eq!(result, Vec::<u8>::new());
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
