// src/patch/command.rs

//! External process execution for patch tools
//!
//! The apply cascade only needs a yes/no answer from each tool invocation.
//! [`CommandRunner`] is the seam for that, [`SystemRunner`] the real thing.

use crate::error::Result;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, warn};

/// How chatty command execution should be
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
    Debug,
}

impl Verbosity {
    /// Map a `-v` count and `-q` flag onto a verbosity
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    pub fn is_verbose(self) -> bool {
        self >= Self::Verbose
    }

    pub fn is_debug(self) -> bool {
        self == Self::Debug
    }

    /// Default `tracing` filter directive for this verbosity
    pub fn filter_directive(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Verbose | Self::Debug => "debug",
        }
    }
}

/// A single process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// File fed to the process on stdin
    pub stdin: Option<PathBuf>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    /// Shell-escaped rendering, as it would be typed in a terminal
    pub fn display(&self) -> String {
        let mut line = String::new();

        if let Some(dir) = &self.current_dir {
            line.push_str("cd ");
            line.push_str(&quote(&dir.to_string_lossy()));
            line.push_str(" && ");
        }
        for (key, value) in &self.env {
            line.push_str(key);
            line.push('=');
            line.push_str(&quote(value));
            line.push(' ');
        }

        let words = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        line.push_str(&shlex::try_join(words.clone()).unwrap_or_else(|_| words.collect::<Vec<_>>().join(" ")));

        if let Some(stdin) = &self.stdin {
            line.push_str(" < ");
            line.push_str(&quote(&stdin.to_string_lossy()));
        }

        line
    }
}

fn quote(word: &str) -> String {
    shlex::try_quote(word)
        .map(|q| q.into_owned())
        .unwrap_or_else(|_| word.to_string())
}

/// Executes process commands on behalf of the applier and installer
pub trait CommandRunner {
    /// Run a command to completion
    ///
    /// Returns whether the process exited successfully. An error means the
    /// process could not be started at all.
    fn run(&self, command: &ProcessCommand) -> Result<bool>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner {
    verbosity: Verbosity,
}

impl SystemRunner {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ProcessCommand) -> Result<bool> {
        let stream = self.verbosity.is_debug();
        if stream {
            debug!("{}", command.display());
        }

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        if let Some(dir) = &command.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &command.env {
            cmd.env(key, value);
        }
        match &command.stdin {
            Some(path) => cmd.stdin(File::open(path)?),
            None => cmd.stdin(Stdio::null()),
        };

        if !stream {
            let status = cmd.stdout(Stdio::null()).stderr(Stdio::null()).status()?;
            return Ok(status.success());
        }

        let mut child = cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Drain both pipes concurrently so neither can fill up and block the child
        thread::scope(|scope| {
            if let Some(out) = stdout {
                scope.spawn(move || forward_lines(out, false));
            }
            if let Some(err) = stderr {
                scope.spawn(move || forward_lines(err, true));
            }
        });

        let status = child.wait()?;
        debug!("{} exited with {}", command.program, status);
        Ok(status.success())
    }
}

fn forward_lines(reader: impl Read, is_stderr: bool) {
    for line in BufReader::new(reader).lines().map_while(std::result::Result::ok) {
        if is_stderr {
            warn!("{}", line);
        } else {
            debug!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(0, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(1, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(3, false), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(2, true), Verbosity::Quiet);
        assert!(Verbosity::Debug.is_verbose());
        assert!(!Verbosity::Verbose.is_debug());
    }

    #[test]
    fn test_display_escapes_arguments() {
        let cmd = ProcessCommand::new("git")
            .arg("apply")
            .arg("-p1")
            .arg("/tmp/my patches/fix.patch")
            .current_dir("/srv/vendor/bar")
            .env("GIT_DIR", ".");

        assert_eq!(
            cmd.display(),
            "cd /srv/vendor/bar && GIT_DIR=. git apply -p1 '/tmp/my patches/fix.patch'"
        );
    }

    #[test]
    fn test_display_with_stdin() {
        let cmd = ProcessCommand::new("patch")
            .arg("-p0")
            .stdin_file("/tmp/fix.patch");

        assert_eq!(cmd.display(), "patch -p0 < /tmp/fix.patch");
    }

    #[test]
    #[cfg(unix)]
    fn test_system_runner_exit_status() {
        let runner = SystemRunner::new(Verbosity::Normal);
        assert!(runner.run(&ProcessCommand::new("true")).unwrap());
        assert!(!runner.run(&ProcessCommand::new("false")).unwrap());
    }

    #[test]
    #[cfg(unix)]
    fn test_system_runner_streams_in_debug() {
        let runner = SystemRunner::new(Verbosity::Debug);
        let cmd = ProcessCommand::new("sh").arg("-c").arg("echo out; echo err >&2; exit 3");
        assert!(!runner.run(&cmd).unwrap());
    }

    #[test]
    fn test_system_runner_missing_program() {
        let runner = SystemRunner::default();
        assert!(runner.run(&ProcessCommand::new("medic-no-such-program")).is_err());
    }
}
