//! Running external tools (backup script, dump utility, compressor).

use async_trait::async_trait;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::debug;

use crate::errors::Result;

/// Exit status of a successful run.
pub const EXIT_OK: i32 = 0;

/// Where a child's standard output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Read into memory and logged at debug level.
    Capture,
    /// Written to this file, created or truncated.
    File(PathBuf),
}

/// One external command. Arguments are passed as argv entries, never through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub stdout: OutputTarget,
    pub discard_stderr: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdout: OutputTarget::Capture,
            discard_stderr: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdout_to(mut self, path: &Path) -> Self {
        self.stdout = OutputTarget::File(path.to_path_buf());
        self
    }

    pub fn discard_stderr(mut self) -> Self {
        self.discard_stderr = true;
        self
    }

    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs `command` to completion and returns its exit status.
    ///
    /// `Err` means the process could not be started at all.
    async fn run(&self, command: &CommandSpec) -> Result<i32>;
}

/// Runs commands on the host with stdin closed and every output stream
/// either captured or redirected, so the child never blocks on a full pipe.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, command: &CommandSpec) -> Result<i32> {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args).stdin(Stdio::null());

        match &command.stdout {
            OutputTarget::Capture => {
                cmd.stdout(Stdio::piped());
            }
            OutputTarget::File(path) => {
                cmd.stdout(Stdio::from(File::create(path)?));
            }
        }
        if command.discard_stderr {
            cmd.stderr(Stdio::null());
        } else {
            cmd.stderr(Stdio::piped());
        }

        debug!(program = %command.program.display(), args = ?command.args, "Running external command");
        // `output()` would replace the stdio set up above with pipes
        let output = cmd.spawn()?.wait_with_output().await?;

        if command.stdout == OutputTarget::Capture && !output.stdout.is_empty() {
            debug!(
                program = %command.program.display(),
                "stdout: {}",
                String::from_utf8_lossy(&output.stdout).trim_end()
            );
        }
        if !output.stderr.is_empty() {
            debug!(
                program = %command.program.display(),
                "stderr: {}",
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }

        // Killed by a signal: no exit code, report as a failure
        Ok(output.status.code().unwrap_or(-1))
    }
}
