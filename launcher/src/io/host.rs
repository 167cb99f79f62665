//! Host-command abstraction for provisioning steps.
//!
//! The [`CommandHost`] trait decouples the bootstrap phases from the actual
//! system: locating binaries on PATH, probing elevation mechanisms, running
//! package managers and the GUI itself all go through it. Tests use scripted
//! hosts that return predetermined results without spawning processes.

use std::path::PathBuf;
use std::process::Command;

use anyhow::Result;
use tracing::debug;

use crate::core::mode::RunMode;
use crate::io::process::{run_captured, run_forwarded, run_inherited, run_quiet};
use crate::logging::OutputSink;

/// How a host command's output is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// No visible output (availability probes, trivial queries).
    Quiet,
    /// Visible to the operator: inherited terminal in interactive mode,
    /// forwarded through the duplicating sink in headless mode.
    Forward,
}

/// A command to run on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    pub mode: OutputMode,
}

impl HostCommand {
    pub fn quiet(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| (*arg).to_string()).collect(),
            cwd: None,
            env: Vec::new(),
            mode: OutputMode::Quiet,
        }
    }

    pub fn with_args(program: impl Into<String>, args: Vec<String>, mode: OutputMode) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
            env: Vec::new(),
            mode,
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// One-line rendering for diagnostics.
    pub fn display(&self) -> String {
        let mut rendered = self.program.clone();
        for arg in &self.args {
            rendered.push(' ');
            rendered.push_str(arg);
        }
        rendered
    }
}

/// Exit result of a host command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostStatus {
    pub success: bool,
    pub code: Option<i32>,
}

impl HostStatus {
    pub fn ok() -> Self {
        Self {
            success: true,
            code: Some(0),
        }
    }

    pub fn failed(code: i32) -> Self {
        Self {
            success: false,
            code: Some(code),
        }
    }
}

impl From<std::process::ExitStatus> for HostStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            success: status.success(),
            code: status.code(),
        }
    }
}

/// Abstraction over the machine the launcher is provisioning.
pub trait CommandHost {
    /// Resolve a binary on PATH, if present.
    fn locate(&self, binary: &str) -> Option<PathBuf>;

    /// Run a command to completion and report its exit status.
    ///
    /// `Err` means the command could not be run at all (spawn failure);
    /// a command that ran and exited non-zero is `Ok` with `success: false`.
    fn run(&self, command: &HostCommand) -> Result<HostStatus>;

    /// Run a command and capture its stdout.
    fn run_captured(&self, command: &HostCommand) -> Result<(HostStatus, String)>;
}

/// The real host: PATH lookup via `which`, children via [`crate::io::process`].
pub struct SystemHost {
    mode: RunMode,
    sink: Option<OutputSink>,
}

impl SystemHost {
    pub fn new(mode: RunMode, sink: Option<OutputSink>) -> Self {
        Self { mode, sink }
    }

    fn build(&self, command: &HostCommand) -> Command {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &command.env {
            cmd.env(key, value);
        }
        cmd
    }
}

impl CommandHost for SystemHost {
    fn locate(&self, binary: &str) -> Option<PathBuf> {
        match which::which(binary) {
            Ok(path) => Some(path),
            Err(err) => {
                debug!(binary, err = %err, "binary not found on PATH");
                None
            }
        }
    }

    fn run(&self, command: &HostCommand) -> Result<HostStatus> {
        debug!(command = %command.display(), mode = ?command.mode, "running host command");
        let cmd = self.build(command);
        let status = match command.mode {
            OutputMode::Quiet => run_quiet(cmd)?,
            OutputMode::Forward => {
                if self.mode.is_headless() {
                    run_forwarded(cmd, self.sink.as_ref())?
                } else {
                    run_inherited(cmd)?
                }
            }
        };
        Ok(status.into())
    }

    fn run_captured(&self, command: &HostCommand) -> Result<(HostStatus, String)> {
        debug!(command = %command.display(), "running host command (captured)");
        let (status, stdout) = run_captured(self.build(command))?;
        Ok((status.into(), stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_command_display_joins_program_and_args() {
        let command = HostCommand::quiet("sudo", &["-n", "true"]);
        assert_eq!(command.display(), "sudo -n true");
    }

    #[test]
    fn system_host_reports_nonzero_exit_as_ok_failure() {
        let host = SystemHost::new(RunMode::Headless, None);
        let status = host
            .run(&HostCommand::quiet("sh", &["-c", "exit 7"]))
            .expect("run");
        assert!(!status.success);
        assert_eq!(status.code, Some(7));
    }

    #[test]
    fn system_host_spawn_failure_is_err() {
        let host = SystemHost::new(RunMode::Headless, None);
        let result = host.run(&HostCommand::quiet("launcher-test-no-such-binary", &[]));
        assert!(result.is_err());
    }

    #[test]
    fn captured_commands_return_stdout() {
        let host = SystemHost::new(RunMode::Interactive, None);
        let (status, stdout) = host
            .run_captured(&HostCommand::quiet("sh", &["-c", "echo hello"]))
            .expect("run");
        assert!(status.success);
        assert_eq!(stdout.trim(), "hello");
    }
}
