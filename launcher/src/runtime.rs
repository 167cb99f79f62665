//! Base runtime provisioning.
//!
//! The GUI needs a Python interpreter. When none resolves on PATH, the
//! runtime and its standard companions are installed through the
//! privilege-escalation resolver, then the lookup is repeated once.

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info};

use crate::bootstrap::BootstrapContext;
use crate::escalate;
use crate::io::host::{CommandHost, HostCommand};

/// Interpreter binary the whole pipeline keys on.
pub const RUNTIME_BINARY: &str = "python3";

/// Runtime and companions installed together: interpreter, package manager,
/// isolated-environment tool, development headers.
pub const RUNTIME_PACKAGES: &[&str] =
    &["python3", "python3-pip", "python3-venv", "python3-dev"];

/// Fatal: the runtime is still missing after the install attempt.
#[derive(Debug)]
pub struct RuntimeUnavailable;

impl fmt::Display for RuntimeUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "python3 is still not available; install it manually: sudo apt-get install -y {}",
            RUNTIME_PACKAGES.join(" ")
        )
    }
}

impl std::error::Error for RuntimeUnavailable {}

/// Shell command handed verbatim to the escalation resolver.
pub fn install_command() -> String {
    format!("apt-get install -y {}", RUNTIME_PACKAGES.join(" "))
}

/// Ensure the interpreter is present, installing it if needed.
///
/// Returns the resolved interpreter path. The version string is logged on
/// success so a headless log records exactly what the machine runs.
pub fn ensure_runtime<H: CommandHost>(ctx: &BootstrapContext, host: &H) -> Result<PathBuf> {
    if let Some(python) = host.locate(RUNTIME_BINARY) {
        log_version(host, &python);
        return Ok(python);
    }

    ctx.console
        .say("Python runtime not found; installing it now (administrator rights required).");
    escalate::run_elevated(host, ctx.mode, &ctx.console, &install_command())?;

    match host.locate(RUNTIME_BINARY) {
        Some(python) => {
            log_version(host, &python);
            Ok(python)
        }
        None => Err(RuntimeUnavailable.into()),
    }
}

fn log_version<H: CommandHost>(host: &H, python: &std::path::Path) {
    let command = HostCommand::quiet(python.display().to_string(), &["--version"]);
    match host.run_captured(&command) {
        Ok((status, stdout)) if status.success => {
            info!(python = %python.display(), version = stdout.trim(), "runtime present");
        }
        Ok(_) | Err(_) => {
            debug!(python = %python.display(), "runtime present but version query failed");
        }
    }
}
