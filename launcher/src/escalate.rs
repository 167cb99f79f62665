//! Privilege-escalation resolver.
//!
//! Given a shell command that needs elevated rights, try the mode-appropriate
//! mechanisms in order. Every attempt is wrapped so failure or cancellation
//! degrades to the next candidate; the final fallback prints copy-pasteable
//! manual instructions and fails, because nothing downstream can proceed
//! without the packages the command would have installed.

use std::fmt;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::escalation::{Mechanism, chain};
use crate::core::mode::RunMode;
use crate::io::host::{CommandHost, HostCommand, OutputMode};
use crate::logging::Console;

/// Terminal emulators to try for the headless last-resort instructions.
const TERMINAL_EMULATORS: &[&str] = &["x-terminal-emulator", "gnome-terminal", "konsole"];

/// Fatal: no escalation mechanism could run the command.
#[derive(Debug)]
pub struct EscalationExhausted {
    pub command: String,
}

impl fmt::Display for EscalationExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no usable privilege escalation mechanism; run manually: sudo sh -c '{}'",
            self.command
        )
    }
}

impl std::error::Error for EscalationExhausted {}

/// Run `shell_command` with elevated rights through the first workable
/// mechanism for `mode`.
///
/// Mechanisms are resolved fresh on every call: availability can change
/// after an installation step, so nothing is cached across commands.
pub fn run_elevated<H: CommandHost>(
    host: &H,
    mode: RunMode,
    console: &Console,
    shell_command: &str,
) -> Result<()> {
    for mechanism in chain(mode) {
        if host.locate(mechanism.binary()).is_none() {
            debug!(mechanism = mechanism.label(), "mechanism binary not on PATH");
            continue;
        }
        if !probe_ok(host, *mechanism) {
            debug!(mechanism = mechanism.label(), "mechanism probe failed");
            continue;
        }

        info!(mechanism = mechanism.label(), command = shell_command, "requesting elevated command");
        let (program, args) = mechanism.invocation(shell_command);
        let attempt = host.run(&HostCommand::with_args(program, args, OutputMode::Forward));
        match attempt {
            Ok(status) if status.success => return Ok(()),
            Ok(status) => {
                warn!(
                    mechanism = mechanism.label(),
                    exit_code = ?status.code,
                    "elevation attempt failed or was cancelled; trying next mechanism"
                );
            }
            Err(err) => {
                warn!(
                    mechanism = mechanism.label(),
                    err = %err,
                    "elevation attempt could not start; trying next mechanism"
                );
            }
        }
    }

    announce_manual_fallback(host, mode, console, shell_command);
    Err(EscalationExhausted {
        command: shell_command.to_string(),
    }
    .into())
}

fn probe_ok<H: CommandHost>(host: &H, mechanism: Mechanism) -> bool {
    let Some((program, args)) = mechanism.probe() else {
        return true;
    };
    match host.run(&HostCommand::quiet(program, args)) {
        Ok(status) => status.success,
        Err(err) => {
            debug!(mechanism = mechanism.label(), err = %err, "probe could not run");
            false
        }
    }
}

/// Print the exact command a human must run, and in headless mode try to
/// open a terminal emulator preloaded with it.
fn announce_manual_fallback<H: CommandHost>(
    host: &H,
    mode: RunMode,
    console: &Console,
    shell_command: &str,
) {
    console.error("Unable to obtain administrator rights automatically.");
    console.error("Please run the following command in a terminal, then start the launcher again:");
    console.error(&format!("  sudo sh -c '{shell_command}'"));

    if !mode.is_headless() {
        return;
    }
    let Some(terminal) = TERMINAL_EMULATORS
        .iter()
        .find(|name| host.locate(name).is_some())
    else {
        debug!("no terminal emulator found for manual fallback");
        return;
    };

    // Keep the window open after the command so the user can read its output.
    let script = format!("sudo sh -c '{shell_command}'; echo; read dummy");
    let command = HostCommand::with_args(
        (*terminal).to_string(),
        vec!["-e".to_string(), "sh".to_string(), "-c".to_string(), script],
        OutputMode::Forward,
    );
    info!(terminal, "opening terminal emulator with the manual command");
    if let Err(err) = host.run(&command) {
        warn!(terminal, err = %err, "could not open terminal emulator");
    }
}
