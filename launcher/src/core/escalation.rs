//! Ordered privilege-escalation mechanisms per run mode.
//!
//! Mechanisms are data: an availability probe plus an invocation template.
//! The resolver tries them in order with uniform failure handling, so adding
//! a mechanism means appending to a chain, not nesting another branch.

use crate::core::mode::RunMode;

/// A system facility for running one command with elevated rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    /// polkit one-shot elevation helper (GUI authentication agent).
    Pkexec,
    /// Legacy GUI sudo frontend.
    GuiSudo,
    /// sudo with cached/NOPASSWD credentials; silent, never prompts.
    PasswordlessSudo,
    /// sudo prompting for credentials on the attached terminal.
    SudoPrompt,
}

impl Mechanism {
    /// Binary that must resolve on PATH before this mechanism is attempted.
    pub fn binary(self) -> &'static str {
        match self {
            Mechanism::Pkexec => "pkexec",
            Mechanism::GuiSudo => "gksudo",
            Mechanism::PasswordlessSudo | Mechanism::SudoPrompt => "sudo",
        }
    }

    /// Additional silent probe that must succeed, if any.
    ///
    /// Passwordless sudo is only usable when `sudo -n true` exits zero;
    /// attempting it otherwise would hang or fail on a password prompt.
    pub fn probe(self) -> Option<(&'static str, &'static [&'static str])> {
        match self {
            Mechanism::PasswordlessSudo => Some(("sudo", &["-n", "true"])),
            _ => None,
        }
    }

    /// Argv for running `shell_command` through this mechanism.
    pub fn invocation(self, shell_command: &str) -> (String, Vec<String>) {
        let wrap = |program: &str, mut prefix: Vec<String>| {
            prefix.extend(["sh".to_string(), "-c".to_string(), shell_command.to_string()]);
            (program.to_string(), prefix)
        };
        match self {
            Mechanism::Pkexec => wrap("pkexec", Vec::new()),
            // gksudo takes the whole command as a single argument.
            Mechanism::GuiSudo => ("gksudo".to_string(), vec![shell_command.to_string()]),
            Mechanism::PasswordlessSudo => wrap("sudo", vec!["-n".to_string()]),
            Mechanism::SudoPrompt => wrap("sudo", Vec::new()),
        }
    }

    /// True when the mechanism may prompt on the controlling terminal.
    pub fn prompts_on_terminal(self) -> bool {
        matches!(self, Mechanism::SudoPrompt)
    }

    pub fn label(self) -> &'static str {
        match self {
            Mechanism::Pkexec => "pkexec",
            Mechanism::GuiSudo => "gksudo",
            Mechanism::PasswordlessSudo => "passwordless sudo",
            Mechanism::SudoPrompt => "sudo",
        }
    }
}

const HEADLESS_CHAIN: &[Mechanism] = &[Mechanism::Pkexec, Mechanism::GuiSudo];
const INTERACTIVE_CHAIN: &[Mechanism] = &[Mechanism::PasswordlessSudo, Mechanism::SudoPrompt];

/// Candidate mechanisms for a run mode, in preference order.
///
/// Headless runs have no terminal to prompt on, so they only get GUI-capable
/// helpers; interactive runs never pop up GUI authentication dialogs.
pub fn chain(mode: RunMode) -> &'static [Mechanism] {
    match mode {
        RunMode::Headless => HEADLESS_CHAIN,
        RunMode::Interactive => INTERACTIVE_CHAIN,
    }
}
