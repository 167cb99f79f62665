//! Run-mode classification from the terminal-type indicator.
//!
//! The mode is derived once per invocation and threaded explicitly through
//! the bootstrap context; no component re-reads the environment later.

/// How this invocation was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// A real terminal is attached (started from a shell).
    Interactive,
    /// No real terminal (desktop icon / GUI-triggered launch).
    Headless,
}

impl RunMode {
    pub fn is_headless(self) -> bool {
        matches!(self, RunMode::Headless)
    }
}

/// Terminal types that mean "no real terminal is attached".
const NO_TERMINAL_SENTINEL: &str = "dumb";

/// Classify the run from the `TERM` value visible to the process.
///
/// Absent, empty, or the `dumb` sentinel all mean the launcher was started
/// without a usable terminal (typically via a desktop icon).
pub fn classify_terminal(term: Option<&str>) -> RunMode {
    match term.map(str::trim) {
        None | Some("") | Some(NO_TERMINAL_SENTINEL) => RunMode::Headless,
        Some(_) => RunMode::Interactive,
    }
}
