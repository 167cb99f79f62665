//! Launcher entry point.
//!
//! Invoked with no arguments (desktop icon or shell). A supervising loop
//! re-runs the bootstrap routine once when a self-update rewrote the entry
//! script, releasing the log sink in between, so the update never relies on
//! in-place process replacement.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use launcher::bootstrap::{self, BootstrapContext, RunOutcome};
use launcher::core::mode::classify_terminal;
use launcher::deps::DependenciesUnresolved;
use launcher::environment::{ActivationMismatch, EnvironmentUnusable};
use launcher::escalate::EscalationExhausted;
use launcher::exit_codes;
use launcher::io::config::load_config;
use launcher::io::host::SystemHost;
use launcher::io::paths::LauncherPaths;
use launcher::logging::{self, Console};

#[derive(Parser)]
#[command(
    name = "launcher",
    version,
    about = "Bootstraps this install and starts the camera-station GUI"
)]
struct Cli {}

fn main() -> ExitCode {
    let _cli = Cli::parse();
    match run() {
        Ok(code) => exit_code(code),
        Err(err) => {
            eprintln!("{err:#}");
            exit_code(exit_codes::PROVISIONING)
        }
    }
}

fn run() -> Result<i32> {
    let install_dir = std::env::current_dir().context("determine install directory")?;
    let mode = classify_terminal(std::env::var("TERM").ok().as_deref());
    let paths = LauncherPaths::new(&install_dir);

    let sink = logging::init(mode, &paths.log_path)?;
    let console = Console::new(sink.clone());
    let config = load_config(&paths.config_path)?;
    let host = SystemHost::new(mode, sink.clone());

    let ctx = BootstrapContext {
        mode,
        paths,
        config,
        console: console.clone(),
    };

    let mut allow_restart = true;
    loop {
        match bootstrap::run_once(&ctx, &host, allow_restart) {
            Ok(RunOutcome::Launched) => return Ok(exit_codes::OK),
            Ok(RunOutcome::RestartRequested) => {
                // One-shot: the re-run finds local == remote and proceeds.
                info!("entry script updated; restarting the bootstrap");
                console.say("Launcher updated; restarting.");
                if let Some(sink) = &sink {
                    sink.flush();
                }
                allow_restart = false;
            }
            Err(err) => {
                console.error(&format!("{err:#}"));
                return Ok(fatal_exit_code(&err));
            }
        }
    }
}

/// Map a fatal bootstrap error to its stable exit code.
fn fatal_exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<EscalationExhausted>().is_some() {
        exit_codes::ESCALATION
    } else if err.downcast_ref::<EnvironmentUnusable>().is_some()
        || err.downcast_ref::<ActivationMismatch>().is_some()
    {
        exit_codes::ENVIRONMENT
    } else if err.downcast_ref::<DependenciesUnresolved>().is_some() {
        exit_codes::DEPENDENCIES
    } else {
        // Runtime-missing and anything unexpected both count as a
        // provisioning failure.
        exit_codes::PROVISIONING
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
