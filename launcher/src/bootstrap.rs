//! Bootstrap state machine for one logical run.
//!
//! Phases run strictly in sequence: self-update → managed-project update →
//! first-run desktop integration → runtime check → environment check →
//! activation check → dependency check → GUI launch. A restart request from
//! the self-update phase is a terminal transition handled by the supervising
//! loop in `main`, not by replacing the process image.

use anyhow::Result;
use tracing::{debug, info};

use crate::core::mode::RunMode;
use crate::io::config::LauncherConfig;
use crate::io::host::CommandHost;
use crate::io::paths::LauncherPaths;
use crate::io::state::load_state;
use crate::logging::Console;
use crate::{deps, environment, first_run, launch, runtime, update};

/// Everything a bootstrap phase needs, threaded explicitly.
#[derive(Clone)]
pub struct BootstrapContext {
    pub mode: RunMode,
    pub paths: LauncherPaths,
    pub config: LauncherConfig,
    pub console: Console,
}

/// Terminal result of one logical run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The GUI was launched and has exited; shut down normally.
    Launched,
    /// The entry script was updated; re-run the bootstrap from the top.
    RestartRequested,
}

/// Execute one logical run of the bootstrap.
///
/// `allow_restart` is false on the re-run after a self-update: having just
/// pulled, the updater will find local == remote, but the guard makes the
/// two-generation bound structural rather than assumed.
pub fn run_once<H: CommandHost>(
    ctx: &BootstrapContext,
    host: &H,
    allow_restart: bool,
) -> Result<RunOutcome> {
    debug!(mode = ?ctx.mode, install_dir = %ctx.paths.install_dir.display(), "bootstrap starting");

    let report = update::update_self(&ctx.paths.install_dir, &ctx.config.entry_point);
    if report.restart_required && allow_restart {
        return Ok(RunOutcome::RestartRequested);
    }

    update::update_managed_project(&ctx.paths.install_dir, &ctx.config.managed_project);

    let mut state = load_state(&ctx.paths)?;
    first_run::ensure_desktop_integration(ctx, host, &mut state)?;

    let python = runtime::ensure_runtime(ctx, host)?;
    let env = environment::ensure_environment(ctx, host, &python)?;
    let activated = env.activate();
    activated.verify(host)?;

    deps::ensure_dependencies(ctx, host, &activated)?;
    launch::run_gui(ctx, host, &activated, &mut state)?;

    info!("bootstrap complete");
    Ok(RunOutcome::Launched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{GitFixture, ScriptedHost, context_for};

    /// An entry-script update triggers exactly one restart request; once the
    /// supervisor disallows restarts, the same run proceeds past the update.
    #[test]
    fn restart_is_requested_at_most_once() {
        let fixture = GitFixture::new().expect("fixture");
        fixture
            .commit_upstream("run.sh", "#!/bin/sh\necho v2\n", "new entry script")
            .expect("commit");
        let ctx = context_for(fixture.clone_dir());
        // Self-update pulls; the phases after it stop at the runtime check.
        let host = ScriptedHost::new();

        let outcome = run_once(&ctx, &host, true).expect("run");
        assert_eq!(outcome, RunOutcome::RestartRequested);

        // Second generation: the pull already happened, restart disallowed;
        // the run proceeds into provisioning and fails on the missing
        // runtime rather than looping.
        let err = run_once(&ctx, &host, false).unwrap_err();
        assert!(
            err.downcast_ref::<crate::runtime::RuntimeUnavailable>()
                .is_none(),
            "escalation exhaustion comes first on a bare scripted host"
        );
        assert!(
            err.downcast_ref::<crate::escalate::EscalationExhausted>()
                .is_some()
        );
    }

    /// Fresh-machine path: runtime present, environment created, packages
    /// installed, GUI launched, both persistent flags set by end of run.
    #[test]
    fn fresh_run_provisions_and_launches() {
        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = context_for(temp.path());
        let venv = ctx.paths.install_dir.join("venv");
        let venv_for_hook = venv.clone();
        let host = ScriptedHost::new()
            .with_binary("python3")
            .on_run(move |call| {
                if call.args.first().is_some_and(|arg| arg == "-m") {
                    let bin = venv_for_hook.join("bin");
                    std::fs::create_dir_all(&bin).expect("mkdir");
                    std::fs::write(bin.join("pip"), "#!/bin/sh\n").expect("pip");
                    std::fs::write(bin.join("python"), "#!/bin/sh\n").expect("python");
                }
            })
            .respond_success() // desktop integration helper
            .respond_captured("Python 3.12.3\n") // version query
            .respond_success() // venv creation
            .respond_success() // validity pip --version
            .respond_captured(&format!("{}\n", venv.display())) // activation check
            .respond_success() // pip upgrade
            .respond_success() // pip install
            .respond_success(); // the GUI itself

        let outcome = run_once(&ctx, &host, true).expect("run");

        assert_eq!(outcome, RunOutcome::Launched);
        let state = crate::io::state::load_state(&ctx.paths).expect("state");
        assert!(state.setup_complete);
        assert!(state.info_shown);
    }

    /// Fresh interactive machine with passwordless sudo: the runtime is
    /// installed silently, and everything downstream proceeds to the GUI.
    #[test]
    fn fresh_interactive_machine_installs_runtime_silently() {
        use crate::test_support::context_with_mode;

        let temp = tempfile::tempdir().expect("tempdir");
        let ctx = context_with_mode(temp.path(), RunMode::Interactive);
        let venv = ctx.paths.install_dir.join("venv");
        let venv_for_hook = venv.clone();
        let host = ScriptedHost::new()
            .with_binary("sudo")
            .locate_later("python3")
            .on_run(move |call| {
                if call.args.first().is_some_and(|arg| arg == "-m") {
                    let bin = venv_for_hook.join("bin");
                    std::fs::create_dir_all(&bin).expect("mkdir");
                    std::fs::write(bin.join("pip"), "#!/bin/sh\n").expect("pip");
                    std::fs::write(bin.join("python"), "#!/bin/sh\n").expect("python");
                }
            })
            .respond_success() // desktop integration helper
            .respond_success() // sudo -n true probe
            .respond_success() // sudo -n apt-get install (runtime)
            .respond_captured("Python 3.12.3\n") // version query
            .respond_success() // venv creation
            .respond_success() // validity pip --version
            .respond_captured(&format!("{}\n", venv.display())) // activation check
            .respond_success() // pip upgrade
            .respond_success() // pip install
            .respond_success(); // the GUI itself

        let outcome = run_once(&ctx, &host, true).expect("run");

        assert_eq!(outcome, RunOutcome::Launched);
        let calls = host.calls();
        let elevated: Vec<_> = calls
            .iter()
            .filter(|call| call.program == "sudo" && call.args.contains(&"sh".to_string()))
            .collect();
        assert_eq!(elevated.len(), 1);
        assert_eq!(elevated[0].args[0], "-n", "elevation ran silently");
        let state = crate::io::state::load_state(&ctx.paths).expect("state");
        assert!(state.setup_complete);
        assert!(state.info_shown);
    }

    /// Headless with no GUI elevation helper available: fatal before any
    /// GUI launch is attempted.
    #[test]
    fn headless_without_helpers_fails_before_launch() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut ctx = context_for(temp.path());
        ctx.config.desktop.command.clear();
        // No python3, no pkexec, no gksudo.
        let host = ScriptedHost::new();

        let err = run_once(&ctx, &host, true).unwrap_err();

        assert!(
            err.downcast_ref::<crate::escalate::EscalationExhausted>()
                .is_some()
        );
        assert!(host.calls().is_empty(), "no GUI launch was attempted");
    }
}
