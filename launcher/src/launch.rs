//! GUI launch supervision.
//!
//! The GUI process is opaque to the launcher: it runs inside the activated
//! environment, blocks the run until it exits, and any exit status is
//! accepted. The only extra behavior is the one-time shortcut tip after the
//! first fully provisioned run.

use anyhow::Result;
use tracing::info;

use crate::bootstrap::BootstrapContext;
use crate::environment::ActivatedEnv;
use crate::io::host::{CommandHost, OutputMode};
use crate::io::state::{LauncherState, write_state};

/// Run the GUI and wait for it to terminate.
pub fn run_gui<H: CommandHost>(
    ctx: &BootstrapContext,
    host: &H,
    env: &ActivatedEnv,
    state: &mut LauncherState,
) -> Result<()> {
    ctx.console
        .say(&format!("Starting {} ...", ctx.config.gui_script));

    let command = env
        .command(env.python(), &[ctx.config.gui_script.as_str()], OutputMode::Forward)
        .cwd(&ctx.paths.install_dir);
    let status = host.run(&command)?;

    info!(exit_code = ?status.code, "GUI process exited");
    ctx.console.say(&format!(
        "{} closed (exit code {}).",
        ctx.config.gui_script,
        status.code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
    ));

    if state.setup_complete && !state.info_shown {
        ctx.console.say(
            "Tip: next time you can start this application from its desktop shortcut \
             or application menu entry.",
        );
        state.info_shown = true;
        write_state(&ctx.paths.state_path, state)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::IsolatedEnv;
    use crate::io::state::load_state;
    use crate::test_support::{ScriptedHost, headless_context};

    fn activated(ctx: &BootstrapContext) -> ActivatedEnv {
        IsolatedEnv::at(ctx.paths.install_dir.join("venv")).activate()
    }

    #[test]
    fn gui_runs_in_activated_environment_from_install_dir() {
        let (ctx, _temp) = headless_context();
        let host = ScriptedHost::new().respond_success();
        let mut state = LauncherState::default();

        run_gui(&ctx, &host, &activated(&ctx), &mut state).expect("launch");

        let calls = host.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec!["launcher_gui.py"]);
        assert_eq!(calls[0].cwd.as_deref(), Some(ctx.paths.install_dir.as_path()));
        assert!(calls[0].env.iter().any(|(key, _)| key == "VIRTUAL_ENV"));
    }

    /// Any GUI exit status is accepted; a crash is not a launcher failure.
    #[test]
    fn nonzero_gui_exit_is_not_an_error() {
        let (ctx, _temp) = headless_context();
        let host = ScriptedHost::new().respond_failure(134);
        let mut state = LauncherState::default();

        run_gui(&ctx, &host, &activated(&ctx), &mut state).expect("launch");
    }

    #[test]
    fn tip_is_shown_once_after_setup() {
        let (ctx, _temp) = headless_context();
        let host = ScriptedHost::new().respond_success().respond_success();
        let mut state = LauncherState {
            setup_complete: true,
            ..LauncherState::default()
        };

        run_gui(&ctx, &host, &activated(&ctx), &mut state).expect("launch");
        assert!(state.info_shown);
        assert!(load_state(&ctx.paths).expect("reload").info_shown);

        // Second launch: flag already set, no further state writes needed.
        run_gui(&ctx, &host, &activated(&ctx), &mut state).expect("launch");
        assert!(state.info_shown);
    }

    #[test]
    fn tip_is_withheld_until_setup_completes() {
        let (ctx, _temp) = headless_context();
        let host = ScriptedHost::new().respond_success();
        let mut state = LauncherState::default();

        run_gui(&ctx, &host, &activated(&ctx), &mut state).expect("launch");

        assert!(!state.info_shown);
    }
}
