//! One-time desktop integration.
//!
//! The actual icon/shortcut generation lives in an external helper; the
//! launcher only invokes it once per install, gated by the persisted
//! `setup_complete` flag.

use anyhow::Result;
use tracing::{debug, warn};

use crate::bootstrap::BootstrapContext;
use crate::io::host::{CommandHost, HostCommand, OutputMode};
use crate::io::state::{LauncherState, write_state};

/// Run the configured desktop-integration helper on first run.
///
/// The flag is set only when the helper succeeds, so a failed attempt is
/// retried on the next launch; failure never blocks the launch itself.
pub fn ensure_desktop_integration<H: CommandHost>(
    ctx: &BootstrapContext,
    host: &H,
    state: &mut LauncherState,
) -> Result<()> {
    if state.setup_complete {
        debug!("desktop integration already done");
        return Ok(());
    }
    let Some((program, args)) = ctx.config.desktop.command.split_first() else {
        debug!("no desktop integration command configured");
        return Ok(());
    };

    ctx.console.say("Setting up the desktop shortcut.");
    let command = HostCommand::with_args(program.clone(), args.to_vec(), OutputMode::Forward)
        .cwd(&ctx.paths.install_dir);
    match host.run(&command) {
        Ok(status) if status.success => {
            state.setup_complete = true;
            write_state(&ctx.paths.state_path, state)?;
        }
        Ok(status) => {
            warn!(exit_code = ?status.code, "desktop integration failed; continuing without it");
        }
        Err(err) => {
            warn!(err = %err, "desktop integration could not run; continuing without it");
        }
    }
    Ok(())
}
