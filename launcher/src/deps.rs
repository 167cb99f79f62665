//! Package installation inside the isolated environment.

use std::fmt;

use anyhow::Result;
use tracing::{info, warn};

use crate::bootstrap::BootstrapContext;
use crate::environment::ActivatedEnv;
use crate::escalate;
use crate::io::host::{CommandHost, OutputMode};

/// Packages the GUI needs inside the environment.
pub const PYTHON_PACKAGES: &[&str] = &["PySide6", "PyYAML", "requests", "psutil"];

/// System build prerequisites installed when a pip build fails.
pub const BUILD_PACKAGES: &[&str] = &["build-essential", "python3-dev", "pkg-config"];

/// Fatal: packages still missing after the single retry.
#[derive(Debug)]
pub struct DependenciesUnresolved;

impl fmt::Display for DependenciesUnresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "required packages could not be installed; run manually: pip install {}",
            PYTHON_PACKAGES.join(" ")
        )
    }
}

impl std::error::Error for DependenciesUnresolved {}

/// Ensure the required packages are present in the activated environment.
///
/// The pip self-upgrade is best-effort. Package installation gets exactly
/// one retry, after an escalated install of the build prerequisites; a
/// second failure is fatal and a third attempt never happens.
pub fn ensure_dependencies<H: CommandHost>(
    ctx: &BootstrapContext,
    host: &H,
    env: &ActivatedEnv,
) -> Result<()> {
    upgrade_pip(host, env);

    for attempt in 0..2 {
        if install_packages(host, env)? {
            info!(packages = PYTHON_PACKAGES.len(), "packages present");
            return Ok(());
        }
        if attempt == 0 {
            warn!("package installation failed; installing build prerequisites and retrying once");
            ctx.console
                .say("Package installation failed; installing system build prerequisites.");
            let install = format!("apt-get install -y {}", BUILD_PACKAGES.join(" "));
            escalate::run_elevated(host, ctx.mode, &ctx.console, &install)?;
        }
    }

    Err(DependenciesUnresolved.into())
}

fn upgrade_pip<H: CommandHost>(host: &H, env: &ActivatedEnv) {
    let command = env.command(env.pip(), &["install", "--upgrade", "pip"], OutputMode::Forward);
    match host.run(&command) {
        Ok(status) if status.success => {}
        Ok(status) => {
            warn!(exit_code = ?status.code, "pip self-upgrade failed; continuing");
        }
        Err(err) => {
            warn!(err = %err, "pip self-upgrade could not run; continuing");
        }
    }
}

fn install_packages<H: CommandHost>(host: &H, env: &ActivatedEnv) -> Result<bool> {
    let mut args = vec!["install"];
    args.extend(PYTHON_PACKAGES);
    let command = env.command(env.pip(), &args, OutputMode::Forward);
    match host.run(&command) {
        Ok(status) => Ok(status.success),
        Err(err) => {
            warn!(err = %err, "pip could not run");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::IsolatedEnv;
    use crate::test_support::{ScriptedHost, headless_context};

    fn activated() -> ActivatedEnv {
        IsolatedEnv::at("/opt/station/venv").activate()
    }

    fn is_package_install(call: &crate::io::host::HostCommand) -> bool {
        call.program.ends_with("pip")
            && call.args.first().is_some_and(|arg| arg == "install")
            && call.args.get(1).is_some_and(|arg| arg != "--upgrade")
    }

    #[test]
    fn packages_install_on_first_try() {
        let (ctx, _temp) = headless_context();
        let host = ScriptedHost::new()
            .respond_success() // pip upgrade
            .respond_success(); // pip install

        ensure_dependencies(&ctx, &host, &activated()).expect("deps");

        let installs = host.calls().iter().filter(|c| is_package_install(c)).count();
        assert_eq!(installs, 1);
    }

    #[test]
    fn failed_upgrade_is_only_a_warning() {
        let (ctx, _temp) = headless_context();
        let host = ScriptedHost::new()
            .respond_failure(1) // pip upgrade
            .respond_success(); // pip install

        ensure_dependencies(&ctx, &host, &activated()).expect("deps");
    }

    #[test]
    fn failed_install_retries_once_after_prerequisites() {
        let (ctx, _temp) = headless_context();
        let host = ScriptedHost::new()
            .with_binary("pkexec")
            .respond_success() // pip upgrade
            .respond_failure(1) // pip install
            .respond_success() // pkexec apt-get build prerequisites
            .respond_success(); // pip install retry

        ensure_dependencies(&ctx, &host, &activated()).expect("deps");

        let calls = host.calls();
        let installs = calls.iter().filter(|c| is_package_install(c)).count();
        assert_eq!(installs, 2);
        let escalations = calls.iter().filter(|c| c.program == "pkexec").count();
        assert_eq!(escalations, 1);
    }

    /// A second install failure is fatal; a third attempt never occurs.
    #[test]
    fn second_failure_is_fatal_without_third_attempt() {
        let (ctx, _temp) = headless_context();
        let host = ScriptedHost::new()
            .with_binary("pkexec")
            .respond_success() // pip upgrade
            .respond_failure(1) // pip install
            .respond_success() // escalated prerequisites
            .respond_failure(1); // retry

        let err = ensure_dependencies(&ctx, &host, &activated()).unwrap_err();

        assert!(err.downcast_ref::<DependenciesUnresolved>().is_some());
        let installs = host.calls().iter().filter(|c| is_package_install(c)).count();
        assert_eq!(installs, 2);
    }

    #[test]
    fn prerequisite_escalation_failure_propagates() {
        let (ctx, _temp) = headless_context();
        // No escalation mechanism available at all.
        let host = ScriptedHost::new()
            .respond_success() // pip upgrade
            .respond_failure(1); // pip install

        let err = ensure_dependencies(&ctx, &host, &activated()).unwrap_err();

        assert!(
            err.downcast_ref::<crate::escalate::EscalationExhausted>()
                .is_some()
        );
    }
}
