//! Isolated package environment management.
//!
//! The GUI's packages live in a disposable virtualenv under the install
//! directory. The environment is either fully absent or fully valid before
//! the run proceeds: a present-but-broken root is destroyed and recreated,
//! never patched in place.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::bootstrap::BootstrapContext;
use crate::escalate;
use crate::io::host::{CommandHost, HostCommand, OutputMode};

/// Package installed when environment creation itself fails.
pub const ENV_TOOL_PACKAGES: &[&str] = &["python3-venv"];

/// Fatal: the environment is still unusable after destroy-and-recreate.
#[derive(Debug)]
pub struct EnvironmentUnusable {
    pub root: PathBuf,
}

impl fmt::Display for EnvironmentUnusable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "package environment at {} is unusable; remove it and recreate manually: \
             rm -rf {} && python3 -m venv {}",
            self.root.display(),
            self.root.display(),
            self.root.display()
        )
    }
}

impl std::error::Error for EnvironmentUnusable {}

/// Fatal: the activated interpreter does not report the expected root.
#[derive(Debug)]
pub struct ActivationMismatch {
    pub expected: PathBuf,
    pub actual: String,
}

impl fmt::Display for ActivationMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "environment activation mismatch: expected VIRTUAL_ENV {} but the interpreter \
             reports '{}'; remove {} and run the launcher again",
            self.expected.display(),
            self.actual,
            self.expected.display()
        )
    }
}

impl std::error::Error for ActivationMismatch {}

/// A virtualenv root and its entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolatedEnv {
    root: PathBuf,
    python: PathBuf,
    pip: PathBuf,
}

impl IsolatedEnv {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let bin = root.join("bin");
        Self {
            python: bin.join("python"),
            pip: bin.join("pip"),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    pub fn pip(&self) -> &Path {
        &self.pip
    }

    /// Full validity check: root present, pip entry point present, and a
    /// trivial query actually executes.
    ///
    /// Creation "succeeding" at the process level without producing a
    /// working pip is treated as invalid, not as success.
    pub fn is_valid<H: CommandHost>(&self, host: &H) -> bool {
        if !self.root.is_dir() {
            debug!(root = %self.root.display(), "environment root missing");
            return false;
        }
        if !self.pip.is_file() {
            debug!(pip = %self.pip.display(), "pip entry point missing");
            return false;
        }
        let query = HostCommand::quiet(self.pip.display().to_string(), &["--version"]);
        match host.run(&query) {
            Ok(status) if status.success => true,
            Ok(status) => {
                debug!(exit_code = ?status.code, "pip query failed");
                false
            }
            Err(err) => {
                debug!(err = %err, "pip query could not run");
                false
            }
        }
    }

    /// Activate for child processes: `VIRTUAL_ENV` plus `bin` on PATH.
    pub fn activate(&self) -> ActivatedEnv {
        let bin = self.root.join("bin");
        let path_value = match std::env::var("PATH") {
            Ok(existing) => format!("{}:{existing}", bin.display()),
            Err(_) => bin.display().to_string(),
        };
        ActivatedEnv {
            env: self.clone(),
            path_value,
        }
    }
}

/// An activated environment: builds child commands that resolve against it.
#[derive(Debug, Clone)]
pub struct ActivatedEnv {
    env: IsolatedEnv,
    path_value: String,
}

impl ActivatedEnv {
    pub fn root(&self) -> &Path {
        self.env.root()
    }

    pub fn python(&self) -> &Path {
        self.env.python()
    }

    pub fn pip(&self) -> &Path {
        self.env.pip()
    }

    /// A host command with the activation environment applied.
    pub fn command(&self, program: &Path, args: &[&str], mode: OutputMode) -> HostCommand {
        let args = args.iter().map(|arg| (*arg).to_string()).collect();
        HostCommand::with_args(program.display().to_string(), args, mode)
            .env("VIRTUAL_ENV", self.env.root().display().to_string())
            .env("PATH", self.path_value.clone())
    }

    /// Sanity-check activation: the interpreter must see the expected root.
    pub fn verify<H: CommandHost>(&self, host: &H) -> Result<()> {
        let command = self.command(
            self.env.python(),
            &["-c", "import os; print(os.environ.get('VIRTUAL_ENV', ''))"],
            OutputMode::Quiet,
        );
        let (status, stdout) = host
            .run_captured(&command)
            .context("query VIRTUAL_ENV from the interpreter")?;
        let actual = stdout.trim().to_string();
        let expected = self.env.root();
        if !status.success || Path::new(&actual) != expected {
            return Err(ActivationMismatch {
                expected: expected.to_path_buf(),
                actual,
            }
            .into());
        }
        debug!(root = %expected.display(), "environment activation verified");
        Ok(())
    }
}

/// Ensure a fully valid environment exists, recreating it if needed.
///
/// Creation failure triggers one escalated install of the venv capability
/// followed by exactly one retry. A second failure is fatal, as is a
/// creation that does not yield a valid environment.
pub fn ensure_environment<H: CommandHost>(
    ctx: &BootstrapContext,
    host: &H,
    python: &Path,
) -> Result<IsolatedEnv> {
    let env = IsolatedEnv::at(ctx.paths.install_dir.join(&ctx.config.env_dir));

    if env.is_valid(host) {
        debug!(root = %env.root().display(), "environment already valid");
        return Ok(env);
    }

    if env.root().exists() {
        ctx.console.say("Package environment is damaged; recreating it.");
        fs::remove_dir_all(env.root())
            .with_context(|| format!("remove environment {}", env.root().display()))?;
    } else {
        ctx.console.say("Creating the package environment.");
    }

    if !create_env(host, python, &env)? {
        warn!("environment creation failed; installing the venv capability and retrying once");
        let install = format!("apt-get install -y {}", ENV_TOOL_PACKAGES.join(" "));
        escalate::run_elevated(host, ctx.mode, &ctx.console, &install)?;
        if !create_env(host, python, &env)? {
            return Err(EnvironmentUnusable {
                root: env.root().to_path_buf(),
            }
            .into());
        }
    }

    if !env.is_valid(host) {
        return Err(EnvironmentUnusable {
            root: env.root().to_path_buf(),
        }
        .into());
    }

    info!(root = %env.root().display(), "environment ready");
    Ok(env)
}

/// Run `python -m venv <root>`; spawn failures count as creation failures.
fn create_env<H: CommandHost>(host: &H, python: &Path, env: &IsolatedEnv) -> Result<bool> {
    let root = env.root().display().to_string();
    let command = HostCommand::with_args(
        python.display().to_string(),
        vec!["-m".to_string(), "venv".to_string(), root],
        OutputMode::Forward,
    );
    match host.run(&command) {
        Ok(status) => Ok(status.success),
        Err(err) => {
            warn!(err = %err, "could not run the venv module");
            Ok(false)
        }
    }
}
