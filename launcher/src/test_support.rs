//! Test-only helpers: scripted hosts and real-git fixtures.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::bootstrap::BootstrapContext;
use crate::core::mode::RunMode;
use crate::io::config::LauncherConfig;
use crate::io::host::{CommandHost, HostCommand, HostStatus};
use crate::io::paths::LauncherPaths;
use crate::logging::Console;

enum ScriptedResponse {
    Status(HostStatus),
    Captured(String),
    SpawnError(String),
}

type RunHook = Box<dyn Fn(&HostCommand) + Send + Sync>;

/// A [`CommandHost`] that records every invocation and replays predetermined
/// results without spawning processes.
///
/// Responses are consumed in order by `run`/`run_captured`; an empty queue
/// defaults to success. Binaries are visible to `locate` only when declared.
#[derive(Default)]
pub struct ScriptedHost {
    binaries: HashMap<String, PathBuf>,
    /// Binaries that appear on PATH only after one failed lookup.
    deferred_binaries: Mutex<HashMap<String, u32>>,
    responses: Mutex<VecDeque<ScriptedResponse>>,
    calls: Mutex<Vec<HostCommand>>,
    run_hook: Option<RunHook>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a binary as present on PATH.
    pub fn with_binary(mut self, name: &str) -> Self {
        self.binaries
            .insert(name.to_string(), PathBuf::from("/usr/bin").join(name));
        self
    }

    /// Declare a binary that resolves only after the first lookup missed,
    /// mimicking an install that happened mid-run.
    pub fn locate_later(self, name: &str) -> Self {
        self.deferred_binaries
            .lock()
            .expect("lock")
            .insert(name.to_string(), 1);
        self
    }

    pub fn respond_success(self) -> Self {
        self.push(ScriptedResponse::Status(HostStatus::ok()))
    }

    pub fn respond_failure(self, code: i32) -> Self {
        self.push(ScriptedResponse::Status(HostStatus::failed(code)))
    }

    pub fn respond_captured(self, stdout: &str) -> Self {
        self.push(ScriptedResponse::Captured(stdout.to_string()))
    }

    pub fn respond_spawn_error(self, message: &str) -> Self {
        self.push(ScriptedResponse::SpawnError(message.to_string()))
    }

    /// Observe every `run`/`run_captured` invocation (e.g. to materialize
    /// filesystem effects a real command would have).
    pub fn on_run(mut self, hook: impl Fn(&HostCommand) + Send + Sync + 'static) -> Self {
        self.run_hook = Some(Box::new(hook));
        self
    }

    /// All commands run so far, in order.
    pub fn calls(&self) -> Vec<HostCommand> {
        self.calls.lock().expect("lock").clone()
    }

    fn push(self, response: ScriptedResponse) -> Self {
        self.responses.lock().expect("lock").push_back(response);
        self
    }

    fn record(&self, command: &HostCommand) {
        if let Some(hook) = &self.run_hook {
            hook(command);
        }
        self.calls.lock().expect("lock").push(command.clone());
    }

    fn next_response(&self) -> ScriptedResponse {
        self.responses
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| ScriptedResponse::Status(HostStatus::ok()))
    }
}

impl CommandHost for ScriptedHost {
    fn locate(&self, binary: &str) -> Option<PathBuf> {
        if let Some(path) = self.binaries.get(binary) {
            return Some(path.clone());
        }
        let mut deferred = self.deferred_binaries.lock().expect("lock");
        match deferred.get_mut(binary) {
            Some(misses) if *misses > 0 => {
                *misses -= 1;
                None
            }
            Some(_) => Some(PathBuf::from("/usr/bin").join(binary)),
            None => None,
        }
    }

    fn run(&self, command: &HostCommand) -> Result<HostStatus> {
        self.record(command);
        match self.next_response() {
            ScriptedResponse::Status(status) => Ok(status),
            ScriptedResponse::Captured(_) => Ok(HostStatus::ok()),
            ScriptedResponse::SpawnError(message) => Err(anyhow!(message)),
        }
    }

    fn run_captured(&self, command: &HostCommand) -> Result<(HostStatus, String)> {
        self.record(command);
        match self.next_response() {
            ScriptedResponse::Status(status) => Ok((status, String::new())),
            ScriptedResponse::Captured(stdout) => Ok((HostStatus::ok(), stdout)),
            ScriptedResponse::SpawnError(message) => Err(anyhow!(message)),
        }
    }
}

/// A headless bootstrap context over a fresh temporary install directory.
pub fn headless_context() -> (BootstrapContext, TempDir) {
    let temp = TempDir::new().expect("tempdir");
    let ctx = context_for(temp.path());
    (ctx, temp)
}

/// A headless bootstrap context for an existing install directory.
pub fn context_for(install_dir: &Path) -> BootstrapContext {
    context_with_mode(install_dir, RunMode::Headless)
}

/// A bootstrap context with an explicit run mode.
pub fn context_with_mode(install_dir: &Path, mode: RunMode) -> BootstrapContext {
    BootstrapContext {
        mode,
        paths: LauncherPaths::new(install_dir),
        config: LauncherConfig::default(),
        console: Console::new(None),
    }
}

/// An upstream repository plus a tracking clone, both on disk.
///
/// The upstream starts with `run.sh` and `README.md` committed, so entry
/// point changes and ordinary changes can both be exercised.
pub struct GitFixture {
    temp: TempDir,
    upstream: PathBuf,
    checkout: PathBuf,
}

impl GitFixture {
    pub fn new() -> Result<Self> {
        let temp = TempDir::new().context("tempdir")?;
        let upstream = temp.path().join("upstream");
        let checkout = temp.path().join("checkout");

        std::fs::create_dir_all(&upstream).context("create upstream dir")?;
        run_git(&upstream, &["init", "--quiet"])?;
        std::fs::write(upstream.join("run.sh"), "#!/bin/sh\necho v1\n")
            .context("seed run.sh")?;
        std::fs::write(upstream.join("README.md"), "initial docs\n")
            .context("seed README.md")?;
        run_git(&upstream, &["add", "-A"])?;
        run_git(&upstream, &["commit", "--quiet", "-m", "initial import"])?;

        let fixture = Self {
            temp,
            upstream,
            checkout,
        };
        fixture.clone_into(&fixture.checkout)?;
        Ok(fixture)
    }

    pub fn upstream_dir(&self) -> &Path {
        &self.upstream
    }

    pub fn clone_dir(&self) -> &Path {
        &self.checkout
    }

    /// Commit a file change upstream, to be picked up by the next sync.
    pub fn commit_upstream(&self, relative: &str, contents: &str, message: &str) -> Result<()> {
        let path = self.upstream.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("create parent")?;
        }
        std::fs::write(&path, contents).with_context(|| format!("write {relative}"))?;
        run_git(&self.upstream, &["add", "-A"])?;
        run_git(&self.upstream, &["commit", "--quiet", "-m", message])?;
        Ok(())
    }

    /// Clone the upstream into an arbitrary destination.
    ///
    /// The clone gets a local identity so stash commits made by the updater
    /// work on machines with no global git config.
    pub fn clone_into(&self, destination: &Path) -> Result<()> {
        run_git(
            self.temp.path(),
            &[
                "clone",
                "--quiet",
                self.upstream.to_str().context("upstream path utf-8")?,
                destination.to_str().context("destination path utf-8")?,
            ],
        )?;
        run_git(destination, &["config", "user.name", "launcher-tests"])?;
        run_git(destination, &["config", "user.email", "tests@example.invalid"])?;
        run_git(destination, &["config", "commit.gpgsign", "false"])?;
        Ok(())
    }
}

fn run_git(dir: &Path, args: &[&str]) -> Result<()> {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=launcher-tests",
            "-c",
            "user.email=tests@example.invalid",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}
