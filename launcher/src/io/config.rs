//! Launcher configuration stored under `.launcher/config.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Launcher configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to the values an ordinary install
/// expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LauncherConfig {
    /// Repo-relative path of the entry script; a pull that changes it forces
    /// a restart of the bootstrap.
    pub entry_point: String,

    /// GUI script run inside the isolated environment, with no arguments.
    pub gui_script: String,

    /// Directory name of the isolated environment under the install dir.
    pub env_dir: String,

    pub managed_project: ManagedProjectConfig,

    pub desktop: DesktopConfig,
}

/// Optional sync of a subordinate project's working copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ManagedProjectConfig {
    pub enabled: bool,
    /// Directory of the managed working copy, relative to the install dir.
    pub dir: String,
}

/// One-time desktop integration helper (external collaborator).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DesktopConfig {
    /// Command to execute once on first run (e.g. `["bash",
    /// "install/desktop-entry.sh"]`). Empty means skip.
    pub command: Vec<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            entry_point: "run.sh".to_string(),
            gui_script: "launcher_gui.py".to_string(),
            env_dir: "venv".to_string(),
            managed_project: ManagedProjectConfig::default(),
            desktop: DesktopConfig::default(),
        }
    }
}

impl Default for ManagedProjectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: "nvr".to_string(),
        }
    }
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            command: vec!["bash".to_string(), "install/desktop-entry.sh".to_string()],
        }
    }
}

impl LauncherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.entry_point.trim().is_empty() {
            return Err(anyhow!("entry_point must not be empty"));
        }
        if self.gui_script.trim().is_empty() {
            return Err(anyhow!("gui_script must not be empty"));
        }
        if self.env_dir.trim().is_empty() || self.env_dir.contains(['/', '\\']) {
            return Err(anyhow!("env_dir must be a plain directory name"));
        }
        if self.managed_project.enabled && self.managed_project.dir.trim().is_empty() {
            return Err(anyhow!("managed_project.dir must not be empty when enabled"));
        }
        if self
            .desktop
            .command
            .first()
            .is_some_and(|program| program.trim().is_empty())
        {
            return Err(anyhow!("desktop.command program must not be empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LauncherConfig::default()`.
pub fn load_config(path: &Path) -> Result<LauncherConfig> {
    if !path.exists() {
        let cfg = LauncherConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LauncherConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
