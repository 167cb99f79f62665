//! Canonical paths within the install directory.

use std::path::PathBuf;

/// All launcher-owned paths for an install directory.
#[derive(Debug, Clone)]
pub struct LauncherPaths {
    pub install_dir: PathBuf,
    pub launcher_dir: PathBuf,
    pub config_path: PathBuf,
    pub state_path: PathBuf,
    pub log_path: PathBuf,
    /// Pre-state-record sentinel: desktop integration already done.
    pub legacy_setup_marker: PathBuf,
    /// Pre-state-record sentinel: one-time tip already shown.
    pub legacy_info_marker: PathBuf,
}

impl LauncherPaths {
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        let install_dir = install_dir.into();
        let launcher_dir = install_dir.join(".launcher");
        Self {
            install_dir: install_dir.clone(),
            launcher_dir: launcher_dir.clone(),
            config_path: launcher_dir.join("config.toml"),
            state_path: launcher_dir.join("state.json"),
            log_path: launcher_dir.join("launcher.log"),
            legacy_setup_marker: install_dir.join(".setup_done"),
            legacy_info_marker: install_dir.join(".info_shown"),
        }
    }
}
