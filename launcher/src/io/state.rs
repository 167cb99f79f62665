//! Persisted launcher state (`.launcher/state.json`).
//!
//! One versioned record replaces the scattered sentinel files earlier
//! revisions used: it is read once at startup and written back atomically at
//! well-defined transition points. Flags are write-once; the launcher never
//! clears them.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::io::paths::LauncherPaths;

pub const STATE_VERSION: u32 = 1;

/// Persistent flags for this install.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LauncherState {
    /// Record format version.
    pub version: u32,
    /// One-time desktop integration has completed.
    pub setup_complete: bool,
    /// One-time shortcut tip has been shown.
    pub info_shown: bool,
}

impl Default for LauncherState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            setup_complete: false,
            info_shown: false,
        }
    }
}

/// Load the state record, seeding it from legacy sentinel files when no
/// record exists yet.
pub fn load_state(paths: &LauncherPaths) -> Result<LauncherState> {
    if paths.state_path.exists() {
        let contents = fs::read_to_string(&paths.state_path)
            .with_context(|| format!("read state {}", paths.state_path.display()))?;
        let state: LauncherState = serde_json::from_str(&contents)
            .with_context(|| format!("parse state {}", paths.state_path.display()))?;
        if state.version > STATE_VERSION {
            return Err(anyhow!(
                "unsupported state version {} in {}",
                state.version,
                paths.state_path.display()
            ));
        }
        debug!(?state, "state record loaded");
        return Ok(state);
    }

    let mut state = LauncherState::default();
    if paths.legacy_setup_marker.exists() {
        info!("migrating legacy setup marker into state record");
        state.setup_complete = true;
    }
    if paths.legacy_info_marker.exists() {
        info!("migrating legacy info marker into state record");
        state.info_shown = true;
    }
    Ok(state)
}

/// Atomically write the state record (temp file + rename).
pub fn write_state(path: &Path, state: &LauncherState) -> Result<()> {
    debug!(path = %path.display(), ?state, "writing state record");
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace state {}", path.display()))?;
    Ok(())
}
