//! Pull decision for a tracked working copy.
//!
//! A pull happens only when local and remote revisions are both known,
//! well-formed, and different. A failed revision lookup must never be read
//! as "diverged"; the updater skips instead of guessing.

/// Revisions observed for a working copy after a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRevisions {
    /// Currently checked-out branch.
    pub branch: String,
    /// Commit id of the local head, if it could be read.
    pub local: Option<String>,
    /// Commit id of the upstream head, if the branch tracks one.
    pub remote: Option<String>,
}

/// What the updater should do with a working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// Local and remote heads match; nothing to do.
    UpToDate,
    /// Both heads are known and differ; pull.
    Diverged,
    /// One side is unknown or malformed; skip without pulling.
    Indeterminate,
}

/// True when `value` looks like a git object id (abbreviated or full).
pub fn is_revision_id(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.len() >= 7 && trimmed.chars().all(|ch| ch.is_ascii_hexdigit())
}

/// Decide whether a pull is warranted.
pub fn decide_sync(local: Option<&str>, remote: Option<&str>) -> SyncDecision {
    let (local, remote) = match (local, remote) {
        (Some(local), Some(remote)) => (local.trim(), remote.trim()),
        _ => return SyncDecision::Indeterminate,
    };
    if !is_revision_id(local) || !is_revision_id(remote) {
        return SyncDecision::Indeterminate;
    }
    if local == remote {
        SyncDecision::UpToDate
    } else {
        SyncDecision::Diverged
    }
}

/// True when the entry point is among the paths changed by a pull.
pub fn entry_point_changed(changed_paths: &[String], entry_point: &str) -> bool {
    changed_paths.iter().any(|path| path == entry_point)
}
