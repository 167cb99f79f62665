//! Working-copy update coordinators.
//!
//! The launcher keeps two working copies in sync: its own install directory
//! (which may force a restart when the entry script itself changed) and an
//! optional managed project. Both share one fetch/compare/pull routine in
//! which every failure degrades to "skip update and continue"; an offline
//! machine must still reach the GUI.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::core::sync::{RepoRevisions, SyncDecision, decide_sync, entry_point_changed};
use crate::io::config::ManagedProjectConfig;
use crate::io::git::Git;

/// Result of syncing one working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Directory is not under version control.
    NotAWorkTree,
    /// Fetch failed (network down, remote unreachable); update skipped.
    FetchFailed,
    /// Local or remote revision could not be determined; update skipped.
    RevisionsUnknown,
    /// Local and remote heads already match.
    UpToDate,
    /// Heads diverged but the pull failed; continuing on existing code.
    PullFailed,
    /// Pull succeeded; the changed paths between old and new head.
    Pulled { changed_paths: Vec<String> },
}

/// Outcome of the self-update pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfUpdateReport {
    pub outcome: SyncOutcome,
    /// The entry script changed; the supervisor must re-run the bootstrap.
    pub restart_required: bool,
}

/// Outcome of the managed-project pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectUpdateOutcome {
    Disabled,
    DirectoryMissing,
    Synced(SyncOutcome),
}

/// Synchronize the launcher's own working copy.
///
/// Never aborts the launch: a failed fetch or pull leaves the existing code
/// in place. When the pull rewrote the configured entry script, it is marked
/// executable again and a restart is reported so the fresh code handles the
/// rest of the run.
pub fn update_self(install_dir: &Path, entry_point: &str) -> SelfUpdateReport {
    let git = Git::new(install_dir);
    if !git.is_work_tree() {
        info!("install directory is not under version control; skipping self-update");
        return SelfUpdateReport {
            outcome: SyncOutcome::NotAWorkTree,
            restart_required: false,
        };
    }

    let outcome = sync_working_copy(&git, "launcher");
    let restart_required = match &outcome {
        SyncOutcome::Pulled { changed_paths } if entry_point_changed(changed_paths, entry_point) => {
            let path = install_dir.join(entry_point);
            if let Err(err) = mark_executable(&path) {
                warn!(path = %path.display(), err = %err, "could not restore executable bit");
            }
            info!(entry_point, "entry script changed; restart required");
            true
        }
        _ => false,
    };

    SelfUpdateReport {
        outcome,
        restart_required,
    }
}

/// Synchronize the managed project's working copy, if enabled and present.
///
/// A missing directory is not an error: installation happens later through
/// an external collaborator. Only the launcher's own entry script can force
/// a restart, so this never does.
pub fn update_managed_project(install_dir: &Path, config: &ManagedProjectConfig) -> ProjectUpdateOutcome {
    if !config.enabled {
        debug!("managed project updates disabled");
        return ProjectUpdateOutcome::Disabled;
    }

    let project_dir = install_dir.join(&config.dir);
    if !project_dir.is_dir() {
        debug!(dir = %project_dir.display(), "managed project not present; skipping");
        return ProjectUpdateOutcome::DirectoryMissing;
    }

    let git = Git::new(&project_dir);
    if !git.is_work_tree() {
        warn!(
            dir = %project_dir.display(),
            "managed project directory exists but is not under version control; skipping"
        );
        return ProjectUpdateOutcome::Synced(SyncOutcome::NotAWorkTree);
    }

    ProjectUpdateOutcome::Synced(sync_working_copy(&git, "managed project"))
}

/// Shared fetch/compare/pull routine.
fn sync_working_copy(git: &Git, label: &str) -> SyncOutcome {
    if let Err(err) = git.fetch() {
        warn!(label, err = %err, "fetch failed; skipping update");
        return SyncOutcome::FetchFailed;
    }

    let revisions = read_revisions(git, label);
    match decide_sync(revisions.local.as_deref(), revisions.remote.as_deref()) {
        SyncDecision::UpToDate => {
            info!(label, branch = %revisions.branch, "already up to date");
            SyncOutcome::UpToDate
        }
        SyncDecision::Indeterminate => {
            warn!(label, "could not determine revisions; skipping update");
            SyncOutcome::RevisionsUnknown
        }
        SyncDecision::Diverged => pull_diverged(git, label, &revisions),
    }
}

fn read_revisions(git: &Git, label: &str) -> RepoRevisions {
    let branch = match git.current_branch() {
        Ok(branch) => branch,
        Err(err) => {
            debug!(label, err = %err, "no current branch");
            String::new()
        }
    };
    let local = match git.head_commit() {
        Ok(commit) => Some(commit),
        Err(err) => {
            warn!(label, err = %err, "could not read local revision");
            None
        }
    };
    let remote = match git.upstream_commit() {
        Ok(commit) => commit,
        Err(err) => {
            warn!(label, err = %err, "could not read upstream revision");
            None
        }
    };
    RepoRevisions {
        branch,
        local,
        remote,
    }
}

fn pull_diverged(git: &Git, label: &str, revisions: &RepoRevisions) -> SyncOutcome {
    info!(
        label,
        branch = %revisions.branch,
        local = revisions.local.as_deref().unwrap_or_default(),
        remote = revisions.remote.as_deref().unwrap_or_default(),
        "update available; pulling"
    );

    // Stash only when something is actually modified, so a clean tree never
    // fails the run over having nothing to stash.
    match git.has_local_modifications() {
        Ok(true) => {
            if let Err(err) = git.stash_push("launcher auto-stash before update") {
                warn!(label, err = %err, "stash failed; pulling anyway");
            }
        }
        Ok(false) => {}
        Err(err) => {
            warn!(label, err = %err, "could not inspect worktree status");
        }
    }

    if let Err(err) = git.pull() {
        warn!(label, err = %err, "pull failed; continuing with existing code");
        return SyncOutcome::PullFailed;
    }

    let old = revisions.local.as_deref().unwrap_or_default();
    let changed_paths = match git.head_commit() {
        Ok(new_head) => git.changed_paths(old, &new_head).unwrap_or_else(|err| {
            warn!(label, err = %err, "could not diff changed paths");
            Vec::new()
        }),
        Err(err) => {
            warn!(label, err = %err, "could not read new head after pull");
            Vec::new()
        }
    };

    info!(label, changed = changed_paths.len(), "pull complete");
    SyncOutcome::Pulled { changed_paths }
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::GitFixture;

    #[test]
    fn unversioned_directory_skips_self_update() {
        let temp = tempfile::tempdir().expect("tempdir");
        let report = update_self(temp.path(), "run.sh");
        assert_eq!(report.outcome, SyncOutcome::NotAWorkTree);
        assert!(!report.restart_required);
    }

    #[test]
    fn clean_clone_is_up_to_date() {
        let fixture = GitFixture::new().expect("fixture");
        let report = update_self(fixture.clone_dir(), "run.sh");
        assert_eq!(report.outcome, SyncOutcome::UpToDate);
        assert!(!report.restart_required);
    }

    #[test]
    fn diverged_clone_pulls_without_restart_for_other_files() {
        let fixture = GitFixture::new().expect("fixture");
        fixture
            .commit_upstream("README.md", "updated docs\n", "docs update")
            .expect("commit");

        let report = update_self(fixture.clone_dir(), "run.sh");

        match report.outcome {
            SyncOutcome::Pulled { ref changed_paths } => {
                assert_eq!(changed_paths, &["README.md".to_string()]);
            }
            ref other => panic!("expected Pulled, got {other:?}"),
        }
        assert!(!report.restart_required);
        let contents =
            std::fs::read_to_string(fixture.clone_dir().join("README.md")).expect("read");
        assert_eq!(contents, "updated docs\n");
    }

    #[test]
    fn entry_script_change_requires_restart_and_executable_bit() {
        let fixture = GitFixture::new().expect("fixture");
        fixture
            .commit_upstream("run.sh", "#!/bin/sh\necho v2\n", "new entry script")
            .expect("commit");

        let report = update_self(fixture.clone_dir(), "run.sh");

        assert!(report.restart_required);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(fixture.clone_dir().join("run.sh"))
                .expect("metadata")
                .permissions()
                .mode();
            assert_eq!(mode & 0o100, 0o100, "owner-executable bit restored");
        }
    }

    #[test]
    fn local_modifications_are_stashed_before_pull() {
        let fixture = GitFixture::new().expect("fixture");
        std::fs::write(fixture.clone_dir().join("README.md"), "local edit\n").expect("write");
        fixture
            .commit_upstream("README.md", "upstream edit\n", "upstream change")
            .expect("commit");

        let report = update_self(fixture.clone_dir(), "run.sh");

        assert!(matches!(report.outcome, SyncOutcome::Pulled { .. }));
        let contents =
            std::fs::read_to_string(fixture.clone_dir().join("README.md")).expect("read");
        assert_eq!(contents, "upstream edit\n");
    }

    #[test]
    fn disabled_managed_project_is_skipped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = ManagedProjectConfig {
            enabled: false,
            dir: "nvr".to_string(),
        };
        assert_eq!(
            update_managed_project(temp.path(), &config),
            ProjectUpdateOutcome::Disabled
        );
    }

    #[test]
    fn missing_managed_project_directory_is_skipped_silently() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = ManagedProjectConfig::default();
        assert_eq!(
            update_managed_project(temp.path(), &config),
            ProjectUpdateOutcome::DirectoryMissing
        );
    }

    #[test]
    fn unversioned_managed_project_directory_warns_and_skips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = ManagedProjectConfig::default();
        std::fs::create_dir_all(temp.path().join(&config.dir)).expect("mkdir");

        assert_eq!(
            update_managed_project(temp.path(), &config),
            ProjectUpdateOutcome::Synced(SyncOutcome::NotAWorkTree)
        );
    }

    #[test]
    fn managed_project_pulls_upstream_changes() {
        let fixture = GitFixture::new().expect("fixture");
        let temp = tempfile::tempdir().expect("tempdir");
        let config = ManagedProjectConfig {
            enabled: true,
            dir: "nvr".to_string(),
        };
        fixture
            .clone_into(&temp.path().join("nvr"))
            .expect("clone managed project");
        fixture
            .commit_upstream("config.yml", "cameras: []\n", "seed config")
            .expect("commit");

        let outcome = update_managed_project(temp.path(), &config);

        match outcome {
            ProjectUpdateOutcome::Synced(SyncOutcome::Pulled { changed_paths }) => {
                assert_eq!(changed_paths, vec!["config.yml".to_string()]);
            }
            other => panic!("expected Pulled, got {other:?}"),
        }
    }
}
