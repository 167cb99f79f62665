//! Git adapter for working-copy updates.
//!
//! The launcher only compares revision ids and pulls; it never inspects the
//! content it updates. We keep a small, explicit wrapper around `git`
//! subprocess calls.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, warn};

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file.
    pub path: String,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// True when the directory is inside a git work tree.
    ///
    /// A missing `git` binary or any failure just means "not a work tree"
    /// here; the updaters degrade to skipping, never to aborting the launch.
    pub fn is_work_tree(&self) -> bool {
        let result = Command::new("git")
            .args(["rev-parse", "--is-inside-work-tree"])
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .output();
        match result {
            Ok(output) => {
                output.status.success()
                    && String::from_utf8_lossy(&output.stdout).trim() == "true"
            }
            Err(err) => {
                debug!(err = %err, "git unavailable; treating directory as unversioned");
                false
            }
        }
    }

    /// Return the current branch name (errors on detached HEAD).
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Err(anyhow!("detached HEAD (no branch to update)"));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    /// Fetch the tracked remote. Network failure surfaces as `Err`.
    pub fn fetch(&self) -> Result<()> {
        self.run_checked(&["fetch", "--quiet"])?;
        Ok(())
    }

    /// Commit id of the local head.
    pub fn head_commit(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    /// Commit id of the upstream head, or `None` when the branch tracks
    /// nothing.
    pub fn upstream_commit(&self) -> Result<Option<String>> {
        let output = self.run(&["rev-parse", "@{u}"])?;
        if !output.status.success() {
            debug!(
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "no upstream revision"
            );
            return Ok(None);
        }
        Ok(Some(
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        ))
    }

    /// Get status entries (including untracked) in porcelain format.
    pub fn status_porcelain(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run_capture(&["status", "--porcelain=v1", "-uall"])?;
        let mut entries = Vec::new();
        for line in out.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(parse_status_line(line)?);
        }
        Ok(entries)
    }

    /// True when the worktree has tracked modifications worth stashing.
    pub fn has_local_modifications(&self) -> Result<bool> {
        Ok(self
            .status_porcelain()?
            .iter()
            .any(|entry| entry.code != "??"))
    }

    /// Stash uncommitted modifications before a pull.
    pub fn stash_push(&self, message: &str) -> Result<()> {
        self.run_checked(&["stash", "push", "-m", message])?;
        Ok(())
    }

    /// Pull the tracked branch.
    pub fn pull(&self) -> Result<()> {
        self.run_checked(&["pull", "--quiet"])?;
        Ok(())
    }

    /// Paths changed between two revisions.
    pub fn changed_paths(&self, old: &str, new: &str) -> Result<Vec<String>> {
        let out = self.run_capture(&["diff", "--name-only", old, new])?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

fn parse_status_line(line: &str) -> Result<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Ok(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    if line.len() < 4 {
        return Err(anyhow!("unexpected porcelain line: '{line}'"));
    }
    let code = line[..2].to_string();
    let mut path = line[3..].trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Ok(StatusEntry { code, path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_untracked_line() {
        let e = parse_status_line("?? foo.txt").expect("parse");
        assert_eq!(
            e,
            StatusEntry {
                code: "??".to_string(),
                path: "foo.txt".to_string()
            }
        );
    }

    #[test]
    fn parses_modified_line() {
        let e = parse_status_line(" M run.sh").expect("parse");
        assert_eq!(
            e,
            StatusEntry {
                code: " M".to_string(),
                path: "run.sh".to_string()
            }
        );
    }

    #[test]
    fn parses_rename_line_uses_new_path() {
        let e = parse_status_line("R  old.txt -> new.txt").expect("parse");
        assert_eq!(e.path, "new.txt");
    }

    #[test]
    fn unversioned_directory_is_not_a_work_tree() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = Git::new(temp.path());
        assert!(!git.is_work_tree());
    }
}
