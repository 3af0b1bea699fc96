//! Restoring source trees to their committed state
//!
//! Global invariants enforced:
//! - A failed checkout is always an error, never a warning
//! - Only tracked files below the given directory are touched
//!
//! Uses git CLI directly (no libgit2) for portability.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Execute a git command in a specific directory and return the trimmed stdout
fn git_at(repo_path: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .current_dir(repo_path)
        .args(args)
        .output()
        .context("failed to invoke git")?;

    if !output.status.success() {
        anyhow::bail!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// True if `path` lies inside a git work tree
pub fn is_git_repo(path: &Path) -> bool {
    git_at(path, &["rev-parse", "--is-inside-work-tree"]).is_ok_and(|out| out == "true")
}

/// Walk up from `start_path` to the first directory holding `.git`
pub fn find_repo_root(start_path: &Path) -> Result<PathBuf> {
    let mut current = if start_path.is_file() {
        start_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("invalid file path"))?
            .to_path_buf()
    } else {
        start_path.to_path_buf()
    };

    loop {
        if current.join(".git").exists() {
            return Ok(current);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => anyhow::bail!("not in a git repository (no .git directory found)"),
        }
    }
}

/// Discard working-tree changes to tracked files below `dir`
///
/// Equivalent to running `git checkout -- .` inside `dir`. Untracked files
/// are left alone.
///
/// # Errors
///
/// Returns error if `dir` is not a directory inside a git work tree, or if
/// git reports a failure.
pub fn checkout_path(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("checkout target is not a directory: {}", dir.display());
    }
    if !is_git_repo(dir) {
        anyhow::bail!("not in a git repository at {}", dir.display());
    }

    git_at(dir, &["checkout", "--", "."])
        .with_context(|| format!("failed to restore {}", dir.display()))?;

    tracing::info!(path = %dir.display(), "restored committed state");
    Ok(())
}
