//! Git integration module
//!
//! Version control steps used by the release workflow: working tree status,
//! commit, annotated tag and push.

use std::path::Path;
use std::process::{Command, Output};

use crate::error::{BuildError, Result};

/// Git working tree status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitStatus {
    pub branch: String,
    pub staged_count: usize,
    pub unstaged_count: usize,
    pub untracked_count: usize,
}

impl GitStatus {
    pub fn is_clean(&self) -> bool {
        self.staged_count == 0 && self.unstaged_count == 0 && self.untracked_count == 0
    }
}

fn git(project_dir: &Path, args: &[&str]) -> Result<Output> {
    Command::new("git")
        .args(args)
        .current_dir(project_dir)
        .output()
        .map_err(|e| BuildError::Vcs(format!("failed to run git {}: {}", args.join(" "), e)))
}

/// Run git and fail with its stderr on a non-zero exit
fn git_checked(project_dir: &Path, args: &[&str]) -> Result<String> {
    let output = git(project_dir, args)?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        Err(BuildError::Vcs(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

/// Parse `git status --porcelain` output into counts
pub fn parse_porcelain(status: &str) -> (usize, usize, usize) {
    let mut staged_count = 0;
    let mut unstaged_count = 0;
    let mut untracked_count = 0;

    for line in status.lines() {
        if line.len() < 2 {
            continue;
        }
        if line.starts_with("??") {
            untracked_count += 1;
            continue;
        }
        let mut chars = line.chars();
        let first = chars.next().unwrap_or(' ');
        let second = chars.next().unwrap_or(' ');
        // First character is index status, second is working tree status
        if first != ' ' {
            staged_count += 1;
        }
        if second != ' ' {
            unstaged_count += 1;
        }
    }

    (staged_count, unstaged_count, untracked_count)
}

/// Get git status for a project directory
pub fn get_status(project_dir: &Path) -> Result<GitStatus> {
    let branch = git_checked(project_dir, &["rev-parse", "--abbrev-ref", "HEAD"])
        .map(|b| b.trim().to_string())
        .unwrap_or_default();

    let porcelain = git_checked(project_dir, &["status", "--porcelain"])?;
    let (staged_count, unstaged_count, untracked_count) = parse_porcelain(&porcelain);

    Ok(GitStatus {
        branch,
        staged_count,
        unstaged_count,
        untracked_count,
    })
}

/// Stage `paths` (everything when empty) and commit
pub fn commit(project_dir: &Path, message: &str, paths: &[&str]) -> Result<()> {
    if paths.is_empty() {
        git_checked(project_dir, &["add", "-A"])?;
    } else {
        let mut args = vec!["add", "--"];
        args.extend_from_slice(paths);
        git_checked(project_dir, &args)?;
    }
    git_checked(project_dir, &["commit", "-m", message])?;
    Ok(())
}

pub fn tag_exists(project_dir: &Path, tag: &str) -> Result<bool> {
    let output = git_checked(project_dir, &["tag", "--list", tag])?;
    Ok(output.lines().any(|l| l.trim() == tag))
}

/// Create an annotated tag on HEAD
pub fn create_tag(project_dir: &Path, tag: &str, message: &str) -> Result<()> {
    git_checked(project_dir, &["tag", "-a", tag, "-m", message])?;
    Ok(())
}

/// Push the current branch, then tags
pub fn push_with_tags(project_dir: &Path) -> Result<()> {
    git_checked(project_dir, &["push"])?;
    git_checked(project_dir, &["push", "--tags"])?;
    Ok(())
}
