//! Git collaborator implementing the core's version-control capability
//! surface by shelling out to the `git` binary.

use std::path::{Path, PathBuf};
use std::process::Command;

use remedian_core::remediate::Vcs;

#[derive(Debug, Clone)]
pub struct GitCli {
    repo_dir: PathBuf,
}

impl GitCli {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    fn git(&self, args: &[&str]) -> Result<String, String> {
        tracing::debug!(command = args.join(" "), "running git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .map_err(|err| format!("failed to execute git {}: {err}", args.join(" ")))?;
        if !output.status.success() {
            return Err(format!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn current_branch(&self) -> Result<String, String> {
        let branch = self.git(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        if branch.is_empty() || branch == "HEAD" {
            return Err("repository is on a detached HEAD".to_string());
        }
        Ok(branch)
    }

    /// Default branch from `origin/HEAD`, falling back to `main`.
    pub fn default_branch(&self) -> String {
        self.git(&["symbolic-ref", "--short", "refs/remotes/origin/HEAD"])
            .ok()
            .and_then(|full| full.strip_prefix("origin/").map(str::to_string))
            .unwrap_or_else(|| "main".to_string())
    }

    pub fn push(&self, branch: &str) -> Result<(), String> {
        self.git(&["push", "--set-upstream", "origin", branch])
            .map(|_| ())
    }
}

impl Vcs for GitCli {
    fn branch_exists(&self, name: &str) -> Result<bool, String> {
        let reference = format!("refs/heads/{name}");
        let status = Command::new("git")
            .args(["rev-parse", "--verify", "--quiet", &reference])
            .current_dir(&self.repo_dir)
            .status()
            .map_err(|err| format!("failed to execute git rev-parse: {err}"))?;
        Ok(status.success())
    }

    fn checkout(&self, name: &str) -> Result<(), String> {
        if self.branch_exists(name)? {
            self.git(&["checkout", name]).map(|_| ())
        } else {
            self.git(&["checkout", "-b", name]).map(|_| ())
        }
    }

    fn stage_all(&self) -> Result<(), String> {
        self.git(&["add", "-A"]).map(|_| ())
    }

    fn commit(&self, message: &str) -> Result<(), String> {
        self.git(&["commit", "-m", message]).map(|_| ())
    }

    fn revert_all(&self) -> Result<(), String> {
        self.git(&["reset", "--hard", "HEAD"])?;
        self.git(&["clean", "-fd"]).map(|_| ())
    }
}
