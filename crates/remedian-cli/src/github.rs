//! Code-host collaborator backed by the `gh` CLI.
//!
//! Remote failures are classified into the three actionable kinds the
//! pipeline distinguishes (conflict/duplicate, authentication invalid,
//! resource not found); anything else stays generic. Proposal creation
//! is never blindly retried.

use std::path::PathBuf;
use std::process::Command;

use remedian_core::ProposalError;

/// Reference to an opened change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalRef {
    pub id: u32,
    pub url: String,
}

/// Code-host capability surface used by the publisher.
pub trait CodeHost {
    fn create_proposal(
        &self,
        branch: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<ProposalRef, ProposalError>;
    fn add_labels(&self, id: u32, labels: &[String]) -> Result<(), ProposalError>;
    fn add_assignee(&self, id: u32, assignee: &str) -> Result<(), ProposalError>;
}

/// `gh`-backed implementation operating inside a repository clone.
#[derive(Debug, Clone)]
pub struct GhCli {
    repo_dir: PathBuf,
}

impl GhCli {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    fn gh(&self, args: &[&str]) -> Result<String, ProposalError> {
        let output = Command::new("gh")
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .map_err(|err| {
                ProposalError::Other(format!("failed to execute gh {}: {err}", args.join(" ")))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(classify_gh_failure(&stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl CodeHost for GhCli {
    fn create_proposal(
        &self,
        branch: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<ProposalRef, ProposalError> {
        let url = self.gh(&[
            "pr", "create", "--head", branch, "--base", base, "--title", title, "--body", body,
        ])?;
        let id = parse_pr_number(&url).ok_or_else(|| {
            ProposalError::Other(format!("could not parse PR number from gh output: {url}"))
        })?;
        Ok(ProposalRef { id, url })
    }

    fn add_labels(&self, id: u32, labels: &[String]) -> Result<(), ProposalError> {
        if labels.is_empty() {
            return Ok(());
        }
        let id = id.to_string();
        let joined = labels.join(",");
        self.gh(&["pr", "edit", &id, "--add-label", &joined]).map(|_| ())
    }

    fn add_assignee(&self, id: u32, assignee: &str) -> Result<(), ProposalError> {
        let id = id.to_string();
        self.gh(&["pr", "edit", &id, "--add-assignee", assignee]).map(|_| ())
    }
}

/// Map `gh` stderr onto the pipeline's proposal error kinds.
pub fn classify_gh_failure(stderr: &str) -> ProposalError {
    let normalized = stderr.to_ascii_lowercase();
    if normalized.contains("already exists")
        || normalized.contains("duplicate")
        || normalized.contains("422")
    {
        return ProposalError::Conflict(stderr.to_string());
    }
    if normalized.contains("401")
        || normalized.contains("authentication")
        || normalized.contains("auth login")
        || normalized.contains("bad credentials")
    {
        return ProposalError::Auth(stderr.to_string());
    }
    if normalized.contains("404")
        || normalized.contains("not found")
        || normalized.contains("could not resolve")
    {
        return ProposalError::NotFound(stderr.to_string());
    }
    ProposalError::Other(stderr.to_string())
}

/// PR URLs end in the PR number.
pub fn parse_pr_number(url: &str) -> Option<u32> {
    url.trim().rsplit('/').next().and_then(|tail| tail.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pr_number_is_the_url_tail() {
        assert_eq!(
            parse_pr_number("https://github.com/acme/app/pull/42"),
            Some(42)
        );
        assert_eq!(parse_pr_number("https://github.com/acme/app/pull/"), None);
        assert_eq!(parse_pr_number("nonsense"), None);
    }

    #[test]
    fn duplicate_branch_classifies_as_conflict() {
        let err = classify_gh_failure(
            "GraphQL: A pull request already exists for acme:remediate/lodash.",
        );
        assert!(matches!(err, ProposalError::Conflict(_)));
    }

    #[test]
    fn credential_failures_classify_as_auth() {
        let err = classify_gh_failure("HTTP 401: Bad credentials (https://api.github.com/...)");
        assert!(matches!(err, ProposalError::Auth(_)));
        let err = classify_gh_failure("To get started with GitHub CLI, please run: gh auth login");
        assert!(matches!(err, ProposalError::Auth(_)));
    }

    #[test]
    fn missing_repo_classifies_as_not_found() {
        let err = classify_gh_failure("GraphQL: Could not resolve to a Repository");
        assert!(matches!(err, ProposalError::NotFound(_)));
        let err = classify_gh_failure("HTTP 404: Not Found");
        assert!(matches!(err, ProposalError::NotFound(_)));
    }

    #[test]
    fn unrecognized_failures_stay_generic() {
        let err = classify_gh_failure("something exploded");
        assert!(matches!(err, ProposalError::Other(_)));
    }
}
