//! Remediation engine: isolated patch-and-verify for one diagnosis.
//!
//! State machine: `Idle -> BranchReady -> Patched -> Verifying ->
//! {Committed | RolledBack}`. The engine owns exactly one attempt per
//! run; its durable trace is the git branch it produced, or nothing if
//! rolled back. The "revert everything" rollback (hard revert + clean of
//! untracked files) is safe only because each attempt gets a fresh,
//! single-purpose branch before patching: one branch, one attempt, one
//! patch.

use std::path::PathBuf;

use crate::error::{ManifestError, RemediateError};
use crate::manifest::Manifest;
use crate::prioritize::{Diagnosis, RemediationAction};

/// Version-control capability surface. The engine never issues raw
/// version-control commands; collaborators implement these five
/// operations.
pub trait Vcs {
    fn branch_exists(&self, name: &str) -> Result<bool, String>;
    /// Switch to the branch, creating it when missing.
    fn checkout(&self, name: &str) -> Result<(), String>;
    fn stage_all(&self) -> Result<(), String>;
    fn commit(&self, message: &str) -> Result<(), String>;
    /// Discard all working-tree changes, tracked and untracked.
    fn revert_all(&self) -> Result<(), String>;
}

/// Install-and-test collaborator run during verification. Timeouts are
/// the implementor's concern and surface as plain failures here, which
/// route to rollback.
pub trait Verifier {
    fn install(&self) -> Result<(), String>;
    fn run_tests(&self) -> Result<(), String>;
}

/// Position of one fix attempt in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixState {
    Idle,
    BranchReady,
    Patched,
    Verifying,
    Committed,
    RolledBack,
}

/// The engine's working state for one diagnosis; discarded after the
/// run.
#[derive(Debug, Clone, PartialEq)]
pub struct FixAttempt {
    pub package: String,
    pub prior_version: String,
    pub new_version: String,
    pub branch: String,
    pub state: FixState,
}

/// Deterministic branch name for a remediation target. Two attempts for
/// the same package land on the same branch.
pub fn branch_name_for(package: &str) -> String {
    format!("remediate/{}", sanitize_ref_component(package))
}

fn sanitize_ref_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_dash = false;
    for ch in raw.trim().to_ascii_lowercase().chars() {
        let mapped = if ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' {
            Some(ch)
        } else if ch == '-' || ch == '/' || ch == '@' || ch.is_whitespace() {
            Some('-')
        } else {
            None
        };
        match mapped {
            Some('-') if last_dash => {},
            Some('-') => {
                out.push('-');
                last_dash = true;
            },
            Some(ch) => {
                out.push(ch);
                last_dash = false;
            },
            None => {},
        }
    }
    out.trim_matches('-').to_string()
}

/// One-shot remediation engine over a manifest and two collaborator
/// seams.
pub struct Remediator<'a> {
    vcs: &'a dyn Vcs,
    verifier: &'a dyn Verifier,
    manifest_path: PathBuf,
}

impl<'a> Remediator<'a> {
    pub fn new(vcs: &'a dyn Vcs, verifier: &'a dyn Verifier, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            vcs,
            verifier,
            manifest_path: manifest_path.into(),
        }
    }

    /// Attempt the fix described by one diagnosis. At most one fix is
    /// attempted per run, and no attempt reaches `Committed` without
    /// tests passing in that same attempt.
    pub fn attempt_fix(&self, diagnosis: &Diagnosis) -> Result<FixAttempt, RemediateError> {
        let RemediationAction::UpgradeDependency { package, from, to } = &diagnosis.action else {
            return Err(RemediateError::Unpatchable(format!(
                "finding {} carries a manual-only remediation",
                diagnosis.finding_id
            )));
        };

        let branch = branch_name_for(package);
        let mut attempt = FixAttempt {
            package: package.clone(),
            prior_version: from.clone(),
            new_version: to.clone(),
            branch: branch.clone(),
            state: FixState::Idle,
        };

        // Idle -> BranchReady. Reusing an existing branch of the same
        // name is the idempotent path, not an error.
        if self.vcs.branch_exists(&branch).map_err(RemediateError::Vcs)? {
            tracing::info!(branch = branch.as_str(), "reusing existing remediation branch");
        }
        self.vcs.checkout(&branch).map_err(RemediateError::Vcs)?;
        attempt.state = FixState::BranchReady;

        // BranchReady -> Patched.
        let mut manifest = Manifest::load(&self.manifest_path)?;
        let Some(declared) = manifest.declared_version(package).map(str::to_string) else {
            return Err(RemediateError::Unpatchable(format!(
                "package `{package}` is not a direct dependency \
                 (transitive-only occurrences are unsupported)"
            )));
        };
        attempt.prior_version = declared;
        manifest.set_version(package, to).map_err(|err| match err {
            ManifestError::NotADirectDependency { package } => RemediateError::Unpatchable(
                format!("package `{package}` is not a direct dependency"),
            ),
            other => RemediateError::Manifest(other),
        })?;
        manifest.save()?;
        attempt.state = FixState::Patched;
        tracing::info!(
            package = package.as_str(),
            from = attempt.prior_version.as_str(),
            to = to.as_str(),
            "manifest patched"
        );

        // Patched -> Verifying. Everything from here to the commit rolls
        // back on failure; no half-patched state survives.
        attempt.state = FixState::Verifying;
        if let Err(detail) = self.verifier.install() {
            return self.roll_back(attempt, "install", detail);
        }
        if let Err(detail) = self.verifier.run_tests() {
            return self.roll_back(attempt, "tests", detail);
        }

        // Verifying -> Committed.
        let message = format!(
            "fix({package}): upgrade {} to {to} (finding {})",
            attempt.prior_version, diagnosis.finding_id
        );
        if let Err(detail) = self
            .vcs
            .stage_all()
            .and_then(|()| self.vcs.commit(&message))
        {
            return self.roll_back(attempt, "commit", detail);
        }
        attempt.state = FixState::Committed;
        tracing::info!(branch = branch.as_str(), "fix committed");
        Ok(attempt)
    }

    /// Verifying -> RolledBack. The branch is left behind carrying no
    /// uncommitted changes.
    fn roll_back(
        &self,
        mut attempt: FixAttempt,
        stage: &'static str,
        detail: String,
    ) -> Result<FixAttempt, RemediateError> {
        tracing::warn!(stage, detail = detail.as_str(), "verification failed, rolling back");
        if let Err(revert_err) = self.vcs.revert_all() {
            return Err(RemediateError::Vcs(format!(
                "rollback after failed {stage} also failed: {revert_err} \
                 (original failure: {detail})"
            )));
        }
        attempt.state = FixState::RolledBack;
        Err(RemediateError::VerificationFailed { stage, detail })
    }
}
