//! Proposal publisher: branch push plus change-request creation.
//!
//! A push failure aborts proposal creation for that item. Label and
//! assignee application are best-effort; the proposal already exists if
//! they fail, so failures are logged and swallowed.

use remedian_core::prioritize::Diagnosis;
use remedian_core::remediate::FixAttempt;
use remedian_core::{ProposalError, ScanReport};

use crate::github::{CodeHost, ProposalRef};

/// Fixed path the advisory document is written to inside the target
/// repository.
pub const ADVISORY_PATH: &str = "SECURITY_ADVISORY.md";

/// Everything needed to open one change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalSpec {
    pub branch: String,
    pub base: String,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignee: Option<String>,
}

/// Title/body/labels for a committed fix attempt.
pub fn fix_proposal_spec(
    attempt: &FixAttempt,
    diagnosis: &Diagnosis,
    base: String,
    assignee: Option<String>,
) -> ProposalSpec {
    let title = format!(
        "fix({}): upgrade {} to {}",
        attempt.package, attempt.prior_version, attempt.new_version
    );
    let body = format!(
        "## Automated remediation\n\n\
         | | |\n|---|---|\n\
         | Finding | {} |\n\
         | Severity | {} |\n\
         | Package | `{}` |\n\
         | Previous version | `{}` |\n\
         | Remediated version | `{}` |\n\n\
         {}\n\n\
         The dependency manifest was patched on an isolated branch, the \
         installer regenerated the lock file, and the test suite passed \
         before this change was committed.\n",
        diagnosis.finding_id,
        diagnosis.severity,
        attempt.package,
        attempt.prior_version,
        attempt.new_version,
        diagnosis.summary,
    );
    ProposalSpec {
        branch: attempt.branch.clone(),
        base,
        title,
        body,
        labels: vec!["security".to_string(), "automated-remediation".to_string()],
        assignee,
    }
}

/// Push the branch, open the change request, then apply labels and
/// assignee best-effort.
pub fn publish(
    host: &dyn CodeHost,
    push: impl FnOnce(&str) -> Result<(), String>,
    spec: &ProposalSpec,
) -> Result<ProposalRef, ProposalError> {
    push(&spec.branch).map_err(ProposalError::Push)?;

    let proposal = host.create_proposal(&spec.branch, &spec.base, &spec.title, &spec.body)?;

    if let Err(err) = host.add_labels(proposal.id, &spec.labels) {
        eprintln!("WARNING: failed to apply labels to proposal #{}: {err}", proposal.id);
    }
    if let Some(assignee) = &spec.assignee {
        if let Err(err) = host.add_assignee(proposal.id, assignee) {
            eprintln!(
                "WARNING: failed to assign {assignee} to proposal #{}: {err}",
                proposal.id
            );
        }
    }
    Ok(proposal)
}

/// Deterministically unique advisory branch for one run.
pub fn advisory_branch_name(timestamp: &str) -> String {
    let sanitized: String = timestamp
        .chars()
        .map(|ch| if ch == ':' { '-' } else { ch })
        .collect();
    format!("security-advisory/{sanitized}")
}

/// Title/body/labels for an advisory change request. The branch carries
/// the committed advisory document; the body points reviewers at it.
pub fn advisory_proposal_spec(
    report: &ScanReport,
    base: String,
    assignee: Option<String>,
) -> ProposalSpec {
    ProposalSpec {
        branch: advisory_branch_name(&report.timestamp),
        base,
        title: format!(
            "Security advisory: {} infrastructure finding{}",
            report.summary.total,
            if report.summary.total == 1 { "" } else { "s" }
        ),
        body: advisory_proposal_body(report),
        labels: vec!["security".to_string(), "advisory".to_string()],
        assignee,
    }
}

fn advisory_proposal_body(report: &ScanReport) -> String {
    format!(
        "Automated infrastructure scan from {} found {} issue(s): \
         {} critical, {} high, {} medium, {} low.\n\n\
         The full advisory with per-finding remediation guidance is in \
         `{ADVISORY_PATH}` on this branch. Nothing was auto-patched; every \
         step in the advisory is a manual action.\n",
        report.timestamp,
        report.summary.total,
        report.summary.critical,
        report.summary.high,
        report.summary.medium,
        report.summary.low,
    )
}
