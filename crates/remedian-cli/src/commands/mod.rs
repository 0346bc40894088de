//! CLI command flows.
//!
//! Each command is a blocking pipeline returning a process exit code per
//! the run-outcome contract: 0 clean, 1 failed, 2 actionable-but-handled.

use std::path::Path;

use clap::ValueEnum;
use remedian_core::detect::ScannerPreference;
use remedian_core::store::ReportStore;
use remedian_core::ProposalError;

pub mod dast;
pub mod fix;
pub mod report;
pub mod scan;

/// Scanner selection exposed on the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScannerChoice {
    Primary,
    Secondary,
    Either,
}

impl From<ScannerChoice> for ScannerPreference {
    fn from(choice: ScannerChoice) -> Self {
        match choice {
            ScannerChoice::Primary => Self::Primary,
            ScannerChoice::Secondary => Self::Secondary,
            ScannerChoice::Either => Self::Either,
        }
    }
}

/// Report store rooted inside the target repository.
pub(crate) fn report_store(repo: &Path) -> ReportStore {
    ReportStore::new(repo.join(".remedian").join("reports"))
}

/// Actionable hint for a classified proposal failure.
pub(crate) fn proposal_hint(err: &ProposalError) -> &'static str {
    match err {
        ProposalError::Conflict(_) => {
            "a change request for this branch already exists; update or close it before re-running"
        },
        ProposalError::Auth(_) => "refresh code-host credentials (`gh auth login`) and re-run",
        ProposalError::NotFound(_) => "check the repository remote and your access to it",
        ProposalError::Push(_) => "verify the `origin` remote accepts pushes, then re-push the branch",
        ProposalError::Other(_) => "inspect the reported error and retry manually",
    }
}
