//! Error taxonomy for the remediation pipeline.
//!
//! The split mirrors the propagation policy: transient scan failures are
//! retried locally, fatal ones are not; unpatchable and verification
//! failures abort the fix attempt but never the run; proposal failures
//! carry the remote's classification so the caller can give an
//! actionable hint without blind retries.

use thiserror::Error;

/// A single scanner invocation failure, classified for the retry policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Retry-eligible: network unreachable, timeout, kill signal.
    #[error("transient scan failure: {0}")]
    Transient(String),

    /// Not retried: tool missing, unparseable output.
    #[error("fatal scan failure: {0}")]
    Fatal(String),
}

impl ScanError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Transient(detail) | Self::Fatal(detail) => detail,
        }
    }
}

/// Schema-validation failures for scan reports.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReportError {
    #[error("scan report has no timestamp")]
    MissingTimestamp,

    #[error("finding at index {index} has no identifier")]
    MissingFindingId { index: usize },

    #[error("finding {finding_id} has risk score {score} outside 0..=10")]
    RiskScoreOutOfRange { finding_id: String, score: f64 },

    /// Aggregate counts disagreeing with the finding list is a producer
    /// bug, never a valid report.
    #[error("summary count `{field}` is {actual}, expected {expected}")]
    SummaryMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Failures of the fallback detector as a whole.
#[derive(Debug, Error)]
pub enum DetectError {
    /// Primary exhausted its retries and the fallback also failed.
    #[error("all scanners failed; {primary_name}: {primary}; {secondary_name}: {secondary}")]
    AllScannersFailed {
        primary_name: String,
        primary: String,
        secondary_name: String,
        secondary: String,
    },

    /// The selected scanner failed with no fallback configured.
    #[error("scanner `{scanner}` failed: {detail}")]
    ScannerFailed { scanner: String, detail: String },

    /// A scanner produced a report that failed schema validation; such a
    /// report is never returned to the caller.
    #[error("scan report failed validation: {0}")]
    InvalidReport(#[from] ReportError),

    #[error("failed to persist scan report: {0}")]
    Store(#[from] StoreError),
}

/// Failures while rewriting the dependency manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {detail}")]
    Read { path: String, detail: String },

    #[error("failed to parse manifest {path}: {detail}")]
    Parse { path: String, detail: String },

    #[error("manifest {path} is not a JSON object")]
    NotAnObject { path: String },

    /// The package is not declared in any direct dependency section.
    /// Transitive-only occurrences are unsupported by design.
    #[error("package `{package}` is not a direct dependency")]
    NotADirectDependency { package: String },

    #[error("failed to write manifest {path}: {detail}")]
    Write { path: String, detail: String },
}

/// Failures of one remediation attempt. `Unpatchable` and
/// `VerificationFailed` are reported as "no fix applied"; they never
/// crash the run.
#[derive(Debug, Error)]
pub enum RemediateError {
    /// The remediation target cannot be auto-patched (manual-only action
    /// or transitive dependency).
    #[error("finding cannot be auto-patched: {0}")]
    Unpatchable(String),

    /// Tests (or the installer) failed after patching; the working tree
    /// has been rolled back.
    #[error("verification failed during {stage}: {detail}")]
    VerificationFailed { stage: &'static str, detail: String },

    #[error("version control operation failed: {0}")]
    Vcs(String),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Distinguished code-host failures. Proposal creation is not
/// idempotent-safe to retry blindly, so the classification is surfaced
/// instead.
#[derive(Debug, Error)]
pub enum ProposalError {
    /// A proposal for this branch already exists (or the remote reported
    /// a duplicate/conflict).
    #[error("proposal conflicts with an existing change request: {0}")]
    Conflict(String),

    #[error("code host authentication invalid: {0}")]
    Auth(String),

    #[error("remote resource not found: {0}")]
    NotFound(String),

    /// Pushing the branch failed; proposal creation was not attempted.
    #[error("branch push failed: {0}")]
    Push(String),

    #[error("code host operation failed: {0}")]
    Other(String),
}

/// Report-store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("report failed validation before save: {0}")]
    Invalid(#[from] ReportError),

    #[error("store i/o failed at {path}: {detail}")]
    Io { path: String, detail: String },

    #[error("saved report at {path} did not re-parse: {detail}")]
    Reparse { path: String, detail: String },

    #[error("failed to acquire store lock at {path}: {detail}")]
    Lock { path: String, detail: String },
}

/// Workspace-guard failures.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to enter workspace {path}: {detail}")]
    Enter { path: String, detail: String },
}
