//! `remedian fix`: the SAST path end to end.
//!
//! Detect with fallback, prioritize, attempt one isolated test-verified
//! fix, and open a change request. Unpatchable targets and verification
//! failures are reported as "no fix applied"; they never crash the run.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use clap::Args;
use remedian_core::detect::{Detector, RetryPolicy};
use remedian_core::prioritize::{first_fixable, prioritize};
use remedian_core::remediate::{Remediator, Verifier};
use remedian_core::workspace::Workspace;
use remedian_core::{RemediateError, RunOutcome, ScanReport};

use super::{proposal_hint, report_store, ScannerChoice};
use crate::demo::load_demo_report;
use crate::git::GitCli;
use crate::github::GhCli;
use crate::publisher::{self, fix_proposal_spec};
use crate::scanners::npm_audit::NpmAuditScanner;
use crate::scanners::osv::OsvScanner;
use crate::scanners::process::run_with_timeout;

#[derive(Debug, Args)]
pub struct FixArgs {
    /// Target repository (the run operates inside it).
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Which dependency scanner leads the run.
    #[arg(long, value_enum, default_value_t = ScannerChoice::Either)]
    pub scanner: ScannerChoice,

    /// Substitute the bundled demonstration dataset when every scanner
    /// fails.
    #[arg(long)]
    pub demo: bool,

    /// Commit the fix locally without pushing or opening a change
    /// request.
    #[arg(long)]
    pub no_publish: bool,

    /// Assignee for the opened change request.
    #[arg(long)]
    pub assignee: Option<String>,

    /// Base branch for the change request (defaults to origin/HEAD).
    #[arg(long)]
    pub base: Option<String>,

    /// Transient-failure retries after the initial attempt.
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Base backoff delay in seconds (doubles per retry).
    #[arg(long, default_value_t = 2)]
    pub backoff_secs: u64,

    /// Timeout for one scanner invocation, in seconds.
    #[arg(long, default_value_t = 120)]
    pub scanner_timeout_secs: u64,

    /// Timeout for the dependency installer, in seconds.
    #[arg(long, default_value_t = 600)]
    pub install_timeout_secs: u64,

    /// Timeout for the test suite, in seconds.
    #[arg(long, default_value_t = 600)]
    pub test_timeout_secs: u64,
}

pub fn run(args: &FixArgs) -> u8 {
    // Scoped directory change; the caller's directory is restored on
    // every exit path.
    let _workspace = match Workspace::enter(&args.repo) {
        Ok(workspace) => workspace,
        Err(err) => {
            eprintln!("ERROR: {err}");
            return RunOutcome::Failed.exit_code();
        },
    };
    let here = Path::new(".");

    let Some(report) = detect_report(args, here) else {
        return RunOutcome::Failed.exit_code();
    };

    if report.findings.is_empty() {
        println!("clean: no findings");
        return RunOutcome::Clean.exit_code();
    }

    let ranked = prioritize(&report);
    let Some(target) = first_fixable(&ranked) else {
        // Findings exist, but none carries a remediated version.
        println!("clean: no auto-remediable findings among {}", ranked.len());
        return RunOutcome::Clean.exit_code();
    };
    eprintln!(
        "remedian fix: targeting {} ({}, {})",
        target.finding_id, target.severity, target.action
    );

    let git = GitCli::new(here);
    let verifier = NpmVerifier {
        repo_dir: here.to_path_buf(),
        install_timeout: Duration::from_secs(args.install_timeout_secs),
        test_timeout: Duration::from_secs(args.test_timeout_secs),
    };
    let engine = Remediator::new(&git, &verifier, here.join("package.json"));

    let attempt = match engine.attempt_fix(target) {
        Ok(attempt) => attempt,
        Err(err @ (RemediateError::Unpatchable(_) | RemediateError::VerificationFailed { .. })) => {
            eprintln!("remedian fix: no fix applied: {err}");
            if matches!(err, RemediateError::VerificationFailed { .. }) {
                eprintln!(
                    "remedian fix: working tree rolled back; the branch carries no uncommitted changes"
                );
            }
            return RunOutcome::Handled.exit_code();
        },
        Err(err) => {
            eprintln!("ERROR: {err}");
            return RunOutcome::Failed.exit_code();
        },
    };
    eprintln!(
        "remedian fix: committed {} {} -> {} on {}",
        attempt.package, attempt.prior_version, attempt.new_version, attempt.branch
    );

    if args.no_publish {
        println!("fix committed on {} (publishing skipped)", attempt.branch);
        return RunOutcome::Handled.exit_code();
    }

    let base = args.base.clone().unwrap_or_else(|| git.default_branch());
    let host = GhCli::new(here);
    let spec = fix_proposal_spec(&attempt, target, base, args.assignee.clone());
    match publisher::publish(&host, |branch| git.push(branch), &spec) {
        Ok(proposal) => {
            println!("opened change request #{}: {}", proposal.id, proposal.url);
        },
        Err(err) => {
            // The fix is already committed on its branch; the proposal
            // failure is reported with its classification, not retried.
            eprintln!("ERROR: {err}");
            eprintln!("  hint: {}", proposal_hint(&err));
        },
    }
    RunOutcome::Handled.exit_code()
}

fn detect_report(args: &FixArgs, repo: &Path) -> Option<ScanReport> {
    let store = report_store(repo);
    let timeout = Duration::from_secs(args.scanner_timeout_secs);
    let primary = NpmAuditScanner::new(repo, timeout);
    let secondary = OsvScanner::new(repo, timeout);
    let detector = Detector::new(&primary, &secondary)
        .with_policy(RetryPolicy {
            max_retries: args.max_retries,
            base_delay: Duration::from_secs(args.backoff_secs),
            overall_timeout: Duration::from_secs(300),
        })
        .with_store(&store);

    match detector.detect(args.scanner.into()) {
        Ok(report) => Some(report),
        Err(err) if args.demo => {
            eprintln!("remedian fix: detection failed ({err}); using demonstration dataset");
            match load_demo_report() {
                Ok(report) => {
                    if let Err(err) = store.save(&report) {
                        eprintln!("WARNING: failed to persist demonstration report: {err}");
                    }
                    Some(report)
                },
                Err(detail) => {
                    eprintln!("ERROR: {detail}");
                    None
                },
            }
        },
        Err(err) => {
            eprintln!("ERROR: {err}");
            None
        },
    }
}

/// Verification collaborator: `npm install` to regenerate the lock
/// artifact, then `npm test`. Timeouts surface as failures, which route
/// to rollback.
struct NpmVerifier {
    repo_dir: PathBuf,
    install_timeout: Duration,
    test_timeout: Duration,
}

impl NpmVerifier {
    fn run_step(&self, subcommand: &str, timeout: Duration) -> Result<(), String> {
        let mut command = Command::new("npm");
        command.arg(subcommand).current_dir(&self.repo_dir);
        let output = run_with_timeout(command, timeout).map_err(|err| err.detail().to_string())?;
        if !output.status.success() {
            return Err(format!(
                "npm {subcommand} exited with {:?}: {}",
                output.status.code(),
                tail(&output.stderr_text(), 10)
            ));
        }
        Ok(())
    }
}

impl Verifier for NpmVerifier {
    fn install(&self) -> Result<(), String> {
        self.run_step("install", self.install_timeout)
    }

    fn run_tests(&self) -> Result<(), String> {
        self.run_step("test", self.test_timeout)
    }
}

/// Last `max_lines` of a command's stderr for error reporting.
fn tail(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_keeps_only_the_last_lines() {
        let text = (1..=20).map(|n| format!("line {n}")).collect::<Vec<_>>().join("\n");
        let tailed = tail(&text, 3);
        assert_eq!(tailed, "line 18\nline 19\nline 20");
        assert_eq!(tail("short", 10), "short");
    }
}
