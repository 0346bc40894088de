//! `remedian dast`: the DAST path end to end.
//!
//! Network discovery and exploit-validation findings are merged into one
//! report, persisted, and published as an advisory-only change request.
//! Unlike `fix`, nothing here ever patches configuration.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use remedian_core::dast::{build_advisory, merge_findings};
use remedian_core::detect::{Detector, RetryPolicy, ScannerPreference, Scanner};
use remedian_core::remediate::Vcs;
use remedian_core::{Finding, RunOutcome};

use super::{proposal_hint, report_store};
use crate::git::GitCli;
use crate::github::GhCli;
use crate::publisher::{self, advisory_proposal_spec, ADVISORY_PATH};
use crate::scanners::exploit::ExploitFindingsFile;
use crate::scanners::nmap::{normalize_grepable, NmapScanner};

#[derive(Debug, Args)]
pub struct DastArgs {
    /// Repository the advisory is committed to.
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Network scan target (host or CIDR) for a live nmap run.
    #[arg(long)]
    pub target: Option<String>,

    /// Pre-captured nmap grepable (`-oG`) output file, instead of a
    /// live scan.
    #[arg(long, conflicts_with = "target")]
    pub nmap_file: Option<PathBuf>,

    /// Exploit-validation findings file (JSONL), if an exploit run
    /// happened.
    #[arg(long)]
    pub exploit_file: Option<PathBuf>,

    /// Print the advisory on stdout without committing or publishing.
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

    /// Timeout for the network scanner, in seconds.
    #[arg(long, default_value_t = 600)]
    pub scanner_timeout_secs: u64,
}

pub fn run(args: &DastArgs) -> u8 {
    let Some(network) = network_findings(args) else {
        return RunOutcome::Failed.exit_code();
    };
    let Some(exploit) = exploit_findings(args) else {
        return RunOutcome::Failed.exit_code();
    };

    let merged = merge_findings(network, exploit);
    let store = report_store(&args.repo);
    if let Err(err) = store.save(&merged) {
        eprintln!("ERROR: failed to persist merged report: {err}");
        return RunOutcome::Failed.exit_code();
    }
    eprintln!(
        "remedian dast: merged report recorded at {}",
        store.latest_path().display()
    );

    if merged.findings.is_empty() {
        println!("clean: no exposed services");
        return RunOutcome::Clean.exit_code();
    }

    let advisory = build_advisory(&merged);
    if args.no_publish {
        print!("{advisory}");
        return RunOutcome::Handled.exit_code();
    }

    // Commit the advisory on its timestamped branch.
    let git = GitCli::new(&args.repo);
    let spec = advisory_proposal_spec(
        &merged,
        args.base.clone().unwrap_or_else(|| git.default_branch()),
        args.assignee.clone(),
    );
    let advisory_path = args.repo.join(ADVISORY_PATH);
    let committed = git
        .checkout(&spec.branch)
        .and_then(|()| {
            fs::write(&advisory_path, &advisory)
                .map_err(|err| format!("failed to write {}: {err}", advisory_path.display()))
        })
        .and_then(|()| git.stage_all())
        .and_then(|()| {
            git.commit(&format!(
                "docs(security): infrastructure advisory {}",
                merged.timestamp
            ))
        });
    if let Err(err) = committed {
        eprintln!("ERROR: failed to commit advisory: {err}");
        return RunOutcome::Failed.exit_code();
    }
    eprintln!("remedian dast: advisory committed on {}", spec.branch);

    let host = GhCli::new(&args.repo);
    match publisher::publish(&host, |branch| git.push(branch), &spec) {
        Ok(proposal) => {
            println!("opened change request #{}: {}", proposal.id, proposal.url);
        },
        Err(err) => {
            // The advisory is committed locally; surface the
            // classification and move on.
            eprintln!("ERROR: {err}");
            eprintln!("  hint: {}", proposal_hint(&err));
        },
    }
    RunOutcome::Handled.exit_code()
}

fn network_findings(args: &DastArgs) -> Option<Vec<Finding>> {
    if let Some(path) = &args.nmap_file {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                eprintln!("ERROR: failed to read {}: {err}", path.display());
                return None;
            },
        };
        return Some(normalize_grepable(&raw));
    }

    let Some(target) = &args.target else {
        eprintln!("ERROR: pass --target for a live scan or --nmap-file for captured output");
        return None;
    };
    let scanner = NmapScanner::new(target, Duration::from_secs(args.scanner_timeout_secs));
    // The network scanner has no substitute; the detector still owns the
    // retry/backoff loop.
    let detector = Detector::new(&scanner, &scanner).with_policy(RetryPolicy {
        max_retries: args.max_retries,
        base_delay: Duration::from_secs(args.backoff_secs),
        overall_timeout: Duration::from_secs(args.scanner_timeout_secs * 2),
    });
    match detector.detect(ScannerPreference::Primary) {
        Ok(report) => Some(report.findings),
        Err(err) => {
            eprintln!("ERROR: {err}");
            None
        },
    }
}

fn exploit_findings(args: &DastArgs) -> Option<Vec<Finding>> {
    let Some(path) = &args.exploit_file else {
        eprintln!("remedian dast: no exploit findings supplied");
        return Some(Vec::new());
    };
    match ExploitFindingsFile::new(path).scan() {
        Ok(report) => Some(report.findings),
        Err(err) => {
            eprintln!("ERROR: {err}");
            None
        },
    }
}
