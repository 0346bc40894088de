//! `remedian scan`: detection only, report persisted and rendered.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use remedian_core::detect::{Detector, RetryPolicy};
use remedian_core::RunOutcome;

use super::{report_store, ScannerChoice};
use crate::demo::load_demo_report;
use crate::render::format_report;
use crate::scanners::npm_audit::NpmAuditScanner;
use crate::scanners::osv::OsvScanner;

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Target repository.
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Which dependency scanner leads the run.
    #[arg(long, value_enum, default_value_t = ScannerChoice::Either)]
    pub scanner: ScannerChoice,

    /// Substitute the bundled demonstration dataset when every scanner
    /// fails.
    #[arg(long)]
    pub demo: bool,

    /// Print the report JSON on stdout instead of the table.
    #[arg(long)]
    pub json: bool,

    /// Transient-failure retries after the initial attempt.
    #[arg(long, default_value_t = 3)]
    pub max_retries: u32,

    /// Base backoff delay in seconds (doubles per retry).
    #[arg(long, default_value_t = 2)]
    pub backoff_secs: u64,

    /// Timeout for one scanner invocation, in seconds.
    #[arg(long, default_value_t = 120)]
    pub scanner_timeout_secs: u64,

    /// Deadline for the whole detection run, in seconds.
    #[arg(long, default_value_t = 300)]
    pub overall_timeout_secs: u64,
}

pub fn run(args: &ScanArgs) -> u8 {
    let store = report_store(&args.repo);
    let timeout = Duration::from_secs(args.scanner_timeout_secs);
    let primary = NpmAuditScanner::new(&args.repo, timeout);
    let secondary = OsvScanner::new(&args.repo, timeout);
    let detector = Detector::new(&primary, &secondary)
        .with_policy(RetryPolicy {
            max_retries: args.max_retries,
            base_delay: Duration::from_secs(args.backoff_secs),
            overall_timeout: Duration::from_secs(args.overall_timeout_secs),
        })
        .with_store(&store);

    let report = match detector.detect(args.scanner.into()) {
        Ok(report) => report,
        Err(err) if args.demo => {
            eprintln!("remedian scan: detection failed ({err}); using demonstration dataset");
            let report = match load_demo_report() {
                Ok(report) => report,
                Err(detail) => {
                    eprintln!("ERROR: {detail}");
                    return RunOutcome::Failed.exit_code();
                },
            };
            if let Err(err) = store.save(&report) {
                eprintln!("WARNING: failed to persist demonstration report: {err}");
            }
            report
        },
        Err(err) => {
            eprintln!("ERROR: {err}");
            return RunOutcome::Failed.exit_code();
        },
    };

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("ERROR: failed to render report JSON: {err}");
                return RunOutcome::Failed.exit_code();
            },
        }
    } else {
        print!("{}", format_report(&report));
    }
    eprintln!(
        "remedian scan: report recorded at {}",
        store.latest_path().display()
    );
    RunOutcome::Clean.exit_code()
}
