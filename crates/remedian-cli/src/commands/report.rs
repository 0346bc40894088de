//! `remedian report`: render the latest persisted scan.

use std::path::PathBuf;

use clap::Args;
use remedian_core::RunOutcome;

use super::report_store;
use crate::render::format_report;

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Target repository.
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// List recorded scan history instead of rendering the latest.
    #[arg(long)]
    pub list: bool,

    /// Print the latest report JSON on stdout.
    #[arg(long, conflicts_with = "list")]
    pub json: bool,
}

pub fn run(args: &ReportArgs) -> u8 {
    let store = report_store(&args.repo);

    if args.list {
        let history = match store.history() {
            Ok(history) => history,
            Err(err) => {
                eprintln!("ERROR: {err}");
                return RunOutcome::Failed.exit_code();
            },
        };
        if history.is_empty() {
            println!("no scans recorded yet");
            return RunOutcome::Clean.exit_code();
        }
        for path in history {
            println!("{}", path.display());
        }
        return RunOutcome::Clean.exit_code();
    }

    let report = match store.load_latest() {
        Ok(Some(report)) => report,
        Ok(None) => {
            eprintln!("no scan recorded yet; run `remedian scan` first");
            return RunOutcome::Failed.exit_code();
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
    RunOutcome::Clean.exit_code()
}
