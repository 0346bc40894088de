//! remedian - autonomous dependency and infrastructure remediation.
//!
//! Scans a repository for vulnerabilities, fixes the highest-priority
//! dependency issue on an isolated, test-verified branch, and proposes
//! the fix as a reviewable change request.

use clap::{Parser, Subcommand};
use remedian_cli::commands;
use tracing_subscriber::EnvFilter;

/// remedian - autonomous remediation pipeline
#[derive(Parser, Debug)]
#[command(name = "remedian")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect dependency vulnerabilities and record the report
    Scan(commands::scan::ScanArgs),

    /// Detect, prioritize, and auto-fix the top dependency finding
    Fix(commands::fix::FixArgs),

    /// Merge infrastructure findings and publish an advisory
    Dast(commands::dast::DastArgs),

    /// Render the latest recorded scan report
    Report(commands::report::ReportArgs),
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let code = match &cli.command {
        Commands::Scan(args) => commands::scan::run(args),
        Commands::Fix(args) => commands::fix::run(args),
        Commands::Dast(args) => commands::dast::run(args),
        Commands::Report(args) => commands::report::run(args),
    };
    std::process::exit(i32::from(code));
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
