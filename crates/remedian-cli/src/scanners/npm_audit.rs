//! `npm audit` scanner wrapper and normalizer.
//!
//! The audit JSON (report version 2) is normalized into findings at this
//! boundary; the core never sees npm's shape. `npm audit` exits 1 when
//! vulnerabilities exist, so only exit codes other than 0/1 are treated
//! as tool failures.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use remedian_core::detect::Scanner;
use remedian_core::manifest::Manifest;
use remedian_core::{Finding, ScanError, ScanReport, Severity};
use serde::Deserialize;

pub struct NpmAuditScanner {
    repo_dir: PathBuf,
    timeout: Duration,
}

impl NpmAuditScanner {
    pub fn new(repo_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            timeout,
        }
    }
}

impl Scanner for NpmAuditScanner {
    fn name(&self) -> &str {
        "npm-audit"
    }

    fn scan(&self) -> Result<ScanReport, ScanError> {
        let mut command = Command::new("npm");
        command.args(["audit", "--json"]).current_dir(&self.repo_dir);
        let output = super::process::run_with_timeout(command, self.timeout)?;

        // Exit 1 just means findings exist.
        if !matches!(output.status.code(), Some(0 | 1)) {
            return Err(ScanError::Fatal(format!(
                "npm audit exited with {:?}: {}",
                output.status.code(),
                output.stderr_text()
            )));
        }

        let audit: AuditReport = serde_json::from_slice(&output.stdout).map_err(|err| {
            ScanError::Fatal(format!("npm audit output did not parse: {err}"))
        })?;

        let manifest = Manifest::load(self.repo_dir.join("package.json")).ok();
        let declared = |package: &str| {
            manifest
                .as_ref()
                .and_then(|m| m.declared_version(package))
                .map(str::to_string)
        };
        Ok(ScanReport::new(normalize(&audit, declared)))
    }
}

// ── npm audit JSON (report version 2) ───────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AuditReport {
    #[serde(default)]
    pub vulnerabilities: BTreeMap<String, AuditEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    #[serde(default)]
    pub name: String,
    pub severity: String,
    #[serde(default)]
    pub range: String,
    #[serde(default)]
    pub fix_available: FixAvailable,
    #[serde(default)]
    pub via: Vec<Via>,
}

/// `fixAvailable` is either a bare bool or an upgrade object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FixAvailable {
    Flag(bool),
    Upgrade {
        name: String,
        version: String,
        #[serde(default, rename = "isSemVerMajor")]
        is_sem_ver_major: bool,
    },
}

impl Default for FixAvailable {
    fn default() -> Self {
        Self::Flag(false)
    }
}

/// `via` entries are advisory objects for the root cause and bare
/// package-name strings for transitive chains.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Via {
    Advisory(AuditAdvisory),
    Package(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditAdvisory {
    #[serde(default)]
    pub source: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub cvss: Option<Cvss>,
}

#[derive(Debug, Deserialize)]
pub struct Cvss {
    #[serde(default)]
    pub score: Option<f64>,
}

/// Map an audit report into normalized findings. `declared` resolves a
/// package's version from the manifest; the vulnerable range is the
/// fallback when the manifest is unreadable.
pub fn normalize(
    audit: &AuditReport,
    declared: impl Fn(&str) -> Option<String>,
) -> Vec<Finding> {
    audit
        .vulnerabilities
        .iter()
        .map(|(package, entry)| {
            let advisory = entry.via.iter().find_map(|via| match via {
                Via::Advisory(advisory) => Some(advisory),
                Via::Package(_) => None,
            });

            let id = advisory
                .and_then(|a| a.url.as_deref().and_then(advisory_id_from_url))
                .or_else(|| advisory.and_then(|a| a.source.map(|s| format!("NPM-{s}"))))
                .unwrap_or_else(|| format!("NPM-{package}"));
            let title = advisory
                .and_then(|a| a.title.clone())
                .unwrap_or_else(|| format!("Vulnerable dependency {package}"));
            let risk_score = advisory
                .and_then(|a| a.cvss.as_ref())
                .and_then(|cvss| cvss.score)
                .filter(|score| *score > 0.0);

            let fixed_in = match &entry.fix_available {
                FixAvailable::Upgrade { version, .. } => vec![version.clone()],
                FixAvailable::Flag(_) => Vec::new(),
            };

            Finding {
                id,
                title,
                severity: Severity::parse_lenient(&entry.severity),
                risk_score,
                package: if entry.name.is_empty() {
                    package.clone()
                } else {
                    entry.name.clone()
                },
                version: declared(package).unwrap_or_else(|| entry.range.clone()),
                fixed_in,
                description: format!("Affected versions: {}", entry.range),
                infrastructure: None,
            }
        })
        .collect()
}

/// `https://github.com/advisories/GHSA-xxxx-...` -> `GHSA-xxxx-...`
fn advisory_id_from_url(url: &str) -> Option<String> {
    let tail = url.rsplit('/').next()?;
    tail.starts_with("GHSA-").then(|| tail.to_string())
}
