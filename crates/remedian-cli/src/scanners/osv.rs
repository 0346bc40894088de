//! `osv-scanner` wrapper and normalizer, the fallback dependency
//! scanner.
//!
//! OSV reports CVSS vectors rather than numeric scores, so findings from
//! this scanner carry the tier from `database_specific.severity` and no
//! risk score.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use remedian_core::detect::Scanner;
use remedian_core::{Finding, ScanError, ScanReport, Severity};
use serde::Deserialize;

pub struct OsvScanner {
    repo_dir: PathBuf,
    timeout: Duration,
}

impl OsvScanner {
    pub fn new(repo_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            timeout,
        }
    }
}

impl Scanner for OsvScanner {
    fn name(&self) -> &str {
        "osv-scanner"
    }

    fn scan(&self) -> Result<ScanReport, ScanError> {
        let mut command = Command::new("osv-scanner");
        command
            .args(["--format", "json", "--recursive", "."])
            .current_dir(&self.repo_dir);
        let output = super::process::run_with_timeout(command, self.timeout)?;

        // osv-scanner exits 1 when vulnerabilities are found.
        if !matches!(output.status.code(), Some(0 | 1)) {
            return Err(ScanError::Fatal(format!(
                "osv-scanner exited with {:?}: {}",
                output.status.code(),
                output.stderr_text()
            )));
        }

        let parsed: OsvOutput = serde_json::from_slice(&output.stdout).map_err(|err| {
            ScanError::Fatal(format!("osv-scanner output did not parse: {err}"))
        })?;
        Ok(ScanReport::new(normalize(&parsed)))
    }
}

// ── osv-scanner JSON ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OsvOutput {
    #[serde(default)]
    pub results: Vec<OsvResult>,
}

#[derive(Debug, Deserialize)]
pub struct OsvResult {
    #[serde(default)]
    pub packages: Vec<OsvPackage>,
}

#[derive(Debug, Deserialize)]
pub struct OsvPackage {
    pub package: OsvPackageInfo,
    #[serde(default)]
    pub vulnerabilities: Vec<OsvVulnerability>,
}

#[derive(Debug, Deserialize)]
pub struct OsvPackageInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct OsvVulnerability {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub affected: Vec<OsvAffected>,
    #[serde(default)]
    pub database_specific: Option<OsvDatabaseSpecific>,
}

#[derive(Debug, Deserialize)]
pub struct OsvDatabaseSpecific {
    #[serde(default)]
    pub severity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OsvAffected {
    #[serde(default)]
    pub ranges: Vec<OsvRange>,
}

#[derive(Debug, Deserialize)]
pub struct OsvRange {
    #[serde(default)]
    pub events: Vec<OsvEvent>,
}

#[derive(Debug, Deserialize)]
pub struct OsvEvent {
    #[serde(default)]
    pub introduced: Option<String>,
    #[serde(default)]
    pub fixed: Option<String>,
}

pub fn normalize(output: &OsvOutput) -> Vec<Finding> {
    let mut findings = Vec::new();
    for result in &output.results {
        for package in &result.packages {
            for vulnerability in &package.vulnerabilities {
                findings.push(to_finding(&package.package, vulnerability));
            }
        }
    }
    findings
}

fn to_finding(package: &OsvPackageInfo, vulnerability: &OsvVulnerability) -> Finding {
    let severity = vulnerability
        .database_specific
        .as_ref()
        .and_then(|db| db.severity.as_deref())
        .map_or(Severity::Medium, Severity::parse_lenient);

    let mut fixed_in = Vec::new();
    for affected in &vulnerability.affected {
        for range in &affected.ranges {
            for event in &range.events {
                if let Some(fixed) = &event.fixed {
                    if !fixed_in.contains(fixed) {
                        fixed_in.push(fixed.clone());
                    }
                }
            }
        }
    }

    Finding {
        id: vulnerability.id.clone(),
        title: vulnerability
            .summary
            .clone()
            .unwrap_or_else(|| format!("Vulnerable dependency {}", package.name)),
        severity,
        risk_score: None,
        package: package.name.clone(),
        version: if package.version.is_empty() {
            "unknown".to_string()
        } else {
            package.version.clone()
        },
        fixed_in,
        description: vulnerability.details.clone().unwrap_or_default(),
        infrastructure: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OSV: &str = r#"{
  "results": [
    {
      "packages": [
        {
          "package": { "name": "lodash", "version": "4.17.15", "ecosystem": "npm" },
          "vulnerabilities": [
            {
              "id": "GHSA-35jh-r3h4-6jhm",
              "summary": "Command injection in lodash",
              "details": "lodash before 4.17.21 is vulnerable to command injection",
              "affected": [
                {
                  "ranges": [
                    {
                      "type": "SEMVER",
                      "events": [
                        { "introduced": "0" },
                        { "fixed": "4.17.21" }
                      ]
                    }
                  ]
                }
              ],
              "database_specific": { "severity": "HIGH" }
            }
          ]
        }
      ]
    }
  ]
}"#;

    #[test]
    fn osv_vulnerability_normalizes_with_fixed_versions() {
        let parsed: OsvOutput = serde_json::from_str(SAMPLE_OSV).expect("sample parses");
        let findings = normalize(&parsed);
        assert_eq!(findings.len(), 1);

        let finding = &findings[0];
        assert_eq!(finding.id, "GHSA-35jh-r3h4-6jhm");
        assert_eq!(finding.package, "lodash");
        assert_eq!(finding.version, "4.17.15");
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.fixed_in, vec!["4.17.21".to_string()]);
        assert_eq!(finding.risk_score, None);
    }

    #[test]
    fn missing_database_severity_defaults_to_medium() {
        let output = OsvOutput {
            results: vec![OsvResult {
                packages: vec![OsvPackage {
                    package: OsvPackageInfo {
                        name: "left-pad".to_string(),
                        version: String::new(),
                    },
                    vulnerabilities: vec![OsvVulnerability {
                        id: "OSV-2020-0001".to_string(),
                        summary: None,
                        details: None,
                        affected: Vec::new(),
                        database_specific: None,
                    }],
                }],
            }],
        };
        let findings = normalize(&output);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[0].version, "unknown");
        assert!(!findings[0].can_attempt_fix());
    }

    #[test]
    fn normalized_findings_build_a_valid_report() {
        let parsed: OsvOutput = serde_json::from_str(SAMPLE_OSV).expect("sample parses");
        let report = ScanReport::new(normalize(&parsed));
        report.validate().expect("report validates");
    }
}
