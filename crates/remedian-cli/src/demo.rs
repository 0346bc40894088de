//! Bundled demonstration dataset.
//!
//! When every configured scanner fails and `--demo` was passed, the CLI
//! substitutes this report so the rest of the pipeline can be exercised.
//! The substitution happens here, at the caller layer; the detector
//! itself only signals total failure.

use remedian_core::ScanReport;

const DEMO_REPORT: &str = r#"{
  "timestamp": "2026-01-15T09:30:00Z",
  "findings": [
    {
      "id": "V-1",
      "title": "Prototype Pollution in lodash",
      "severity": "critical",
      "riskScore": 9.1,
      "package": "lodash",
      "version": "4.17.15",
      "fixedIn": ["4.17.21"],
      "description": "lodash versions before 4.17.21 allow modification of the Object prototype via zipObjectDeep"
    },
    {
      "id": "GHSA-93q8-gq69-wqmw",
      "title": "Inefficient Regular Expression Complexity in chalk/ansi-regex",
      "severity": "high",
      "riskScore": 7.5,
      "package": "ansi-regex",
      "version": "3.0.0",
      "fixedIn": ["5.0.1"],
      "description": "ansi-regex is vulnerable to regular expression denial of service"
    },
    {
      "id": "NPM-tar",
      "title": "Arbitrary file overwrite in tar",
      "severity": "medium",
      "riskScore": 6.5,
      "package": "tar",
      "version": "4.4.10",
      "description": "No non-breaking upgrade path is published for this advisory"
    }
  ],
  "summary": { "total": 3, "critical": 1, "high": 1, "medium": 1, "low": 0 }
}"#;

/// Parse and validate the bundled dataset.
pub fn load_demo_report() -> Result<ScanReport, String> {
    let report: ScanReport = serde_json::from_str(DEMO_REPORT)
        .map_err(|err| format!("demo dataset did not parse: {err}"))?;
    report
        .validate()
        .map_err(|err| format!("demo dataset failed validation: {err}"))?;
    Ok(report)
}
