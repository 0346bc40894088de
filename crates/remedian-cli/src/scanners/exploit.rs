//! Exploit-validation findings reader.
//!
//! The exploit tool runs out of band and leaves a JSONL file, one
//! validated exploit per line. Reading that file is this scanner's whole
//! job; every record normalizes with `exploit_available` set.

use std::fs;
use std::path::PathBuf;

use remedian_core::detect::Scanner;
use remedian_core::finding::InfraDetails;
use remedian_core::{Finding, ScanError, ScanReport, Severity};
use serde::Deserialize;

pub struct ExploitFindingsFile {
    path: PathBuf,
}

impl ExploitFindingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Scanner for ExploitFindingsFile {
    fn name(&self) -> &str {
        "exploit-validation"
    }

    fn scan(&self) -> Result<ScanReport, ScanError> {
        let raw = fs::read_to_string(&self.path).map_err(|err| {
            ScanError::Fatal(format!(
                "exploit findings file {} unreadable: {err}",
                self.path.display()
            ))
        })?;
        Ok(ScanReport::new(normalize_jsonl(&raw)?))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExploitRecord {
    #[serde(default)]
    id: String,
    host: String,
    port: u16,
    #[serde(default)]
    service: String,
    severity: String,
    #[serde(default)]
    service_version: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    risk_score: Option<f64>,
    #[serde(default)]
    notes: Vec<String>,
}

/// Parse one JSONL document into findings. A malformed line fails the
/// whole file; partial exploit data is worse than none.
pub fn normalize_jsonl(raw: &str) -> Result<Vec<Finding>, ScanError> {
    let mut findings = Vec::new();
    for (number, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: ExploitRecord = serde_json::from_str(line).map_err(|err| {
            ScanError::Fatal(format!(
                "exploit findings line {} did not parse: {err}",
                number + 1
            ))
        })?;
        findings.push(to_finding(record));
    }
    Ok(findings)
}

fn to_finding(record: ExploitRecord) -> Finding {
    let id = if record.id.trim().is_empty() {
        format!("EXP-{}-{}", record.host, record.port)
    } else {
        record.id
    };
    let service = if record.service.is_empty() {
        "unknown".to_string()
    } else {
        record.service
    };
    Finding {
        id,
        title: record
            .title
            .unwrap_or_else(|| format!("Validated exploit against {service} on {}", record.host)),
        severity: Severity::parse_lenient(&record.severity),
        risk_score: record.risk_score,
        package: service.clone(),
        version: record
            .service_version
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        fixed_in: Vec::new(),
        description: record.description,
        infrastructure: Some(InfraDetails {
            host: record.host,
            port: record.port,
            service,
            service_version: record.service_version,
            exploit_available: true,
            technical_notes: record.notes,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_JSONL: &str = r#"
{"id":"EXP-001","host":"10.0.0.5","port":6379,"service":"redis","severity":"critical","riskScore":9.6,"title":"Unauthenticated Redis RCE","description":"Write access confirmed without credentials","notes":["CONFIG SET dir accepted"]}
{"host":"10.0.0.9","port":21,"service":"ftp","severity":"high"}
"#;

    #[test]
    fn records_normalize_with_exploit_flag_set() {
        let findings = normalize_jsonl(SAMPLE_JSONL).expect("sample parses");
        assert_eq!(findings.len(), 2);

        let redis = &findings[0];
        assert_eq!(redis.id, "EXP-001");
        assert_eq!(redis.severity, Severity::Critical);
        assert_eq!(redis.risk_score, Some(9.6));
        let infra = redis.infrastructure.as_ref().expect("infra");
        assert!(infra.exploit_available);
        assert_eq!(infra.technical_notes.len(), 1);

        let ftp = &findings[1];
        assert_eq!(ftp.id, "EXP-10.0.0.9-21", "derived id when none supplied");
        assert!(ftp.infrastructure.as_ref().expect("infra").exploit_available);
    }

    #[test]
    fn malformed_line_is_a_fatal_failure() {
        let err = normalize_jsonl("{\"host\":\"a\",\"port\":1,\"severity\":\"low\"}\nnot-json\n")
            .expect_err("bad line must fail");
        assert!(!err.is_transient());
        assert!(err.detail().contains("line 2"));
    }

    #[test]
    fn missing_file_is_fatal_not_transient() {
        let scanner = ExploitFindingsFile::new("/nonexistent/exploits.jsonl");
        let err = scanner.scan().expect_err("missing file");
        assert!(!err.is_transient());
    }
}
