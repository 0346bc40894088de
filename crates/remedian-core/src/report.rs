//! Timestamped, validated scan reports.
//!
//! A [`ScanReport`] is immutable once produced: constructors recompute the
//! summary from the findings, and [`ScanReport::validate`] rejects any
//! report whose embedded counts disagree with its findings. A mismatch is
//! a bug in the producer, not data to repair.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::finding::{Finding, Severity};

/// Current UTC time as an ISO-8601 string (`2026-08-07T12:00:00Z`).
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Pre-aggregated per-tier counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl ScanSummary {
    /// Recompute counts from a finding list.
    pub fn tally(findings: &[Finding]) -> Self {
        let mut summary = Self {
            total: findings.len(),
            ..Self::default()
        };
        for finding in findings {
            match finding.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
            }
        }
        summary
    }

    pub fn count_for(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

/// Detection-run accounting attached by the fallback detector.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMetadata {
    /// Wall time of the detection run, in seconds.
    #[serde(default)]
    pub scan_duration: f64,
    /// Transient retries consumed before the report was produced.
    #[serde(default)]
    pub retry_count: u32,
    /// Per-attempt failure descriptions accumulated along the way.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// One timestamped detection run. Finding order is not semantically
/// meaningful; the prioritizer re-sorts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub timestamp: String,
    pub findings: Vec<Finding>,
    pub summary: ScanSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ScanMetadata>,
}

impl ScanReport {
    /// Build a report stamped with the current time; the summary is
    /// always recomputed from the findings.
    pub fn new(findings: Vec<Finding>) -> Self {
        Self::with_timestamp(now_iso8601(), findings)
    }

    pub fn with_timestamp(timestamp: String, findings: Vec<Finding>) -> Self {
        let summary = ScanSummary::tally(&findings);
        Self {
            timestamp,
            findings,
            summary,
            metadata: None,
        }
    }

    /// Schema validation: required fields present, severity domain already
    /// enforced by the type, aggregate counts consistent, risk scores in
    /// range. Reports that fail here must never reach the prioritizer.
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.timestamp.trim().is_empty() {
            return Err(ReportError::MissingTimestamp);
        }
        for (index, finding) in self.findings.iter().enumerate() {
            if finding.id.trim().is_empty() {
                return Err(ReportError::MissingFindingId { index });
            }
            if let Some(score) = finding.risk_score {
                if !(0.0..=10.0).contains(&score) {
                    return Err(ReportError::RiskScoreOutOfRange {
                        finding_id: finding.id.clone(),
                        score,
                    });
                }
            }
        }

        let expected = ScanSummary::tally(&self.findings);
        if self.summary.total != expected.total {
            return Err(ReportError::SummaryMismatch {
                field: "total",
                expected: expected.total,
                actual: self.summary.total,
            });
        }
        for severity in [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
        ] {
            if self.summary.count_for(severity) != expected.count_for(severity) {
                return Err(ReportError::SummaryMismatch {
                    field: severity.as_str(),
                    expected: expected.count_for(severity),
                    actual: self.summary.count_for(severity),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(id: &str, severity: Severity) -> Finding {
        Finding {
            id: id.to_string(),
            title: format!("issue {id}"),
            severity,
            risk_score: None,
            package: "pkg".to_string(),
            version: "1.0.0".to_string(),
            fixed_in: vec!["1.0.1".to_string()],
            description: String::new(),
            infrastructure: None,
        }
    }

    #[test]
    fn constructor_recomputes_summary() {
        let report = ScanReport::new(vec![
            finding("A", Severity::Critical),
            finding("B", Severity::High),
            finding("C", Severity::High),
            finding("D", Severity::Low),
        ]);
        assert_eq!(report.summary.total, 4);
        assert_eq!(report.summary.critical, 1);
        assert_eq!(report.summary.high, 2);
        assert_eq!(report.summary.medium, 0);
        assert_eq!(report.summary.low, 1);
        report.validate().expect("fresh report must validate");
    }

    #[test]
    fn summary_total_must_equal_finding_count() {
        let mut report = ScanReport::new(vec![finding("A", Severity::High)]);
        report.summary.total = 5;
        let err = report.validate().expect_err("mismatch must be rejected");
        assert!(matches!(
            err,
            ReportError::SummaryMismatch { field: "total", .. }
        ));
    }

    #[test]
    fn per_tier_counts_must_match() {
        let mut report = ScanReport::new(vec![
            finding("A", Severity::High),
            finding("B", Severity::Medium),
        ]);
        report.summary.high = 2;
        report.summary.total = 2;
        let err = report.validate().expect_err("tier mismatch must be rejected");
        assert!(matches!(
            err,
            ReportError::SummaryMismatch { field: "high", .. }
        ));
    }

    #[test]
    fn empty_finding_id_is_rejected() {
        let mut bad = finding("", Severity::Low);
        bad.id = "  ".to_string();
        let report = ScanReport::new(vec![bad]);
        let err = report.validate().expect_err("blank id must be rejected");
        assert!(matches!(err, ReportError::MissingFindingId { index: 0 }));
    }

    #[test]
    fn out_of_range_risk_score_is_rejected() {
        let mut bad = finding("A", Severity::High);
        bad.risk_score = Some(11.5);
        let report = ScanReport::new(vec![bad]);
        let err = report.validate().expect_err("score > 10 must be rejected");
        assert!(matches!(err, ReportError::RiskScoreOutOfRange { .. }));
    }

    #[test]
    fn metadata_uses_camel_case_wire_names() {
        let mut report = ScanReport::new(Vec::new());
        report.metadata = Some(ScanMetadata {
            scan_duration: 1.5,
            retry_count: 2,
            errors: vec!["attempt 1: timeout".to_string()],
        });
        let value = serde_json::to_value(&report).expect("serialize");
        let metadata = value.get("metadata").expect("metadata present");
        assert!(metadata.get("scanDuration").is_some());
        assert!(metadata.get("retryCount").is_some());
    }

    #[test]
    fn report_round_trips_field_for_field() {
        let mut report = ScanReport::new(vec![
            finding("A", Severity::Critical),
            finding("B", Severity::Medium),
        ]);
        report.metadata = Some(ScanMetadata {
            scan_duration: 3.25,
            retry_count: 1,
            errors: Vec::new(),
        });
        let json = serde_json::to_string_pretty(&report).expect("serialize");
        let parsed: ScanReport = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, report);
    }
}
