//! Console rendering for scan reports.

use remedian_core::prioritize::prioritize;
use remedian_core::ScanReport;

/// Plain-text table, prioritizer order, with the summary line first.
pub fn format_report(report: &ScanReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Scan from {}\n", report.timestamp));
    out.push_str(&format!(
        "{} finding(s): {} critical, {} high, {} medium, {} low\n",
        report.summary.total,
        report.summary.critical,
        report.summary.high,
        report.summary.medium,
        report.summary.low,
    ));
    if let Some(metadata) = &report.metadata {
        out.push_str(&format!(
            "scan took {:.1}s, {} retr{}\n",
            metadata.scan_duration,
            metadata.retry_count,
            if metadata.retry_count == 1 { "y" } else { "ies" },
        ));
    }
    if report.findings.is_empty() {
        return out;
    }

    out.push('\n');
    out.push_str(&format!(
        "{:<10} {:<24} {:<20} {:<14} {:<12} TITLE\n",
        "SEVERITY", "ID", "PACKAGE", "VERSION", "FIXED-IN"
    ));
    for diagnosis in prioritize(report) {
        let Some(finding) = report.findings.iter().find(|f| f.id == diagnosis.finding_id) else {
            continue;
        };
        let fixed_in = finding
            .fixed_in
            .first()
            .map_or_else(|| "-".to_string(), Clone::clone);
        out.push_str(&format!(
            "{:<10} {:<24} {:<20} {:<14} {:<12} {}\n",
            diagnosis.severity.as_str(),
            truncate(&finding.id, 24),
            truncate(&finding.package, 20),
            truncate(&finding.version, 14),
            truncate(&fixed_in, 12),
            finding.title,
        ));
    }
    out
}

fn truncate(raw: &str, max: usize) -> String {
    if raw.chars().count() <= max {
        raw.to_string()
    } else {
        let kept: String = raw.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

#[cfg(test)]
mod tests {
    use remedian_core::{Finding, Severity};

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
    fn rows_follow_prioritizer_order() {
        let report = ScanReport::new(vec![
            finding("low-1", Severity::Low),
            finding("crit-1", Severity::Critical),
        ]);
        let rendered = format_report(&report);
        let crit_pos = rendered.find("crit-1").expect("critical row");
        let low_pos = rendered.find("low-1").expect("low row");
        assert!(crit_pos < low_pos);
    }

    #[test]
    fn empty_report_renders_summary_only() {
        let rendered = format_report(&ScanReport::new(Vec::new()));
        assert!(rendered.contains("0 finding(s)"));
        assert!(!rendered.contains("SEVERITY"));
    }

    #[test]
    fn long_identifiers_are_truncated() {
        assert_eq!(truncate("short", 10), "short");
        let long = "a".repeat(40);
        let truncated = truncate(&long, 24);
        assert!(truncated.chars().count() <= 24);
        assert!(truncated.ends_with('…'));
    }
}
