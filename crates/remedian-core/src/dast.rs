//! DAST merge and advisory building.
//!
//! Network-discovery findings and exploit-validation findings are merged
//! by concatenation, never deduplicated: a port finding and an exploit
//! finding for the same host/port are both retained. Summary counts are
//! recomputed from the merged list. The advisory builder is pure; its
//! only output is a document string.

use crate::finding::Finding;
use crate::report::ScanReport;

/// Merge the two DAST finding streams into one validated report.
pub fn merge_findings(network: Vec<Finding>, exploit: Vec<Finding>) -> ScanReport {
    let mut findings = network;
    findings.extend(exploit);
    ScanReport::new(findings)
}

/// Hardening guidance for an exposed service. Total: every input maps to
/// at least the generic recommendation.
pub fn remediation_guidance(port: u16, service: &str) -> Vec<String> {
    if let Some(steps) = guidance_for_port(port) {
        return steps;
    }
    if let Some(steps) = guidance_for_service(service) {
        return steps;
    }
    generic_guidance()
}

fn guidance_for_port(port: u16) -> Option<Vec<String>> {
    match port {
        3306 | 5432 | 1433 | 27017 | 6379 => Some(database_guidance()),
        21 | 23 | 25 => Some(plaintext_guidance()),
        80 | 443 | 8080 | 8443 => Some(web_guidance()),
        22 => Some(ssh_guidance()),
        _ => None,
    }
}

fn guidance_for_service(service: &str) -> Option<Vec<String>> {
    let service = service.to_ascii_lowercase();
    if ["mysql", "postgres", "postgresql", "mssql", "mongodb", "redis"]
        .iter()
        .any(|known| service.contains(known))
    {
        return Some(database_guidance());
    }
    if ["ftp", "telnet", "smtp"].iter().any(|known| service.contains(known)) {
        return Some(plaintext_guidance());
    }
    if service.contains("http") {
        return Some(web_guidance());
    }
    if service.contains("ssh") {
        return Some(ssh_guidance());
    }
    None
}

fn database_guidance() -> Vec<String> {
    vec![
        "Restrict access with firewall rules so only application hosts can reach the \
         database port"
            .to_string(),
        "Require authentication for all database accounts and remove anonymous or \
         default users"
            .to_string(),
        "Bind the service to an internal interface instead of 0.0.0.0".to_string(),
        "Enable TLS for client connections if the database supports it".to_string(),
    ]
}

fn plaintext_guidance() -> Vec<String> {
    vec![
        "Disable the plaintext protocol and migrate to its encrypted replacement \
         (SFTP/SSH, SMTPS)"
            .to_string(),
        "If the service must stay, restrict reachable source addresses at the firewall"
            .to_string(),
        "Audit credentials that may have transited this service in cleartext".to_string(),
    ]
}

fn web_guidance() -> Vec<String> {
    vec![
        "Ensure the web server only exposes intended virtual hosts and paths".to_string(),
        "Redirect plain HTTP to HTTPS and enable HSTS".to_string(),
        "Keep the server and its middleware patched to current stable releases".to_string(),
    ]
}

fn ssh_guidance() -> Vec<String> {
    vec![
        "Disable password authentication in favor of keys".to_string(),
        "Restrict SSH access to management networks or a bastion host".to_string(),
        "Keep the SSH daemon at a current patch level".to_string(),
    ]
}

fn generic_guidance() -> Vec<String> {
    vec![
        "Review whether this service needs to be exposed; restrict or disable it if not"
            .to_string(),
    ]
}

/// Render the merged report as a markdown advisory with per-finding
/// remediation guidance. Never touches the filesystem or version
/// control.
pub fn build_advisory(report: &ScanReport) -> String {
    let mut doc = String::new();
    doc.push_str("# Infrastructure Security Advisory\n\n");
    doc.push_str(&format!("Scan time: {}\n\n", report.timestamp));
    doc.push_str(&format!(
        "Findings: {} total ({} critical, {} high, {} medium, {} low)\n\n",
        report.summary.total,
        report.summary.critical,
        report.summary.high,
        report.summary.medium,
        report.summary.low,
    ));

    for finding in &report.findings {
        doc.push_str(&format!("## {} — {}\n\n", finding.id, finding.title));
        doc.push_str(&format!("Severity: **{}**", finding.severity));
        if let Some(score) = finding.risk_score {
            doc.push_str(&format!(" (risk score {score:.1})"));
        }
        doc.push('\n');

        if let Some(infra) = &finding.infrastructure {
            doc.push_str(&format!(
                "\nAffected: `{}:{}` ({}{})\n",
                infra.host,
                infra.port,
                infra.service,
                infra
                    .service_version
                    .as_deref()
                    .map(|v| format!(", {v}"))
                    .unwrap_or_default(),
            ));
            if infra.exploit_available {
                doc.push_str("\n**A working exploit has been validated against this service.**\n");
            }
            if !infra.technical_notes.is_empty() {
                doc.push_str("\nTechnical notes:\n");
                for note in &infra.technical_notes {
                    doc.push_str(&format!("- {note}\n"));
                }
            }
        }

        if !finding.description.trim().is_empty() {
            doc.push_str(&format!("\n{}\n", finding.description));
        }

        doc.push_str("\nRemediation:\n");
        let steps = match &finding.infrastructure {
            Some(infra) => remediation_guidance(infra.port, &infra.service),
            None => remediation_guidance(0, &finding.package),
        };
        for step in steps {
            doc.push_str(&format!("- {step}\n"));
        }
        doc.push('\n');
    }

    doc.push_str(
        "---\n\nThis advisory was generated automatically. No configuration was \
         changed; all remediation above is manual.\n",
    );
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{InfraDetails, Severity};

    fn network_finding(id: &str, host: &str, port: u16, service: &str) -> Finding {
        Finding {
            id: id.to_string(),
            title: format!("Exposed {service} service"),
            severity: Severity::High,
            risk_score: None,
            package: service.to_string(),
            version: "unknown".to_string(),
            fixed_in: Vec::new(),
            description: String::new(),
            infrastructure: Some(InfraDetails {
                host: host.to_string(),
                port,
                service: service.to_string(),
                service_version: None,
                exploit_available: false,
                technical_notes: Vec::new(),
            }),
        }
    }

    fn exploit_finding(id: &str, host: &str, port: u16, service: &str) -> Finding {
        let mut finding = network_finding(id, host, port, service);
        finding.severity = Severity::Critical;
        if let Some(infra) = finding.infrastructure.as_mut() {
            infra.exploit_available = true;
        }
        finding
    }

    #[test]
    fn merge_concatenates_without_deduplication() {
        // Same host/port from both scanners: both findings survive.
        let merged = merge_findings(
            vec![network_finding("NET-1", "10.0.0.5", 3306, "mysql")],
            vec![exploit_finding("EXP-1", "10.0.0.5", 3306, "mysql")],
        );
        assert_eq!(merged.findings.len(), 2);
        assert_eq!(merged.summary.total, 2);
        assert_eq!(merged.summary.critical, 1);
        assert_eq!(merged.summary.high, 1);
        merged.validate().expect("merged report validates");
    }

    #[test]
    fn summary_is_recomputed_not_inherited() {
        let merged = merge_findings(
            vec![
                network_finding("NET-1", "a", 80, "http"),
                network_finding("NET-2", "b", 22, "ssh"),
            ],
            Vec::new(),
        );
        assert_eq!(merged.summary.total, 2);
        assert_eq!(merged.summary.high, 2);
    }

    #[test]
    fn database_port_gets_database_guidance() {
        // Scenario D: MySQL on 3306 yields firewall/authentication
        // hardening, not the generic fallback.
        let steps = remediation_guidance(3306, "mysql");
        assert!(steps.iter().any(|s| s.to_lowercase().contains("firewall")));
        assert!(steps.iter().any(|s| s.to_lowercase().contains("authentication")));
        assert!(!steps.iter().any(|s| s.contains("Review whether this service")));
    }

    #[test]
    fn guidance_is_total_for_unknown_inputs() {
        let steps = remediation_guidance(49152, "weird-proprietary-thing");
        assert!(!steps.is_empty());
        assert!(steps[0].contains("Review whether this service"));
    }

    #[test]
    fn non_standard_port_falls_back_to_service_name() {
        let steps = remediation_guidance(13306, "mysql");
        assert!(steps.iter().any(|s| s.to_lowercase().contains("firewall")));
    }

    #[test]
    fn advisory_contains_per_finding_guidance() {
        let merged = merge_findings(
            vec![network_finding("NET-1", "10.0.0.5", 3306, "mysql")],
            vec![exploit_finding("EXP-1", "10.0.0.9", 21, "ftp")],
        );
        let advisory = build_advisory(&merged);
        assert!(advisory.contains("NET-1"));
        assert!(advisory.contains("EXP-1"));
        assert!(advisory.contains("firewall"));
        assert!(advisory.contains("working exploit has been validated"));
        assert!(advisory.contains("10.0.0.5:3306"));
    }

    #[test]
    fn advisory_for_empty_report_still_renders() {
        let advisory = build_advisory(&merge_findings(Vec::new(), Vec::new()));
        assert!(advisory.contains("0 total"));
    }
}
