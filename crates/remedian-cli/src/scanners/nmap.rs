//! Network scanner wrapper over nmap's grepable output.
//!
//! Each open port becomes one infrastructure finding with a severity
//! assigned from the service class. The same normalizer serves live
//! scans and pre-captured `-oG` files.

use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use remedian_core::detect::Scanner;
use remedian_core::finding::InfraDetails;
use remedian_core::{Finding, ScanError, ScanReport, Severity};

pub struct NmapScanner {
    target: String,
    timeout: Duration,
}

impl NmapScanner {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
        }
    }
}

impl Scanner for NmapScanner {
    fn name(&self) -> &str {
        "nmap"
    }

    fn scan(&self) -> Result<ScanReport, ScanError> {
        let mut command = Command::new("nmap");
        command.args(["-sV", "-oG", "-", &self.target]);
        let output = super::process::run_with_timeout(command, self.timeout)?;
        if !output.status.success() {
            return Err(ScanError::Fatal(format!(
                "nmap exited with {:?}: {}",
                output.status.code(),
                output.stderr_text()
            )));
        }
        Ok(ScanReport::new(normalize_grepable(&output.stdout_text())))
    }
}

fn host_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^Host:\s+(?P<host>\S+)\s+\((?P<name>[^)]*)\)\s+Ports:\s+(?P<ports>.*)$")
            .expect("host line regex compiles")
    })
}

fn port_entry_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // port/state/proto/owner/service/rpc/version/
        Regex::new(
            r"(?P<port>\d+)/open/(?P<proto>[a-z]+)/[^/]*/(?P<service>[^/]*)/[^/]*/(?P<version>[^/]*)/",
        )
        .expect("port entry regex compiles")
    })
}

/// Parse `-oG` output into findings, one per open port.
pub fn normalize_grepable(output: &str) -> Vec<Finding> {
    let mut findings = Vec::new();
    for line in output.lines() {
        let Some(host_caps) = host_line_regex().captures(line.trim()) else {
            continue;
        };
        let host = host_caps.name("host").map_or("", |m| m.as_str());
        for entry in host_caps.name("ports").map_or("", |m| m.as_str()).split(", ") {
            let Some(caps) = port_entry_regex().captures(entry) else {
                continue;
            };
            let Ok(port) = caps["port"].parse::<u16>() else {
                continue;
            };
            let service = non_empty(&caps["service"]).unwrap_or("unknown");
            let version = non_empty(&caps["version"]);
            findings.push(open_port_finding(host, port, service, version, entry));
        }
    }
    findings
}

fn non_empty(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn open_port_finding(
    host: &str,
    port: u16,
    service: &str,
    version: Option<&str>,
    raw_entry: &str,
) -> Finding {
    Finding {
        id: format!("NET-{host}-{port}"),
        title: format!("Exposed {service} service on {host}"),
        severity: severity_for(port, service),
        risk_score: None,
        package: service.to_string(),
        version: version.unwrap_or("unknown").to_string(),
        fixed_in: Vec::new(),
        description: format!("Port {port}/{service} is open and reachable from the scan host"),
        infrastructure: Some(InfraDetails {
            host: host.to_string(),
            port,
            service: service.to_string(),
            service_version: version.map(str::to_string),
            exploit_available: false,
            technical_notes: vec![raw_entry.trim().to_string()],
        }),
    }
}

/// Exposure severity by service class: databases and plaintext
/// protocols are high, web is medium, hardened remote access is low.
fn severity_for(port: u16, service: &str) -> Severity {
    let service = service.to_ascii_lowercase();
    match port {
        3306 | 5432 | 1433 | 27017 | 6379 | 21 | 23 => Severity::High,
        22 => Severity::Low,
        80 | 443 | 8080 | 8443 => Severity::Medium,
        _ => {
            if ["mysql", "postgres", "mssql", "mongodb", "redis", "ftp", "telnet"]
                .iter()
                .any(|known| service.contains(known))
            {
                Severity::High
            } else if service.contains("ssh") {
                Severity::Low
            } else {
                Severity::Medium
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_GREPABLE: &str = "\
# Nmap 7.94 scan initiated\n\
Host: 10.0.0.5 (db01.internal)\tPorts: 3306/open/tcp//mysql//MySQL 8.0.32/, 22/open/tcp//ssh//OpenSSH 9.3/, 8080/closed/tcp//http-proxy///\n\
# Nmap done at ...\n";

    #[test]
    fn open_ports_become_infra_findings() {
        let findings = normalize_grepable(SAMPLE_GREPABLE);
        assert_eq!(findings.len(), 2, "closed ports are skipped");

        let mysql = &findings[0];
        assert_eq!(mysql.id, "NET-10.0.0.5-3306");
        assert_eq!(mysql.severity, Severity::High);
        assert_eq!(mysql.package, "mysql");
        assert_eq!(mysql.version, "MySQL 8.0.32");
        let infra = mysql.infrastructure.as_ref().expect("infra details");
        assert_eq!(infra.port, 3306);
        assert_eq!(infra.host, "10.0.0.5");
        assert!(!infra.exploit_available);

        let ssh = &findings[1];
        assert_eq!(ssh.severity, Severity::Low);
        assert_eq!(ssh.package, "ssh");
    }

    #[test]
    fn lines_without_ports_are_ignored() {
        let findings = normalize_grepable("# comment only\nHost: 10.0.0.9 ()\tStatus: Up\n");
        assert!(findings.is_empty());
    }

    #[test]
    fn missing_service_and_version_fall_back_to_unknown() {
        let findings =
            normalize_grepable("Host: 10.0.0.7 ()\tPorts: 9999/open/tcp/////\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].package, "unknown");
        assert_eq!(findings[0].version, "unknown");
        assert_eq!(findings[0].severity, Severity::Medium);
    }

    #[test]
    fn severity_table_classifies_by_port_then_service() {
        assert_eq!(severity_for(5432, "postgresql"), Severity::High);
        assert_eq!(severity_for(23, "telnet"), Severity::High);
        assert_eq!(severity_for(443, "https"), Severity::Medium);
        assert_eq!(severity_for(2222, "ssh"), Severity::Low);
        assert_eq!(severity_for(13306, "mysql"), Severity::High);
        assert_eq!(severity_for(49152, "unknown"), Severity::Medium);
    }

    #[test]
    fn normalized_findings_build_a_valid_report() {
        let report = ScanReport::new(normalize_grepable(SAMPLE_GREPABLE));
        report.validate().expect("report validates");
        assert_eq!(report.summary.high, 1);
        assert_eq!(report.summary.low, 1);
    }
}
