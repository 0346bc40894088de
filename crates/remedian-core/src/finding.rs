//! Normalized vulnerability findings.
//!
//! Every scanner collaborator produces this shape at its own boundary;
//! the core never sees a tool's native output format.

use serde::{Deserialize, Serialize};

/// Severity tier of a finding. The four values are the entire domain;
/// scanners must clamp anything else before handing findings to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Ordering rank used by the prioritizer (higher sorts first).
    pub const fn rank(self) -> u8 {
        match self {
            Self::Critical => 3,
            Self::High => 2,
            Self::Medium => 1,
            Self::Low => 0,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Parse a scanner-reported severity, clamping unknown values to the
    /// nearest tier rather than failing the whole report. `moderate` is
    /// the npm spelling of medium; `info` maps to low.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" | "moderate" => Self::Medium,
            "low" | "info" | "informational" => Self::Low,
            other => {
                tracing::warn!(severity = other, "unknown severity, clamping to low");
                Self::Low
            },
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infrastructure attributes carried by network and exploit-validation
/// findings. Dependency findings leave this absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfraDetails {
    pub host: String,
    pub port: u16,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_version: Option<String>,
    #[serde(default)]
    pub exploit_available: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub technical_notes: Vec<String>,
}

/// One detected issue, normalized from any scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Stable identifier (advisory id or a scanner-derived key).
    pub id: String,
    pub title: String,
    pub severity: Severity,
    /// Numeric risk score (CVSS-like, 0..=10) used as the tie-break key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    /// Affected package or service name.
    pub package: String,
    /// Current version or state of the affected package/service.
    pub version: String,
    /// Versions in which the issue is remediated; empty means unfixable
    /// by declared version substitution.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixed_in: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure: Option<InfraDetails>,
}

impl Finding {
    /// A fix can only be attempted when at least one remediated version
    /// is recorded.
    pub fn can_attempt_fix(&self) -> bool {
        !self.fixed_in.is_empty()
    }

    /// Risk score for ordering. Absent scores rank lowest without any
    /// null-handling at comparison sites.
    pub fn risk_rank(&self) -> f64 {
        self.risk_score.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dependency_finding() -> Finding {
        Finding {
            id: "GHSA-p6mc-m468-83gw".to_string(),
            title: "Prototype pollution in lodash".to_string(),
            severity: Severity::High,
            risk_score: Some(7.4),
            package: "lodash".to_string(),
            version: "4.17.15".to_string(),
            fixed_in: vec!["4.17.21".to_string()],
            description: "lodash versions before 4.17.21 are vulnerable".to_string(),
            infrastructure: None,
        }
    }

    #[test]
    fn severity_rank_orders_critical_highest() {
        assert!(Severity::Critical.rank() > Severity::High.rank());
        assert!(Severity::High.rank() > Severity::Medium.rank());
        assert!(Severity::Medium.rank() > Severity::Low.rank());
    }

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).expect("serialize"),
            "\"critical\""
        );
        assert_eq!(
            serde_json::from_str::<Severity>("\"medium\"").expect("parse"),
            Severity::Medium
        );
    }

    #[test]
    fn lenient_parse_maps_npm_moderate_to_medium() {
        assert_eq!(Severity::parse_lenient("moderate"), Severity::Medium);
        assert_eq!(Severity::parse_lenient("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::parse_lenient("bogus"), Severity::Low);
    }

    #[test]
    fn can_attempt_fix_requires_remediated_versions() {
        let fixable = dependency_finding();
        assert!(fixable.can_attempt_fix());

        let unfixable = Finding {
            fixed_in: Vec::new(),
            ..dependency_finding()
        };
        assert!(!unfixable.can_attempt_fix());
    }

    #[test]
    fn absent_risk_score_ranks_lowest() {
        let unscored = Finding {
            risk_score: None,
            ..dependency_finding()
        };
        assert_eq!(unscored.risk_rank(), 0.0);
        assert!(dependency_finding().risk_rank() > unscored.risk_rank());
    }

    #[test]
    fn finding_uses_camel_case_wire_names() {
        let value = serde_json::to_value(dependency_finding()).expect("serialize");
        assert!(value.get("riskScore").is_some());
        assert!(value.get("fixedIn").is_some());
        assert!(value.get("risk_score").is_none());
    }

    #[test]
    fn infra_details_round_trip() {
        let finding = Finding {
            id: "NET-10.0.0.5-3306".to_string(),
            title: "Exposed MySQL service".to_string(),
            severity: Severity::High,
            risk_score: None,
            package: "mysql".to_string(),
            version: "8.0.32".to_string(),
            fixed_in: Vec::new(),
            description: "MySQL reachable from scan host".to_string(),
            infrastructure: Some(InfraDetails {
                host: "10.0.0.5".to_string(),
                port: 3306,
                service: "mysql".to_string(),
                service_version: Some("MySQL 8.0.32".to_string()),
                exploit_available: false,
                technical_notes: vec!["3306/open/tcp".to_string()],
            }),
        };
        let json = serde_json::to_string(&finding).expect("serialize");
        let parsed: Finding = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, finding);
        assert!(json.contains("serviceVersion"));
        assert!(json.contains("exploitAvailable"));
    }
}
