//! Prioritization: ranked, actionable interpretations of findings.
//!
//! Ordering is severity tier descending, then numeric risk score
//! descending (absent scores rank lowest). The remediation engine always
//! targets the first fixable diagnosis; findings without a remediated
//! version stay in the list for reporting but are never targeted.

use crate::dast;
use crate::finding::{Finding, Severity};
use crate::report::ScanReport;

/// Concrete remediation for one finding. The structured variant replaces
/// prose round-tripping: package and versions travel as fields, never as
/// a sentence to re-parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationAction {
    /// Declared dependency-version substitution.
    UpgradeDependency {
        package: String,
        from: String,
        to: String,
    },
    /// Manual hardening steps; never auto-patched.
    Manual { steps: Vec<String> },
}

impl std::fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpgradeDependency { package, from, to } => {
                write!(f, "Update {package} from {from} to {to}")
            },
            Self::Manual { steps } => match steps.first() {
                Some(first) => write!(f, "Manual remediation: {first}"),
                None => f.write_str("Manual remediation required"),
            },
        }
    }
}

/// One prioritized, actionable interpretation of a finding. Created
/// fresh per run and consumed exactly once by the remediation engine or
/// the advisory builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosis {
    pub finding_id: String,
    pub title: String,
    pub severity: Severity,
    pub risk_score: Option<f64>,
    /// Rendered description for humans.
    pub summary: String,
    pub action: RemediationAction,
    /// Files a dependency fix would touch; empty for manual actions.
    pub files_to_change: Vec<String>,
}

impl Diagnosis {
    pub fn is_fixable(&self) -> bool {
        matches!(self.action, RemediationAction::UpgradeDependency { .. })
    }
}

/// Rank a report's findings into an ordered diagnosis list.
pub fn prioritize(report: &ScanReport) -> Vec<Diagnosis> {
    let mut findings: Vec<&Finding> = report.findings.iter().collect();
    findings.sort_by(|a, b| {
        b.severity
            .rank()
            .cmp(&a.severity.rank())
            .then_with(|| {
                b.risk_rank()
                    .partial_cmp(&a.risk_rank())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });
    findings.into_iter().map(diagnose).collect()
}

/// The remediation target: first diagnosis carrying a dependency
/// upgrade. `None` means the run is clean from the engine's viewpoint
/// even when unfixable findings exist.
pub fn first_fixable(diagnoses: &[Diagnosis]) -> Option<&Diagnosis> {
    diagnoses.iter().find(|diagnosis| diagnosis.is_fixable())
}

fn diagnose(finding: &Finding) -> Diagnosis {
    let action = if finding.can_attempt_fix() && !finding.package.trim().is_empty() {
        RemediationAction::UpgradeDependency {
            package: finding.package.clone(),
            from: finding.version.clone(),
            to: finding.fixed_in[0].clone(),
        }
    } else if let Some(infra) = &finding.infrastructure {
        RemediationAction::Manual {
            steps: dast::remediation_guidance(infra.port, &infra.service),
        }
    } else {
        RemediationAction::Manual {
            steps: vec![
                "Review the finding and apply the vendor's guidance manually".to_string(),
            ],
        }
    };

    let files_to_change = match &action {
        RemediationAction::UpgradeDependency { .. } => vec![
            "package.json".to_string(),
            "package-lock.json".to_string(),
        ],
        RemediationAction::Manual { .. } => Vec::new(),
    };

    let summary = if finding.description.trim().is_empty() {
        format!(
            "{} ({} severity) affecting {} {}",
            finding.title, finding.severity, finding.package, finding.version
        )
    } else {
        finding.description.clone()
    };

    Diagnosis {
        finding_id: finding.id.clone(),
        title: finding.title.clone(),
        severity: finding.severity,
        risk_score: finding.risk_score,
        summary,
        action,
        files_to_change,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::InfraDetails;

    fn finding(id: &str, severity: Severity, risk: Option<f64>, fixed_in: &[&str]) -> Finding {
        Finding {
            id: id.to_string(),
            title: format!("issue {id}"),
            severity,
            risk_score: risk,
            package: "lodash".to_string(),
            version: "4.17.15".to_string(),
            fixed_in: fixed_in.iter().map(|s| (*s).to_string()).collect(),
            description: String::new(),
            infrastructure: None,
        }
    }

    #[test]
    fn output_is_sorted_by_tier_then_risk() {
        let report = ScanReport::new(vec![
            finding("low", Severity::Low, Some(9.9), &["1.0.1"]),
            finding("high-weak", Severity::High, Some(2.0), &["1.0.1"]),
            finding("critical", Severity::Critical, Some(1.0), &["1.0.1"]),
            finding("high-strong", Severity::High, Some(8.0), &["1.0.1"]),
        ]);

        let ranked = prioritize(&report);
        let ids: Vec<&str> = ranked.iter().map(|d| d.finding_id.as_str()).collect();
        assert_eq!(ids, vec!["critical", "high-strong", "high-weak", "low"]);

        for pair in ranked.windows(2) {
            assert!(pair[0].severity.rank() >= pair[1].severity.rank());
            if pair[0].severity == pair[1].severity {
                assert!(
                    pair[0].risk_score.unwrap_or(0.0) >= pair[1].risk_score.unwrap_or(0.0)
                );
            }
        }
    }

    #[test]
    fn critical_outranks_high_regardless_of_risk_score() {
        // Scenario A ordering: a critical lodash finding beats any high.
        let report = ScanReport::new(vec![
            finding("H-1", Severity::High, Some(10.0), &["1.0.1"]),
            finding("V-1", Severity::Critical, None, &["4.17.21"]),
        ]);
        let ranked = prioritize(&report);
        assert_eq!(ranked[0].finding_id, "V-1");
    }

    #[test]
    fn absent_risk_score_sorts_below_any_scored_peer() {
        let report = ScanReport::new(vec![
            finding("unscored", Severity::High, None, &["1.0.1"]),
            finding("scored", Severity::High, Some(0.1), &["1.0.1"]),
        ]);
        let ranked = prioritize(&report);
        assert_eq!(ranked[0].finding_id, "scored");
    }

    #[test]
    fn fixable_diagnosis_carries_structured_upgrade() {
        let report = ScanReport::new(vec![finding("V-1", Severity::Critical, None, &["4.17.21"])]);
        let ranked = prioritize(&report);
        assert_eq!(
            ranked[0].action,
            RemediationAction::UpgradeDependency {
                package: "lodash".to_string(),
                from: "4.17.15".to_string(),
                to: "4.17.21".to_string(),
            }
        );
        assert_eq!(
            ranked[0].files_to_change,
            vec!["package.json".to_string(), "package-lock.json".to_string()]
        );
    }

    #[test]
    fn unfixable_finding_is_never_the_target() {
        // Scenario C: a finding with no remediated versions stays in the
        // list but first_fixable skips it.
        let report = ScanReport::new(vec![finding("V-2", Severity::Critical, Some(9.0), &[])]);
        let ranked = prioritize(&report);
        assert_eq!(ranked.len(), 1);
        assert!(!ranked[0].is_fixable());
        assert!(first_fixable(&ranked).is_none());
    }

    #[test]
    fn infra_finding_gets_port_specific_manual_steps() {
        let mut infra = finding("NET-1", Severity::High, None, &[]);
        infra.infrastructure = Some(InfraDetails {
            host: "10.0.0.5".to_string(),
            port: 3306,
            service: "mysql".to_string(),
            service_version: None,
            exploit_available: false,
            technical_notes: Vec::new(),
        });
        let report = ScanReport::new(vec![infra]);
        let ranked = prioritize(&report);
        match &ranked[0].action {
            RemediationAction::Manual { steps } => {
                assert!(steps.iter().any(|s| s.to_lowercase().contains("firewall")));
            },
            other => panic!("expected manual action, got {other:?}"),
        }
    }

    #[test]
    fn upgrade_action_renders_the_canonical_sentence() {
        let action = RemediationAction::UpgradeDependency {
            package: "lodash".to_string(),
            from: "4.17.15".to_string(),
            to: "4.17.21".to_string(),
        };
        assert_eq!(action.to_string(), "Update lodash from 4.17.15 to 4.17.21");
    }
}
