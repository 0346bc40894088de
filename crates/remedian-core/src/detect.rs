//! Fallback detector: primary scanner with retry/backoff, secondary
//! scanner as a one-shot substitute.
//!
//! Only transient failures are retried; fatal failures (tool missing,
//! unparseable output) end the scanner immediately. When the lead
//! scanner is exhausted the fallback runs exactly once; it is never
//! retried against a tertiary. Every report handed back has passed
//! schema validation and, when a store is attached, has been durably
//! recorded.

use std::time::{Duration, Instant};

use crate::error::{DetectError, ScanError};
use crate::report::ScanReport;
use crate::store::ReportStore;

/// A scanner collaborator. Normalization into [`crate::Finding`] happens
/// behind this seam; the detector never branches on scanner identity.
pub trait Scanner {
    fn name(&self) -> &str;
    fn scan(&self) -> Result<ScanReport, ScanError>;
}

/// Which configured scanner leads the detection run. `Either` retries
/// the primary, then substitutes the secondary once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScannerPreference {
    Primary,
    Secondary,
    Either,
}

/// Per-call retry tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Base of the exponential backoff: delay = base * 2^(attempt-1).
    pub base_delay: Duration,
    /// Deadline for the whole detection run; no retry starts past it.
    pub overall_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            overall_timeout: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry `attempt` (1-based): base * 2^(attempt-1),
    /// i.e. 2s/4s/8s with the defaults.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Detection-with-fallback over two scanner collaborators.
pub struct Detector<'a> {
    primary: &'a dyn Scanner,
    secondary: &'a dyn Scanner,
    policy: RetryPolicy,
    store: Option<&'a ReportStore>,
}

impl<'a> Detector<'a> {
    pub fn new(primary: &'a dyn Scanner, secondary: &'a dyn Scanner) -> Self {
        Self {
            primary,
            secondary,
            policy: RetryPolicy::default(),
            store: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attach a store; every produced report is then durably recorded
    /// before being returned.
    pub fn with_store(mut self, store: &'a ReportStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Run detection. Fails only when every configured scanner fails.
    pub fn detect(&self, preference: ScannerPreference) -> Result<ScanReport, DetectError> {
        self.detect_with(preference, std::thread::sleep)
    }

    fn detect_with(
        &self,
        preference: ScannerPreference,
        mut sleep: impl FnMut(Duration),
    ) -> Result<ScanReport, DetectError> {
        let started = Instant::now();
        let (lead, fallback) = match preference {
            ScannerPreference::Primary => (self.primary, None),
            ScannerPreference::Secondary => (self.secondary, None),
            ScannerPreference::Either => (self.primary, Some(self.secondary)),
        };

        let mut errors = Vec::new();
        let mut retry_count = 0u32;

        let lead_failure = match self.run_with_retry(lead, started, &mut sleep, &mut errors, &mut retry_count) {
            Ok(report) => {
                return self.finish(report, started, retry_count, errors);
            },
            Err(detail) => detail,
        };

        let Some(fallback) = fallback else {
            return Err(DetectError::ScannerFailed {
                scanner: lead.name().to_string(),
                detail: lead_failure,
            });
        };

        tracing::warn!(
            scanner = lead.name(),
            fallback = fallback.name(),
            "lead scanner exhausted, substituting fallback"
        );
        // The fallback runs exactly once; its failure is final.
        match fallback.scan() {
            Ok(report) => self.finish(report, started, retry_count, errors),
            Err(err) => Err(DetectError::AllScannersFailed {
                primary_name: lead.name().to_string(),
                primary: lead_failure,
                secondary_name: fallback.name().to_string(),
                secondary: err.detail().to_string(),
            }),
        }
    }

    /// Retry loop for the lead scanner. Returns the last failure string
    /// on exhaustion.
    fn run_with_retry(
        &self,
        scanner: &dyn Scanner,
        started: Instant,
        sleep: &mut impl FnMut(Duration),
        errors: &mut Vec<String>,
        retry_count: &mut u32,
    ) -> Result<ScanReport, String> {
        let mut last_failure = String::new();
        for attempt in 0..=self.policy.max_retries {
            if attempt > 0 {
                if started.elapsed() >= self.policy.overall_timeout {
                    let detail = format!(
                        "overall detection timeout ({}s) reached after {attempt} attempts",
                        self.policy.overall_timeout.as_secs()
                    );
                    errors.push(detail.clone());
                    return Err(detail);
                }
                sleep(self.policy.backoff_delay(attempt));
                *retry_count += 1;
            }
            match scanner.scan() {
                Ok(report) => return Ok(report),
                Err(ScanError::Transient(detail)) => {
                    tracing::warn!(
                        scanner = scanner.name(),
                        attempt = attempt + 1,
                        detail = detail.as_str(),
                        "transient scan failure"
                    );
                    errors.push(format!("attempt {}: {detail}", attempt + 1));
                    last_failure = detail;
                },
                Err(ScanError::Fatal(detail)) => {
                    tracing::warn!(
                        scanner = scanner.name(),
                        detail = detail.as_str(),
                        "fatal scan failure, not retrying"
                    );
                    errors.push(format!("attempt {}: {detail}", attempt + 1));
                    return Err(detail);
                },
            }
        }
        Err(format!(
            "retries exhausted after {} attempts: {last_failure}",
            self.policy.max_retries + 1
        ))
    }

    /// Validate, stamp metadata, and persist. Invalid reports are never
    /// returned.
    fn finish(
        &self,
        mut report: ScanReport,
        started: Instant,
        retry_count: u32,
        mut errors: Vec<String>,
    ) -> Result<ScanReport, DetectError> {
        report.validate()?;

        let mut metadata = report.metadata.take().unwrap_or_default();
        metadata.scan_duration = started.elapsed().as_secs_f64();
        metadata.retry_count = retry_count;
        metadata.errors.append(&mut errors);
        report.metadata = Some(metadata);

        if let Some(store) = self.store {
            store.save(&report)?;
        }
        Ok(report)
    }
}
